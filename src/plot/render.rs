use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::figure::{FigureData, LegendEntry, padded_range, step_post};
use super::{PlotConfig, PlotError};
use crate::stats::Envelope;

type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

// dash pattern, as fractions of the axis extent
const DASH: f64 = 0.03;
const GAP: f64 = 0.02;

fn draw_err<E: std::fmt::Display>(err: E) -> PlotError {
    PlotError::Draw(err.to_string())
}

fn rgb(c: [u8; 3]) -> RGBColor {
    RGBColor(c[0], c[1], c[2])
}

fn line_px(config: &PlotConfig, pt: f64) -> u32 {
    config.px(pt).round().max(1.0) as u32
}

/// Writes the figure as SVG: shared legend on top, then the state, control
/// and reward panels side by side, each with a square plotting area.
pub fn render_figure(data: &FigureData, config: &PlotConfig, path: &Path) -> Result<(), PlotError> {
    let (w, h) = config.figure_size_px();
    let root = SVGBackend::new(path, (w, h)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let legend_h = (h as f64 * config.legend_height_frac).round() as u32;
    let (legend_area, body) = root.split_vertically(legend_h);
    draw_legend(&legend_area, &data.legend, config)?;

    let mut panels = body.split_evenly((1, 3)).into_iter().map(square);
    if let Some(area) = panels.next() {
        draw_state_panel(&area, data, config)?;
    }
    if let Some(area) = panels.next() {
        draw_control_panel(&area, data, config)?;
    }
    if let Some(area) = panels.next() {
        draw_reward_panel(&area, data, config)?;
    }

    root.present().map_err(draw_err)?;
    Ok(())
}

/// Largest centred square inside `area`.
fn square<DB: DrawingBackend>(area: DrawingArea<DB, Shift>) -> DrawingArea<DB, Shift> {
    let (w, h) = area.dim_in_pixel();
    let side = w.min(h);
    area.shrink(((w - side) / 2, (h - side) / 2), (side, side))
}

fn panel_chart<'a, DB: DrawingBackend>(
    area: &'a DrawingArea<DB, Shift>,
    x: Range<f64>,
    y: Range<f64>,
    config: &PlotConfig,
) -> Result<Chart<'a, DB>, PlotError> {
    // equal label areas keep the plotting region as square as its cell
    let label_area = (config.px(config.label_pt) * 4.0).round() as u32;
    ChartBuilder::on(area)
        .margin((config.px(config.tick_pt) * 0.8).round() as u32)
        .x_label_area_size(label_area)
        .y_label_area_size(label_area)
        .build_cartesian_2d(x, y)
        .map_err(draw_err)
}

fn draw_axes<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    x_desc: &str,
    y_desc: &str,
    config: &PlotConfig,
) -> Result<(), PlotError> {
    let family = config.font_family.as_str();
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_desc_style((family, config.px(config.label_pt)).into_font())
        .label_style((family, config.px(config.tick_pt)).into_font())
        .x_labels(6)
        .y_labels(6)
        .light_line_style(&WHITE.mix(0.3))
        .bold_line_style(&BLACK.mix(0.15))
        .draw()
        .map_err(draw_err)
}

fn draw_state_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    data: &FigureData,
    config: &PlotConfig,
) -> Result<(), PlotError> {
    let (lo, hi) = combined_bounds(data.series.iter().map(|s| &s.state), &data.reference);
    let (y0, y1) = padded_range(lo, hi);
    let mut chart = panel_chart(area, 0.0..config.t_final, y0..y1, config)?;
    draw_axes(&mut chart, &config.time_label, &config.state_label, config)?;

    let lw = line_px(config, config.line_pt);
    for s in &data.series {
        let color = rgb(s.color);
        let mut band: Vec<(f64, f64)> = data.time.iter().copied().zip(s.state.upper.iter().copied()).collect();
        band.extend(data.time.iter().copied().zip(s.state.lower.iter().copied()).rev());
        chart
            .draw_series(std::iter::once(Polygon::new(band, color.mix(0.2).filled())))
            .map_err(draw_err)?;
        chart
            .draw_series(LineSeries::new(
                data.time.iter().copied().zip(s.state.median.iter().copied()),
                color.stroke_width(lw),
            ))
            .map_err(draw_err)?;
    }

    let reference: Vec<(f64, f64)> = data.time.iter().copied().zip(data.reference.iter().copied()).collect();
    let ref_lw = line_px(config, config.line_pt * 1.2);
    chart
        .draw_series(
            dash_segments(&reference, (config.t_final, y1 - y0), DASH, GAP)
                .into_iter()
                .map(|seg| PathElement::new(seg, BLACK.stroke_width(ref_lw))),
        )
        .map_err(draw_err)?;
    Ok(())
}

fn draw_control_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    data: &FigureData,
    config: &PlotConfig,
) -> Result<(), PlotError> {
    let (lo, hi) = combined_bounds(data.series.iter().map(|s| &s.control), &[]);
    let (y0, y1) = padded_range(lo, hi);
    let mut chart = panel_chart(area, 0.0..config.t_final, y0..y1, config)?;
    draw_axes(&mut chart, &config.time_label, &config.control_label, config)?;

    let lw = line_px(config, config.line_pt);
    for s in &data.series {
        let color = rgb(s.color);
        let mut band = step_post(&data.time, &s.control.upper);
        band.extend(step_post(&data.time, &s.control.lower).into_iter().rev());
        chart
            .draw_series(std::iter::once(Polygon::new(band, color.mix(0.2).filled())))
            .map_err(draw_err)?;
        chart
            .draw_series(LineSeries::new(
                step_post(&data.time, &s.control.median),
                color.stroke_width(lw),
            ))
            .map_err(draw_err)?;
    }
    Ok(())
}

fn draw_reward_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    data: &FigureData,
    config: &PlotConfig,
) -> Result<(), PlotError> {
    let hist = &data.rewards.histogram;
    let edges = &hist.edges;
    let counts: Vec<Vec<usize>> = data
        .policies()
        .iter()
        .map(|s| hist.counts(&s.cumulative))
        .collect();
    let top = counts.iter().flatten().copied().max().unwrap_or(0).max(1) as f64 * 1.3;

    let (x0, x1) = (hist.min(), hist.max());
    let mut chart = panel_chart(area, x0..x1, 0.0..top, config)?;
    draw_axes(&mut chart, &config.reward_label, &config.count_label, config)?;

    for (s, counts) in data.policies().iter().zip(&counts) {
        let color = rgb(s.color);
        let bars: Vec<Rectangle<(f64, f64)>> = edges
            .windows(2)
            .zip(counts)
            .filter(|(_, c)| **c > 0)
            .map(|(e, c)| Rectangle::new([(e[0], 0.0), (e[1], *c as f64)], color.mix(0.5).filled()))
            .collect();
        chart
            .draw_series(bars)
            .map_err(draw_err)?
            .label(s.label.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 18, y + 6)], color.mix(0.5).filled()));
    }

    let oracle = data.oracle();
    let color = rgb(oracle.color);
    let lw = line_px(config, 2.0);
    let m = data.rewards.oracle_median;
    chart
        .draw_series(
            dash_segments(&[(m, 0.0), (m, top)], (x1 - x0, top), DASH, GAP)
                .into_iter()
                .map(|seg| PathElement::new(seg, color.stroke_width(lw))),
        )
        .map_err(draw_err)?
        .label(oracle.label.as_str())
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(lw)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .label_font((config.font_family.as_str(), config.px(config.legend_pt) * 0.8).into_font())
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(draw_err)?;
    Ok(())
}

/// One row of entries across the top strip; the dashed entry is drawn as
/// three short dashes.
fn draw_legend<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    entries: &[LegendEntry],
    config: &PlotConfig,
) -> Result<(), PlotError> {
    if entries.is_empty() {
        return Ok(());
    }
    let (w, h) = area.dim_in_pixel();
    let font_px = config.px(config.legend_pt);
    let style = (config.font_family.as_str(), font_px)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));

    let swatch = (font_px * 2.0).round() as i32;
    let lw = line_px(config, config.line_pt * 1.2);
    let slot = w as i32 / entries.len() as i32;
    let y = h as i32 / 2;

    for (i, entry) in entries.iter().enumerate() {
        let x = slot * i as i32 + slot / 8;
        let color = rgb(entry.color);
        let segments: Vec<Vec<(i32, i32)>> = if entry.dashed {
            let d = swatch / 5;
            (0..3).map(|k| vec![(x + 2 * k * d, y), (x + (2 * k + 1) * d, y)]).collect()
        } else {
            vec![vec![(x, y), (x + swatch, y)]]
        };
        for seg in segments {
            area.draw(&PathElement::new(seg, color.stroke_width(lw))).map_err(draw_err)?;
        }
        area.draw(&Text::new(entry.label.clone(), (x + swatch + swatch / 3, y), style.clone()))
            .map_err(draw_err)?;
    }
    Ok(())
}

/// `(min, max)` over a set of envelopes and extra values, ignoring
/// non-finite entries. Falls back to `(0, 1)`.
fn combined_bounds<'a>(envelopes: impl Iterator<Item = &'a Envelope>, extra: &[f64]) -> (f64, f64) {
    let finite = |v: &f64| v.is_finite();
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for (a, b) in envelopes.filter_map(|e| e.bounds()) {
        if finite(&a) {
            lo = lo.min(a);
        }
        if finite(&b) {
            hi = hi.max(b);
        }
    }
    for v in extra.iter().filter(|v| finite(v)) {
        lo = lo.min(*v);
        hi = hi.max(*v);
    }
    if lo <= hi { (lo, hi) } else { (0.0, 1.0) }
}

/// Cuts a polyline into dashes. Lengths are measured with each axis scaled
/// by its extent in `spans`, so `dash` and `gap` are fractions of the panel
/// and the pattern looks the same on both axes.
pub fn dash_segments(points: &[(f64, f64)], spans: (f64, f64), dash: f64, gap: f64) -> Vec<Vec<(f64, f64)>> {
    const EPS: f64 = 1e-12;
    let mut out = Vec::new();
    let Some(&first) = points.first() else {
        return out;
    };
    if dash <= 0.0 {
        return out;
    }
    let (sx, sy) = (spans.0.abs().max(EPS), spans.1.abs().max(EPS));
    let period = dash + gap.max(0.0);

    let mut current = vec![first];
    let mut pos = 0.0; // position inside the current period
    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        let len = (((b.0 - a.0) / sx).powi(2) + ((b.1 - a.1) / sy).powi(2)).sqrt();
        if !(len > EPS) {
            continue;
        }
        let mut s = 0.0;
        while len - s > EPS {
            let on = pos < dash;
            let boundary = if on { dash } else { period };
            let step = (boundary - pos).min(len - s);
            s += step;
            pos += step;
            let f = s / len;
            let p = (a.0 + (b.0 - a.0) * f, a.1 + (b.1 - a.1) * f);

            if on {
                current.push(p);
                if pos >= dash - EPS {
                    if current.len() >= 2 {
                        out.push(std::mem::take(&mut current));
                    }
                    current.clear();
                    pos = dash;
                }
            }
            if !on && pos >= period - EPS {
                current = vec![p];
                pos = 0.0;
            }
        }
    }
    if current.len() >= 2 {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_is_cut_into_equal_dashes() {
        let segs = dash_segments(&[(0.0, 0.0), (10.0, 0.0)], (10.0, 1.0), 0.1, 0.1);
        assert_eq!(segs.len(), 5);
        for (k, seg) in segs.iter().enumerate() {
            let start = seg.first().unwrap().0;
            let end = seg.last().unwrap().0;
            assert!((start - 2.0 * k as f64).abs() < 1e-9);
            assert!((end - (2.0 * k as f64 + 1.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn vertical_line_uses_the_y_span() {
        let segs = dash_segments(&[(3.0, 0.0), (3.0, 50.0)], (1.0, 100.0), 0.1, 0.1);
        // normalised length 0.5 -> dashes at [0,10], [20,30], [40,50]
        assert_eq!(segs.len(), 3);
        assert!(segs.iter().flatten().all(|p| p.0 == 3.0));
        assert!((segs[2].last().unwrap().1 - 50.0).abs() < 1e-9);
    }

    #[test]
    fn dashes_follow_corners() {
        let pts = [(0.0, 0.0), (0.15, 0.0), (0.15, 0.15)];
        let segs = dash_segments(&pts, (1.0, 1.0), 0.2, 0.05);
        // first dash runs through the corner
        assert!(segs[0].contains(&(0.15, 0.0)));
        assert!((segs[0].last().unwrap().1 - 0.05).abs() < 1e-9);
    }

    #[test]
    fn degenerate_input_gives_no_dashes() {
        assert!(dash_segments(&[], (1.0, 1.0), 0.1, 0.1).is_empty());
        assert!(dash_segments(&[(1.0, 1.0)], (1.0, 1.0), 0.1, 0.1).is_empty());
        assert!(dash_segments(&[(1.0, 1.0), (1.0, 1.0)], (1.0, 1.0), 0.1, 0.1).is_empty());
    }

    #[test]
    fn panels_are_squared_and_centred() {
        let mut buf = String::new();
        {
            let root = SVGBackend::with_string(&mut buf, (1654, 562)).into_drawing_area();
            let cells = root.split_evenly((1, 3));
            assert_eq!(cells.len(), 3);
            for cell in cells {
                let (w, h) = cell.dim_in_pixel();
                let x0 = cell.get_base_pixel().0;
                let panel = square(cell);
                let (pw, ph) = panel.dim_in_pixel();
                assert_eq!(pw, ph);
                assert_eq!(pw, w.min(h));
                assert_eq!(panel.get_base_pixel().0 - x0, ((w - pw) / 2) as i32);
            }
        }

        let mut buf = String::new();
        let tall = SVGBackend::with_string(&mut buf, (100, 300)).into_drawing_area();
        assert_eq!(square(tall).dim_in_pixel(), (100, 100));
    }

    #[test]
    fn bounds_cover_envelopes_and_reference() {
        let e = Envelope {
            median: vec![1.0, 2.0],
            lower: vec![0.5, 1.5],
            upper: vec![1.5, 3.0],
        };
        assert_eq!(combined_bounds([&e].into_iter(), &[4.0, f64::NAN]), (0.5, 4.0));
        assert_eq!(combined_bounds(std::iter::empty(), &[]), (0.0, 1.0));
    }
}
