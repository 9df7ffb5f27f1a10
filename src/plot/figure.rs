use std::collections::BTreeSet;

use log::warn;
use ndarray::Axis;

use super::{PlotConfig, PlotError};
use crate::dataset::{PolicyRollouts, RolloutDataset};
use crate::stats::{self, Envelope, Histogram};
use crate::utils::linspace;

/// Identity of a plotted series. The oracle is its own variant, so a
/// policy that happens to be called "oracle" stays a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesId {
    Oracle,
    Policy(String),
}

impl SeriesId {
    pub fn is_oracle(&self) -> bool {
        matches!(self, SeriesId::Oracle)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesData {
    pub id: SeriesId,
    pub label: String,
    pub color: [u8; 3],
    pub state: Envelope,
    pub control: Envelope,
    /// Return of each repetition.
    pub cumulative: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: [u8; 3],
    pub dashed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RewardSummary {
    /// Median oracle return; drawn as the vertical baseline.
    pub oracle_median: f64,
    /// Median absolute deviation of each policy's returns, in policy order.
    pub mad: Vec<(String, f64)>,
    /// `oracle_median - return` for every repetition of each policy.
    pub optimality_gaps: Vec<(String, Vec<f64>)>,
    /// Bins shared by every policy's histogram.
    pub histogram: Histogram,
}

/// Everything the renderer draws, computed up front.
#[derive(Debug, Clone, PartialEq)]
pub struct FigureData {
    pub time: Vec<f64>,
    /// Oracle first, then the requested policies in order.
    pub series: Vec<SeriesData>,
    pub reference: Vec<f64>,
    pub legend: Vec<LegendEntry>,
    pub rewards: RewardSummary,
}

impl FigureData {
    pub fn prepare(
        dataset: &RolloutDataset,
        policies: &[String],
        config: &PlotConfig,
    ) -> Result<Self, PlotError> {
        config.check()?;
        let (time_steps, _) = dataset.validate()?;

        let colors = config.colors()?;
        let requested = policies.len() + 1;
        if requested > colors.len() {
            return Err(PlotError::TooManyPolicies {
                requested,
                available: colors.len(),
            });
        }
        let mut seen = BTreeSet::new();
        for name in policies {
            if !seen.insert(name.as_str()) {
                return Err(PlotError::DuplicatePolicy(name.clone()));
            }
        }

        let n = time_steps.min(config.max_time_points);
        if time_steps > n {
            warn!("dataset has {time_steps} time steps; plotting the first {n}");
        }
        let time = linspace(0.0, config.t_final, n);

        let reference = dataset
            .reference
            .get(&config.reference_key)
            .ok_or_else(|| PlotError::MissingReference(config.reference_key.clone()))?;
        if reference.len() < n {
            return Err(PlotError::ReferenceTooShort {
                key: config.reference_key.clone(),
                len: reference.len(),
                needed: n,
            });
        }
        let reference = reference[..n].to_vec();

        let mut series = Vec::with_capacity(requested);
        series.push(build_series(
            SeriesId::Oracle,
            config.oracle_label.clone(),
            colors[0],
            &dataset.oracle,
            n,
            config,
        )?);
        for (i, name) in policies.iter().enumerate() {
            let rollouts = dataset.policy(name)?;
            series.push(build_series(
                SeriesId::Policy(name.clone()),
                name.clone(),
                colors[i + 1],
                rollouts,
                n,
                config,
            )?);
        }

        let rewards =
            summarize_rewards(&series, config.histogram_bins).ok_or(PlotError::NoFiniteRewards)?;

        let mut legend: Vec<LegendEntry> = series
            .iter()
            .map(|s| LegendEntry {
                label: s.label.clone(),
                color: s.color,
                dashed: false,
            })
            .collect();
        legend.push(LegendEntry {
            label: config.reference_label.clone(),
            color: [0, 0, 0],
            dashed: true,
        });

        Ok(Self {
            time,
            series,
            reference,
            legend,
            rewards,
        })
    }

    pub fn oracle(&self) -> &SeriesData {
        // prepare() always puts the oracle first
        &self.series[0]
    }

    pub fn policies(&self) -> &[SeriesData] {
        &self.series[1..]
    }
}

fn build_series(
    id: SeriesId,
    label: String,
    color: [u8; 3],
    rollouts: &PolicyRollouts,
    n: usize,
    config: &PlotConfig,
) -> Result<SeriesData, PlotError> {
    let out_of_range = |what, index, dim| PlotError::IndexOutOfRange {
        series: label.clone(),
        what,
        index,
        dim,
    };
    if config.state_index >= rollouts.state_dim() {
        return Err(out_of_range("state", config.state_index, rollouts.state_dim()));
    }
    if config.action_index >= rollouts.action_dim() {
        return Err(out_of_range("action", config.action_index, rollouts.action_dim()));
    }

    let state = Envelope::from_repetitions(rollouts.x.index_axis(Axis(0), config.state_index), n);
    let control = Envelope::from_repetitions(rollouts.u.index_axis(Axis(0), config.action_index), n);
    let cumulative = stats::cumulative_rewards(rollouts.r.view());

    Ok(SeriesData {
        id,
        label,
        color,
        state,
        control,
        cumulative,
    })
}

/// Oracle baseline, per-policy spread and gap, and shared histogram bins.
/// `None` when there is nothing finite to summarise.
fn summarize_rewards(series: &[SeriesData], bins: usize) -> Option<RewardSummary> {
    let (oracle, policies) = series.split_first()?;
    let oracle_median = stats::median(&oracle.cumulative)?;

    let mut mad = Vec::with_capacity(policies.len());
    let mut optimality_gaps = Vec::with_capacity(policies.len());
    for s in policies {
        mad.push((s.label.clone(), stats::median_abs_deviation(&s.cumulative)?));
        optimality_gaps.push((s.label.clone(), stats::optimality_gaps(oracle_median, &s.cumulative)));
    }

    let histogram = Histogram::spanning(series.iter().flat_map(|s| s.cumulative.iter()), bins)?;

    Some(RewardSummary {
        oracle_median,
        mad,
        optimality_gaps,
        histogram,
    })
}

/// Post-step rendering of `values`: each value is held until the next
/// time sample.
pub fn step_post(time: &[f64], values: &[f64]) -> Vec<(f64, f64)> {
    let n = time.len().min(values.len());
    let mut out = Vec::with_capacity(2 * n);
    for i in 0..n {
        out.push((time[i], values[i]));
        if i + 1 < n {
            out.push((time[i + 1], values[i]));
        }
    }
    out
}

/// Axis range covering `[lo, hi]` with 5% headroom on both sides.
pub fn padded_range(lo: f64, hi: f64) -> (f64, f64) {
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let span = hi - lo;
    if span <= f64::EPSILON * lo.abs().max(1.0) {
        let pad = (lo.abs() * 0.05).max(0.5);
        return (lo - pad, hi + pad);
    }
    (lo - 0.05 * span, hi + 0.05 * span)
}
