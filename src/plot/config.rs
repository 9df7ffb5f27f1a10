use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::PlotError;

/// Everything the renderer needs to know about layout and style. Passed
/// explicitly; the renderer keeps no global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub output: String,

    // page geometry
    pub width_in: f64,
    pub height_ratio: f64,
    pub dpi: f64,
    /// Fraction of the figure height reserved for the shared legend.
    pub legend_height_frac: f64,

    // typography, sizes in points
    pub font_family: String,
    pub label_pt: f64,
    pub tick_pt: f64,
    pub legend_pt: f64,
    pub line_pt: f64,

    /// `#rrggbb` colors; the oracle takes the first one.
    pub palette: Vec<String>,

    // data selection
    pub t_final: f64,
    pub max_time_points: usize,
    pub histogram_bins: usize,
    pub state_index: usize,
    pub action_index: usize,
    pub reference_key: String,

    // text
    pub oracle_label: String,
    pub reference_label: String,
    pub time_label: String,
    pub state_label: String,
    pub control_label: String,
    pub reward_label: String,
    pub count_label: String,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            output: "cstr_vis.svg".to_string(),
            width_in: 8.27, // A4
            height_ratio: 0.4,
            dpi: 200.0,
            legend_height_frac: 0.15,
            font_family: "serif".to_string(),
            label_pt: 10.0,
            tick_pt: 10.0,
            legend_pt: 10.0,
            line_pt: 1.25,
            // tab:orange, tab:red, tab:blue, tab:green
            palette: ["#ff7f0e", "#d62728", "#1f77b4", "#2ca02c"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            t_final: 25.0,
            max_time_points: 60,
            histogram_bins: 20,
            state_index: 0,
            action_index: 0,
            reference_key: "Ca".to_string(),
            oracle_label: "Oracle".to_string(),
            reference_label: "Reference".to_string(),
            time_label: "Time [min]".to_string(),
            state_label: "C_A [mol/m^3]".to_string(),
            control_label: "T_c [K]".to_string(),
            reward_label: "Cumulative Reward".to_string(),
            count_label: "Frequency".to_string(),
        }
    }
}

impl PlotConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, PlotError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| PlotError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|err| match err {
            PlotError::ConfigParse { source, .. } => PlotError::ConfigParse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, PlotError> {
        let cfg: Self = toml::from_str(text).map_err(|source| PlotError::ConfigParse {
            path: Default::default(),
            source,
        })?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Rejects settings the renderer cannot honour.
    pub fn check(&self) -> Result<(), PlotError> {
        let invalid = |msg: &str| Err(PlotError::InvalidConfig(msg.to_string()));
        if self.max_time_points == 0 {
            return invalid("max_time_points must be positive");
        }
        if self.histogram_bins == 0 {
            return invalid("histogram_bins must be positive");
        }
        if !(self.t_final > 0.0) {
            return invalid("t_final must be positive");
        }
        if !(self.width_in > 0.0 && self.height_ratio > 0.0 && self.dpi > 0.0) {
            return invalid("figure size must be positive");
        }
        if !(0.0..1.0).contains(&self.legend_height_frac) {
            return invalid("legend_height_frac must lie in [0, 1)");
        }
        if self.palette.is_empty() {
            return invalid("palette is empty");
        }
        self.colors().map(|_| ())
    }

    /// Figure size in pixels.
    pub fn figure_size_px(&self) -> (u32, u32) {
        let w = self.width_in * self.dpi;
        let h = w * self.height_ratio;
        (w.round().max(1.0) as u32, h.round().max(1.0) as u32)
    }

    /// Converts a point size to pixels at the configured DPI.
    pub fn px(&self, pt: f64) -> f64 {
        pt * self.dpi / 72.0
    }

    pub fn colors(&self) -> Result<Vec<[u8; 3]>, PlotError> {
        self.palette.iter().map(|s| parse_hex_color(s)).collect()
    }
}

/// Parses `#rrggbb` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Result<[u8; 3], PlotError> {
    let hex = s.trim().trim_start_matches('#');
    let bad = || PlotError::Color(s.to_string());
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(bad());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reproduce_the_a4_figure() {
        let cfg = PlotConfig::default();
        assert!(cfg.check().is_ok());
        assert_eq!(cfg.figure_size_px(), (1654, 662));
        assert_eq!(cfg.colors().unwrap().len(), 4);
        assert_eq!(cfg.colors().unwrap()[0], [0xff, 0x7f, 0x0e]);
        assert!((cfg.px(72.0) - 200.0).abs() < 1e-12);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = PlotConfig::from_toml_str(
            r##"
            output = "out.svg"
            palette = ["#000000", "#ffffff", "#123456", "#abcdef", "#00ff00"]
            max_time_points = 40
            "##,
        )
        .unwrap();
        assert_eq!(cfg.output, "out.svg");
        assert_eq!(cfg.max_time_points, 40);
        assert_eq!(cfg.palette.len(), 5);
        assert_eq!(cfg.histogram_bins, 20);
        assert_eq!(cfg.reference_key, "Ca");
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(matches!(
            PlotConfig::from_toml_str("histogram_bins = 0"),
            Err(PlotError::InvalidConfig(_))
        ));
        assert!(matches!(
            PlotConfig::from_toml_str("palette = [\"#12345\"]"),
            Err(PlotError::Color(_))
        ));
        assert!(matches!(
            PlotConfig::from_toml_str("dpi = \"high\""),
            Err(PlotError::ConfigParse { .. })
        ));
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#1f77b4").unwrap(), [0x1f, 0x77, 0xb4]);
        assert_eq!(parse_hex_color("2ca02c").unwrap(), [0x2c, 0xa0, 0x2c]);
        assert!(parse_hex_color("#gggggg").is_err());
    }
}
