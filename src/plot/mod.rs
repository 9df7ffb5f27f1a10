//! Three-panel policy comparison figure: state trajectory, control
//! trajectory and cumulative-reward histogram, with the oracle as baseline.

pub mod config;
pub mod figure;
pub mod render;

use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::dataset::{DatasetError, RolloutDataset};

pub use config::PlotConfig;
pub use figure::{FigureData, LegendEntry, RewardSummary, SeriesData, SeriesId};
pub use render::render_figure;

#[derive(Error, Debug)]
pub enum PlotError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("{requested} series requested (oracle included) but the palette has {available} colors")]
    TooManyPolicies { requested: usize, available: usize },
    #[error("policy `{0}` is listed more than once")]
    DuplicatePolicy(String),
    #[error("reference trajectory `{0}` is missing from the dataset")]
    MissingReference(String),
    #[error("reference trajectory `{key}` has {len} points but {needed} are plotted")]
    ReferenceTooShort { key: String, len: usize, needed: usize },
    #[error("{what} index {index} is out of range for `{series}` ({dim} dimensions)")]
    IndexOutOfRange {
        series: String,
        what: &'static str,
        index: usize,
        dim: usize,
    },
    #[error("no finite cumulative rewards to histogram")]
    NoFiniteRewards,
    #[error("invalid color `{0}`")]
    Color(String),
    #[error("invalid plot configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("drawing failed: {0}")]
    Draw(String),
}

/// Computes the comparison statistics, renders the figure to
/// `config.output` and returns the reward summary.
///
/// `policies` lists the policies to compare, in legend order; the oracle is
/// always added in front of them.
pub fn performance_plots(
    dataset: &RolloutDataset,
    policies: &[String],
    config: &PlotConfig,
) -> Result<RewardSummary, PlotError> {
    let data = FigureData::prepare(dataset, policies, config)?;

    for (policy, mad) in &data.rewards.mad {
        info!("{policy}: median absolute deviation of return {mad:.4}");
    }

    let out = Path::new(&config.output);
    render_figure(&data, config, out)?;
    info!("saved figure to {}", out.display());

    Ok(data.rewards)
}
