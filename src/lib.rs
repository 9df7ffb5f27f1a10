// data collection
pub mod environments;
pub mod policies;
pub mod rollout;

// data + statistics
pub mod dataset;
pub mod stats;
pub mod utils;

// figure
pub mod plot;

// Traits
pub mod environment;
pub mod policy;

pub use dataset::{DatasetError, PolicyRollouts, RolloutDataset};
pub use plot::{PlotConfig, PlotError, performance_plots};
pub use rollout::{RolloutConfig, RolloutError, collect_rollouts, collect_to_file};
