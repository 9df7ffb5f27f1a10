use std::collections::BTreeMap;

use rand::rngs::StdRng;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("action has {got} dimensions, environment expects {expected}")]
    ActionDim { expected: usize, got: usize },
    #[error("action contains a non-finite value")]
    NonFiniteAction,
    #[error("episode already finished after {0} steps; call reset first")]
    EpisodeFinished(usize),
    #[error("invalid environment configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub next_observation: Vec<f64>,
    pub reward: f64,
    pub done: bool,
}

/// Fixed-horizon control environment.
///
/// The observation handed to policies may carry more than the physical
/// state (e.g. the active setpoint); `state()` is what gets recorded.
pub trait Environment {
    /// Resets to a (possibly perturbed) initial condition and returns the
    /// first observation.
    fn reset(&mut self, rng: &mut StdRng) -> Vec<f64>;

    fn step(&mut self, action: &[f64]) -> Result<StepResult, EnvError>;

    /// Physical state at the current time step.
    fn state(&self) -> Vec<f64>;

    fn observe(&self) -> Vec<f64>;

    fn state_dim(&self) -> usize;

    /// Per-dimension `(low, high)` bounds of the action space.
    fn action_bounds(&self) -> Vec<(f64, f64)>;

    fn action_dim(&self) -> usize {
        self.action_bounds().len()
    }

    /// Number of control steps in one episode.
    fn n_steps(&self) -> usize;

    /// Index of the current control step.
    fn time_step(&self) -> usize;

    /// Setpoint trajectories keyed by the tracked variable name.
    fn setpoints(&self) -> BTreeMap<String, Vec<f64>>;
}
