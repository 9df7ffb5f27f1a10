//! Rollout collection: runs every policy and the oracle for a fixed number
//! of repetitions and packs the trajectories into a [`RolloutDataset`].

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::{Array2, Array3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::{DatasetError, PolicyRollouts, RolloutDataset};
use crate::environment::{EnvError, Environment};
use crate::policies::LookaheadOracle;
use crate::policy::Policy;
use crate::stats;
use crate::utils::dataset_path;

#[derive(Error, Debug)]
pub enum RolloutError {
    #[error("policy name `{0}` is given more than once")]
    DuplicatePolicy(String),
    #[error("rollout of `{series}` failed in repetition {repetition}: {source}")]
    Env {
        series: String,
        repetition: usize,
        #[source]
        source: EnvError,
    },
    #[error("repetitions must be at least 1")]
    NoRepetitions,
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("failed to read rollout config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rollout config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutConfig {
    #[serde(default = "RolloutConfig::default_repetitions")]
    pub repetitions: usize,
    /// Lookahead horizon of the oracle, in control steps.
    #[serde(default = "RolloutConfig::default_oracle_horizon")]
    pub oracle_horizon: usize,
    /// Candidate actions per action dimension tried by the oracle.
    #[serde(default = "RolloutConfig::default_oracle_grid")]
    pub oracle_grid: usize,
    #[serde(default)]
    pub seed: u64,
}

impl RolloutConfig {
    fn default_repetitions() -> usize {
        50
    }
    fn default_oracle_horizon() -> usize {
        17
    }
    fn default_oracle_grid() -> usize {
        15
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, RolloutError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| RolloutError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| RolloutError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RolloutError> {
        toml::from_str(text).map_err(|source| RolloutError::ConfigParse {
            path: PathBuf::new(),
            source,
        })
    }
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            repetitions: Self::default_repetitions(),
            oracle_horizon: Self::default_oracle_horizon(),
            oracle_grid: Self::default_oracle_grid(),
            seed: 0,
        }
    }
}

/// Anything that can drive an episode: a plain policy sees observations,
/// the oracle sees the environment itself.
trait Controller<E> {
    fn begin(&mut self) {}
    fn act(&mut self, env: &E, observation: &[f64]) -> Result<Vec<f64>, EnvError>;
}

struct PolicyController<'a>(&'a mut dyn Policy);

impl<E> Controller<E> for PolicyController<'_> {
    fn begin(&mut self) {
        self.0.reset();
    }

    fn act(&mut self, _env: &E, observation: &[f64]) -> Result<Vec<f64>, EnvError> {
        Ok(self.0.select_action(observation))
    }
}

impl<E: Environment + Clone> Controller<E> for LookaheadOracle {
    fn act(&mut self, env: &E, _observation: &[f64]) -> Result<Vec<f64>, EnvError> {
        self.plan(env)
    }
}

/// Runs `repetitions` episodes on clones of `env`. Repetition `k` resets
/// from seed `seed + k`, so every controller faces the same initial
/// conditions.
fn run_repetitions<E, C>(
    env: &E,
    controller: &mut C,
    series: &str,
    config: &RolloutConfig,
) -> Result<PolicyRollouts, RolloutError>
where
    E: Environment + Clone,
    C: Controller<E>,
{
    let steps = env.n_steps();
    let reps = config.repetitions;
    let bounds = env.action_bounds();

    let mut x = Array3::<f64>::zeros((env.state_dim(), steps, reps));
    let mut u = Array3::<f64>::zeros((bounds.len(), steps, reps));
    let mut r = Array2::<f64>::zeros((steps, reps));

    for rep in 0..reps {
        let env_err = |source| RolloutError::Env {
            series: series.to_string(),
            repetition: rep,
            source,
        };

        let mut episode = env.clone();
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(rep as u64));
        let mut observation = episode.reset(&mut rng);
        controller.begin();

        let mut finished = false;
        let mut last_action = vec![0.0; bounds.len()];
        for t in 0..steps {
            for (d, v) in episode.state().into_iter().enumerate() {
                x[[d, t, rep]] = v;
            }
            if finished {
                // early termination: hold the final state and action, no reward
                for (d, v) in last_action.iter().enumerate() {
                    u[[d, t, rep]] = *v;
                }
                continue;
            }

            let action = controller.act(&episode, &observation).map_err(env_err)?;
            let result = episode.step(&action).map_err(env_err)?;

            last_action = action
                .iter()
                .zip(&bounds)
                .map(|(a, &(low, high))| a.clamp(low, high))
                .collect();
            for (d, v) in last_action.iter().enumerate() {
                u[[d, t, rep]] = *v;
            }
            r[[t, rep]] = result.reward;
            observation = result.next_observation;
            finished = result.done;
        }
        debug!("`{series}` repetition {rep}: return {:.5}", r.column(rep).sum());
    }

    Ok(PolicyRollouts { x, u, r })
}

/// Collects rollouts for every named policy plus the oracle, and attaches
/// the environment's setpoints under `reference`.
pub fn collect_rollouts<E>(
    env: &E,
    policies: &mut [(String, Box<dyn Policy>)],
    config: &RolloutConfig,
) -> Result<RolloutDataset, RolloutError>
where
    E: Environment + Clone,
{
    if config.repetitions == 0 {
        return Err(RolloutError::NoRepetitions);
    }
    let mut seen = BTreeSet::new();
    for (name, _) in policies.iter() {
        if !seen.insert(name.as_str()) {
            return Err(RolloutError::DuplicatePolicy(name.clone()));
        }
    }

    let mut oracle = LookaheadOracle::new(config.oracle_horizon, config.oracle_grid);
    let oracle_rollouts = run_repetitions(env, &mut oracle, "oracle", config)?;
    log_returns("oracle", &oracle_rollouts);

    let mut dataset = RolloutDataset::new(oracle_rollouts);
    for (name, policy) in policies.iter_mut() {
        let mut controller = PolicyController(policy.as_mut());
        let rollouts = run_repetitions(env, &mut controller, name, config)?;
        log_returns(name, &rollouts);
        dataset.policies.insert(name.clone(), rollouts);
    }

    dataset.reference = env.setpoints();
    dataset.validate()?;
    Ok(dataset)
}

/// Collects rollouts and writes them to `data_file_name` (`.json` appended
/// when it has no extension). Returns the path written.
pub fn collect_to_file<E>(
    policies: &mut [(String, Box<dyn Policy>)],
    env: &E,
    data_file_name: &str,
    config: &RolloutConfig,
) -> Result<PathBuf, RolloutError>
where
    E: Environment + Clone,
{
    let dataset = collect_rollouts(env, policies, config)?;
    let path = dataset_path(data_file_name);
    dataset.save(&path)?;
    Ok(path)
}

fn log_returns(series: &str, rollouts: &PolicyRollouts) {
    let returns = stats::cumulative_rewards(rollouts.r.view());
    if let Some(m) = stats::median(&returns) {
        info!(
            "collected {} rollouts for `{series}`, median return {m:.5}",
            rollouts.repetitions()
        );
    }
}
