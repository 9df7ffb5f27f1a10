//! Rollout dataset: per-policy state/action/reward arrays plus the setpoint
//! trajectories they were collected against.
//!
//! Array layout:
//! - `x`: `(state_dim, time_steps, repetitions)`
//! - `u`: `(action_dim, time_steps, repetitions)`
//! - `r`: `(time_steps, repetitions)`

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed dataset {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("policy `{0}` is not in the dataset")]
    UnknownPolicy(String),
    #[error("shape mismatch in `{series}`: {detail}")]
    Shape { series: String, detail: String },
    #[error("dataset has {time_steps} time steps and {repetitions} repetitions; both must be non-zero")]
    Empty { time_steps: usize, repetitions: usize },
    #[error("`{series}` has a non-finite value in `{array}` at {index:?}; JSON cannot store it")]
    NonFinite {
        series: String,
        array: &'static str,
        index: Vec<usize>,
    },
}

/// Rollouts of one policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRollouts {
    pub x: Array3<f64>,
    pub u: Array3<f64>,
    pub r: Array2<f64>,
}

impl PolicyRollouts {
    pub fn time_steps(&self) -> usize {
        self.r.nrows()
    }

    pub fn repetitions(&self) -> usize {
        self.r.ncols()
    }

    pub fn state_dim(&self) -> usize {
        self.x.dim().0
    }

    pub fn action_dim(&self) -> usize {
        self.u.dim().0
    }

    /// Checks that `x` and `u` share the time/repetition axes of `r`.
    pub fn check(&self, series: &str) -> Result<(), DatasetError> {
        let (t, r) = self.r.dim();
        for (name, dim) in [("x", self.x.dim()), ("u", self.u.dim())] {
            if (dim.1, dim.2) != (t, r) {
                return Err(DatasetError::Shape {
                    series: series.to_string(),
                    detail: format!(
                        "`{name}` is {:?} but rewards are ({t}, {r}); expected (_, {t}, {r})",
                        dim
                    ),
                });
            }
        }
        Ok(())
    }

    /// Fails on the first NaN or infinity in `x`, `u` or `r`.
    pub fn check_finite(&self, series: &str) -> Result<(), DatasetError> {
        let non_finite = |array: &'static str, index: Vec<usize>| DatasetError::NonFinite {
            series: series.to_string(),
            array,
            index,
        };
        if let Some(((d, t, k), _)) = self.x.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(non_finite("x", vec![d, t, k]));
        }
        if let Some(((d, t, k), _)) = self.u.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(non_finite("u", vec![d, t, k]));
        }
        if let Some(((t, k), _)) = self.r.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(non_finite("r", vec![t, k]));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutDataset {
    /// Baseline rollouts; kept apart from `policies` so no user policy name
    /// can shadow it.
    pub oracle: PolicyRollouts,
    pub policies: BTreeMap<String, PolicyRollouts>,
    #[serde(default)]
    pub reference: BTreeMap<String, Vec<f64>>,
}

impl RolloutDataset {
    pub fn new(oracle: PolicyRollouts) -> Self {
        Self {
            oracle,
            policies: BTreeMap::new(),
            reference: BTreeMap::new(),
        }
    }

    pub fn policy(&self, name: &str) -> Result<&PolicyRollouts, DatasetError> {
        self.policies
            .get(name)
            .ok_or_else(|| DatasetError::UnknownPolicy(name.to_string()))
    }

    /// Verifies the shared-shape invariant and returns `(time_steps, repetitions)`.
    pub fn validate(&self) -> Result<(usize, usize), DatasetError> {
        self.oracle.check("oracle")?;
        let (t, r) = self.oracle.r.dim();
        if t == 0 || r == 0 {
            return Err(DatasetError::Empty {
                time_steps: t,
                repetitions: r,
            });
        }

        for (name, rollouts) in &self.policies {
            rollouts.check(name)?;
            if rollouts.r.dim() != (t, r) {
                return Err(DatasetError::Shape {
                    series: name.clone(),
                    detail: format!(
                        "rewards are {:?} but the oracle's are ({t}, {r})",
                        rollouts.r.dim()
                    ),
                });
            }
        }
        Ok((t, r))
    }

    /// Writes the dataset as JSON. Non-finite values are rejected before
    /// the file is created, since JSON has no encoding for them.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let path = path.as_ref();
        self.check_finite()?;
        let io_err = |source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|source| DatasetError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(io_err)?;

        info!(
            "saved dataset with {} policies (+ oracle) to {}",
            self.policies.len(),
            path.display()
        );
        Ok(())
    }

    fn check_finite(&self) -> Result<(), DatasetError> {
        self.oracle.check_finite("oracle")?;
        for (name, rollouts) in &self.policies {
            rollouts.check_finite(name)?;
        }
        for (key, trajectory) in &self.reference {
            if let Some(i) = trajectory.iter().position(|v| !v.is_finite()) {
                return Err(DatasetError::NonFinite {
                    series: key.clone(),
                    array: "reference",
                    index: vec![i],
                });
            }
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| DatasetError::Format {
            path: path.to_path_buf(),
            source,
        })
    }
}
