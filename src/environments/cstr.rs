use std::collections::BTreeMap;

use rand::Rng;
use rand::rngs::StdRng;

use crate::environment::{EnvError, Environment, StepResult};

/// Names of the state components, in state-vector order.
pub const STATE_NAMES: [&str; 2] = ["Ca", "T"];

/// Physical constants of the reactor (per-minute time base).
#[derive(Debug, Clone, PartialEq)]
pub struct CstrParams {
    pub q: f64,         // volumetric flow [m^3/min]
    pub v: f64,         // reactor volume [m^3]
    pub rho: f64,       // density [kg/m^3]
    pub c: f64,         // heat capacity [J/(kg K)]
    pub delta_hr: f64,  // heat of reaction [J/mol]
    pub ea_over_r: f64, // activation energy over gas constant [K]
    pub k0: f64,        // pre-exponential factor [1/min]
    pub ua: f64,        // heat transfer coefficient [J/(min K)]
    pub ti: f64,        // feed temperature [K]
    pub caf: f64,       // feed concentration [mol/m^3]
}

impl Default for CstrParams {
    fn default() -> Self {
        Self {
            q: 100.0,
            v: 100.0,
            rho: 1000.0,
            c: 0.239,
            delta_hr: -5.0e4,
            ea_over_r: 8750.0,
            k0: 7.2e10,
            ua: 5.0e4,
            ti: 350.0,
            caf: 1.0,
        }
    }
}

/// Continuous stirred-tank reactor, state `[Ca, T]`, action `[Tc]`.
#[derive(Debug, Clone)]
pub struct Cstr {
    pub params: CstrParams,
    pub state: [f64; 2],
    pub x0: [f64; 2],
    pub init_noise: [f64; 2],
    pub t_final: f64,
    pub step_limit: usize,
    pub step_count: usize,
    pub substeps: usize,
    pub reward_scale: f64,
    pub tc_bounds: (f64, f64),
    setpoints: BTreeMap<String, Vec<f64>>,
}

impl Cstr {
    pub fn new() -> Self {
        let step_limit = 60;
        let mut setpoints = BTreeMap::new();
        setpoints.insert("Ca".to_string(), default_ca_schedule(step_limit));
        Self {
            params: CstrParams::default(),
            state: [0.8, 330.0],
            x0: [0.8, 330.0],
            init_noise: [0.02, 1.0],
            t_final: 25.0,
            step_limit,
            step_count: 0,
            substeps: 10,
            reward_scale: 1.0,
            tc_bounds: (295.0, 302.0),
            setpoints,
        }
    }

    /// Replaces the setpoint schedule. Keys must name a state component and
    /// every trajectory must cover the whole episode.
    pub fn with_setpoints(mut self, setpoints: BTreeMap<String, Vec<f64>>) -> Result<Self, EnvError> {
        for (key, trajectory) in &setpoints {
            if state_index(key).is_none() {
                return Err(EnvError::Config(format!("unknown setpoint variable `{key}`")));
            }
            if trajectory.len() < self.step_limit {
                return Err(EnvError::Config(format!(
                    "setpoint `{key}` has {} entries, episode needs {}",
                    trajectory.len(),
                    self.step_limit
                )));
            }
        }
        self.setpoints = setpoints;
        Ok(self)
    }

    pub fn dt(&self) -> f64 {
        self.t_final / self.step_limit as f64
    }

    fn is_done(&self) -> bool {
        self.step_count >= self.step_limit
    }

    fn derivatives(&self, x: [f64; 2], tc: f64) -> [f64; 2] {
        let p = &self.params;
        let [ca, t] = x;

        let r_a = p.k0 * (-p.ea_over_r / t).exp() * ca;
        let dca = p.q / p.v * (p.caf - ca) - r_a;
        let dt = p.q / p.v * (p.ti - t)
            + (-p.delta_hr) * r_a / (p.rho * p.c)
            + p.ua * (tc - t) / (p.rho * p.c * p.v);
        [dca, dt]
    }

    // classic RK4 over one control interval
    fn integrate(&self, tc: f64) -> [f64; 2] {
        let h = self.dt() / self.substeps.max(1) as f64;
        let mut x = self.state;
        let offset = |x: [f64; 2], k: [f64; 2], s: f64| [x[0] + s * k[0], x[1] + s * k[1]];
        for _ in 0..self.substeps.max(1) {
            let k1 = self.derivatives(x, tc);
            let k2 = self.derivatives(offset(x, k1, h / 2.0), tc);
            let k3 = self.derivatives(offset(x, k2, h / 2.0), tc);
            let k4 = self.derivatives(offset(x, k3, h), tc);
            for i in 0..2 {
                x[i] += h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
            }
        }
        x
    }

    fn setpoint_at(&self, trajectory: &[f64], step: usize) -> f64 {
        let idx = step.min(trajectory.len().saturating_sub(1));
        trajectory.get(idx).copied().unwrap_or(0.0)
    }

    fn tracking_error(&self, state: &[f64; 2], step: usize) -> f64 {
        self.setpoints
            .iter()
            .filter_map(|(key, sp)| state_index(key).map(|i| (i, sp)))
            .map(|(i, sp)| (state[i] - self.setpoint_at(sp, step)).powi(2))
            .sum()
    }
}

impl Default for Cstr {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for Cstr {
    fn reset(&mut self, rng: &mut StdRng) -> Vec<f64> {
        let mut state = self.x0;
        for (s, noise) in state.iter_mut().zip(self.init_noise) {
            if noise > 0.0 {
                *s += rng.random_range(-noise..noise);
            }
        }
        self.state = state;
        self.step_count = 0;
        self.observe()
    }

    fn step(&mut self, action: &[f64]) -> Result<StepResult, EnvError> {
        if self.is_done() {
            return Err(EnvError::EpisodeFinished(self.step_count));
        }
        if action.len() != 1 {
            return Err(EnvError::ActionDim {
                expected: 1,
                got: action.len(),
            });
        }
        if !action[0].is_finite() {
            return Err(EnvError::NonFiniteAction);
        }

        let tc = action[0].clamp(self.tc_bounds.0, self.tc_bounds.1);
        let next = self.integrate(tc);
        let reward = -self.reward_scale * self.tracking_error(&next, self.step_count);

        self.state = next;
        self.step_count += 1;

        Ok(StepResult {
            next_observation: self.observe(),
            reward,
            done: self.is_done(),
        })
    }

    fn state(&self) -> Vec<f64> {
        self.state.to_vec()
    }

    fn observe(&self) -> Vec<f64> {
        let mut obs = self.state.to_vec();
        for sp in self.setpoints.values() {
            obs.push(self.setpoint_at(sp, self.step_count));
        }
        obs
    }

    fn state_dim(&self) -> usize {
        2 // [Ca, T]
    }

    fn action_bounds(&self) -> Vec<(f64, f64)> {
        vec![self.tc_bounds]
    }

    fn n_steps(&self) -> usize {
        self.step_limit
    }

    fn time_step(&self) -> usize {
        self.step_count
    }

    fn setpoints(&self) -> BTreeMap<String, Vec<f64>> {
        self.setpoints.clone()
    }
}

/// Position of a named state component.
pub fn state_index(name: &str) -> Option<usize> {
    STATE_NAMES.iter().position(|n| *n == name)
}

/// Three equal plateaus at 0.85, 0.90 and 0.87 mol/m^3.
pub fn default_ca_schedule(n_steps: usize) -> Vec<f64> {
    let third = n_steps / 3;
    (0..n_steps)
        .map(|i| match i {
            i if i < third => 0.85,
            i if i < 2 * third => 0.9,
            _ => 0.87,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn episode_runs_for_step_limit_then_refuses() {
        let mut env = Cstr::new();
        let mut rng = StdRng::seed_from_u64(7);
        env.reset(&mut rng);
        for i in 0..env.n_steps() {
            let res = env.step(&[300.0]).unwrap();
            assert_eq!(res.done, i + 1 == env.n_steps());
            assert!(res.reward <= 0.0);
        }
        assert_eq!(env.step(&[300.0]).unwrap_err(), EnvError::EpisodeFinished(60));
    }

    #[test]
    fn wrong_action_dim_is_an_error() {
        let mut env = Cstr::new();
        env.reset(&mut StdRng::seed_from_u64(0));
        let err = env.step(&[300.0, 1.0]).err();
        assert_eq!(err, Some(EnvError::ActionDim { expected: 1, got: 2 }));
    }

    #[test]
    fn observation_carries_active_setpoint() {
        let mut env = Cstr::new();
        let obs = env.reset(&mut StdRng::seed_from_u64(1));
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[2], 0.85);
        for _ in 0..25 {
            env.step(&[300.0]).unwrap();
        }
        assert_eq!(env.observe()[2], 0.9);
    }

    #[test]
    fn colder_coolant_raises_concentration() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut cold = Cstr::new();
        cold.init_noise = [0.0, 0.0];
        cold.reset(&mut rng);
        let mut hot = cold.clone();
        for _ in 0..10 {
            cold.step(&[295.0]).unwrap();
            hot.step(&[302.0]).unwrap();
        }
        assert!(cold.state[0] > hot.state[0]);
        assert!(cold.state.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn short_setpoint_schedule_is_rejected() {
        let mut sp = BTreeMap::new();
        sp.insert("Ca".to_string(), vec![0.85; 10]);
        assert!(matches!(Cstr::new().with_setpoints(sp), Err(EnvError::Config(_))));
    }

    #[test]
    fn default_schedule_has_three_plateaus() {
        let sp = default_ca_schedule(60);
        assert_eq!(sp.len(), 60);
        assert_eq!((sp[0], sp[20], sp[40]), (0.85, 0.9, 0.87));
    }
}
