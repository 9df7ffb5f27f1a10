use log::warn;

use crate::policy::Policy;

/// Single-loop proportional controller:
/// `u = bias + gain * (obs[setpoint_index] - obs[measured_index])`, clipped.
#[derive(Debug, Clone)]
pub struct ProportionalPolicy {
    pub measured_index: usize,
    pub setpoint_index: usize,
    pub gain: f64,
    pub bias: f64,
    pub bounds: (f64, f64),
    warned: bool,
}

impl ProportionalPolicy {
    pub fn new(measured_index: usize, setpoint_index: usize, gain: f64, bias: f64, bounds: (f64, f64)) -> Self {
        Self {
            measured_index,
            setpoint_index,
            gain,
            bias,
            bounds,
            warned: false,
        }
    }
}

impl Policy for ProportionalPolicy {
    fn select_action(&mut self, observation: &[f64]) -> Vec<f64> {
        let error = match (
            observation.get(self.setpoint_index),
            observation.get(self.measured_index),
        ) {
            (Some(sp), Some(y)) => sp - y,
            _ => {
                if !self.warned {
                    warn!(
                        "observation has {} entries but indices {} (measured) and {} (setpoint) are used; holding bias {}",
                        observation.len(),
                        self.measured_index,
                        self.setpoint_index,
                        self.bias
                    );
                    self.warned = true;
                }
                0.0
            }
        };
        let u = self.bias + self.gain * error;
        vec![u.clamp(self.bounds.0, self.bounds.1)]
    }
}
