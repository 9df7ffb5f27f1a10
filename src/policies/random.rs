use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::policy::Policy;

/// Uniformly random actions inside the action bounds.
pub struct RandomPolicy {
    bounds: Vec<(f64, f64)>,
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(bounds: Vec<(f64, f64)>, seed: u64) -> Self {
        Self {
            bounds,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn select_action(&mut self, _observation: &[f64]) -> Vec<f64> {
        self.bounds
            .iter()
            .map(|&(low, high)| {
                if high > low {
                    self.rng.random_range(low..=high)
                } else {
                    low
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_stay_in_bounds_and_are_reproducible() {
        let bounds = vec![(295.0, 302.0), (0.0, 0.0)];
        let mut a = RandomPolicy::new(bounds.clone(), 11);
        let mut b = RandomPolicy::new(bounds, 11);
        for _ in 0..100 {
            let act = a.select_action(&[]);
            assert!((295.0..=302.0).contains(&act[0]));
            assert_eq!(act[1], 0.0);
            assert_eq!(act, b.select_action(&[]));
        }
    }
}
