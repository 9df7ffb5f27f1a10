use crate::policy::Policy;

/// Always applies the same action.
#[derive(Debug, Clone)]
pub struct ConstantPolicy {
    pub action: Vec<f64>,
}

impl ConstantPolicy {
    pub fn new(action: Vec<f64>) -> Self {
        Self { action }
    }
}

impl Policy for ConstantPolicy {
    fn select_action(&mut self, _observation: &[f64]) -> Vec<f64> {
        self.action.clone()
    }
}
