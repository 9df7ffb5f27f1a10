pub trait Policy {
    // action for the given observation
    fn select_action(&mut self, observation: &[f64]) -> Vec<f64>;

    // called before each repetition
    fn reset(&mut self) {}
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn select_action(&mut self, observation: &[f64]) -> Vec<f64> {
        (**self).select_action(observation)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
