use burn::LearningRate;

/// Decays the learning rate by `gamma` every `step_size` steps.
#[derive(Debug, Clone)]
pub struct StepLr {
    base_lr: LearningRate,
    step_size: usize,
    gamma: f64,
    step_count: usize,
}

impl StepLr {
    pub fn new(base_lr: LearningRate, step_size: usize, gamma: f64) -> Self {
        Self {
            base_lr,
            step_size: step_size.max(1),
            gamma,
            step_count: 0,
        }
    }

    pub fn lr(&self) -> LearningRate {
        let decays = (self.step_count / self.step_size) as i32;
        self.base_lr * self.gamma.powi(decays)
    }

    /// Advances by one step and returns the new learning rate.
    pub fn step(&mut self) -> LearningRate {
        self.step_count += 1;
        self.lr()
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }
}
