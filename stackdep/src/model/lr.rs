//! Learning rate schedules.

use std::f32;

use failure::{ensure, Fallible};

/// Trait for learning rate schedules.
///
/// A schedule gives the learning rate of an epoch, based on the
/// validation accuracy of the previous epoch, and the learning rate
/// of each batch.
pub trait LearningRateSchedule {
    /// Learning rate for `epoch`, `last_accuracy` is the validation
    /// accuracy after the previous epoch.
    fn epoch_learning_rate(&mut self, epoch: usize, last_accuracy: f32) -> f32;

    /// Learning rate for the batch with index `step`, counted over all
    /// epochs.
    fn step_learning_rate(&mut self, step: usize) -> f32;
}

fn warmup(lr: f32, warmup_steps: usize, step: usize) -> f32 {
    if step < warmup_steps {
        lr * step as f32 / warmup_steps as f32
    } else {
        lr
    }
}

/// Constant learning rate.
pub struct ConstantLearningRate {
    lr: f32,
}

impl ConstantLearningRate {
    pub fn new(lr: f32) -> Fallible<Self> {
        ensure!(lr > 0., "Learning rate must be positive, was: {}", lr);
        Ok(ConstantLearningRate { lr })
    }
}

impl LearningRateSchedule for ConstantLearningRate {
    fn epoch_learning_rate(&mut self, _epoch: usize, _last_accuracy: f32) -> f32 {
        self.lr
    }

    fn step_learning_rate(&mut self, _step: usize) -> f32 {
        self.lr
    }
}

/// Exponential decay of the learning rate.
///
/// The learning rate of an epoch is
/// *initial_lr * decay_rate ^ (epoch / decay_epochs)*, with integer
/// division when `staircase` is used.
pub struct ExponentialDecay {
    initial_lr: f32,
    current_lr: f32,
    decay_rate: f32,
    decay_epochs: usize,
    staircase: bool,
    warmup_steps: usize,
}

impl ExponentialDecay {
    pub fn new(
        initial_lr: f32,
        decay_rate: f32,
        decay_epochs: usize,
        staircase: bool,
        warmup_steps: usize,
    ) -> Fallible<Self> {
        ensure!(initial_lr > 0., "Learning rate must be positive, was: {}", initial_lr);
        ensure!(
            decay_rate > 0. && decay_rate < 1.,
            "Decay rate must be in (0, 1), was: {}",
            decay_rate
        );
        ensure!(decay_epochs > 0, "Number of decay epochs must be non-zero");

        Ok(ExponentialDecay {
            initial_lr,
            current_lr: initial_lr,
            decay_rate,
            decay_epochs,
            staircase,
            warmup_steps,
        })
    }
}

impl LearningRateSchedule for ExponentialDecay {
    fn epoch_learning_rate(&mut self, epoch: usize, _last_accuracy: f32) -> f32 {
        let exponent = if self.staircase {
            (epoch / self.decay_epochs) as f32
        } else {
            epoch as f32 / self.decay_epochs as f32
        };

        self.current_lr = self.initial_lr * self.decay_rate.powf(exponent);
        self.current_lr
    }

    fn step_learning_rate(&mut self, step: usize) -> f32 {
        warmup(self.initial_lr, self.warmup_steps, step).min(self.current_lr)
    }
}

/// Scale the learning rate when the validation accuracy stops improving.
pub struct PlateauLearningRate {
    lr: f32,
    scale: f32,
    best_accuracy: f32,
    epochs_without_improvement: usize,
    patience: usize,
    warmup_steps: usize,
}

impl PlateauLearningRate {
    /// The learning rate is multiplied by `scale` after `patience`
    /// epochs without improvement.
    pub fn new(
        initial_lr: f32,
        scale: f32,
        patience: usize,
        warmup_steps: usize,
    ) -> Fallible<Self> {
        ensure!(initial_lr > 0., "Learning rate must be positive, was: {}", initial_lr);
        ensure!(
            scale > 0. && scale <= 1.,
            "Learning rate scale must be in (0, 1], was: {}",
            scale
        );
        ensure!(patience > 0, "Learning rate patience must be non-zero");

        Ok(PlateauLearningRate {
            lr: initial_lr,
            scale,
            best_accuracy: -f32::INFINITY,
            epochs_without_improvement: 0,
            patience,
            warmup_steps,
        })
    }
}

impl LearningRateSchedule for PlateauLearningRate {
    fn epoch_learning_rate(&mut self, _epoch: usize, last_accuracy: f32) -> f32 {
        if last_accuracy > self.best_accuracy {
            self.best_accuracy = last_accuracy;
            self.epochs_without_improvement = 0;
            return self.lr;
        }

        self.epochs_without_improvement += 1;
        if self.epochs_without_improvement == self.patience {
            self.lr *= self.scale;
            self.epochs_without_improvement = 0;
        }

        self.lr
    }

    fn step_learning_rate(&mut self, step: usize) -> f32 {
        warmup(self.lr, self.warmup_steps, step)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{
        ConstantLearningRate, ExponentialDecay, LearningRateSchedule, PlateauLearningRate,
    };

    #[test]
    fn constant_lr() {
        let mut constant = ConstantLearningRate::new(0.05).unwrap();
        for epoch in 0..10 {
            assert_relative_eq!(constant.epoch_learning_rate(epoch, 0.5), 0.05);
            assert_relative_eq!(constant.step_learning_rate(epoch * 100), 0.05);
        }
        assert!(ConstantLearningRate::new(0.).is_err());
    }

    #[test]
    fn exponential_decay_staircase() {
        let mut decay = ExponentialDecay::new(0.1, 0.5, 4, true, 0).unwrap();
        assert_relative_eq!(decay.epoch_learning_rate(0, 0.), 0.1);
        assert_relative_eq!(decay.epoch_learning_rate(3, 0.), 0.1);
        assert_relative_eq!(decay.epoch_learning_rate(4, 0.), 0.05);
        assert_relative_eq!(decay.epoch_learning_rate(9, 0.), 0.025);
        assert_relative_eq!(decay.step_learning_rate(1000), 0.025);
    }

    #[test]
    fn exponential_decay_smooth() {
        let mut decay = ExponentialDecay::new(0.1, 0.5, 4, false, 0).unwrap();
        assert_relative_eq!(decay.epoch_learning_rate(2, 0.), 0.070710678);
        assert_relative_eq!(decay.epoch_learning_rate(8, 0.), 0.025);
    }

    #[test]
    fn exponential_decay_warmup() {
        let mut decay = ExponentialDecay::new(0.1, 0.5, 4, true, 4).unwrap();
        assert_relative_eq!(decay.step_learning_rate(0), 0.0);
        assert_relative_eq!(decay.step_learning_rate(1), 0.025);
        assert_relative_eq!(decay.step_learning_rate(2), 0.05);
        assert_relative_eq!(decay.step_learning_rate(4), 0.1);
        assert_relative_eq!(decay.step_learning_rate(10), 0.1);
    }

    #[test]
    fn plateau_lr() {
        let mut plateau = PlateauLearningRate::new(0.1, 0.5, 2, 0).unwrap();
        assert_relative_eq!(plateau.epoch_learning_rate(0, 0.6), 0.1);
        assert_relative_eq!(plateau.epoch_learning_rate(1, 0.7), 0.1);
        assert_relative_eq!(plateau.epoch_learning_rate(2, 0.7), 0.1);
        assert_relative_eq!(plateau.epoch_learning_rate(3, 0.65), 0.05);
        assert_relative_eq!(plateau.epoch_learning_rate(4, 0.7), 0.05);
        assert_relative_eq!(plateau.epoch_learning_rate(5, 0.7), 0.025);
        assert_relative_eq!(plateau.epoch_learning_rate(6, 0.8), 0.025);
        assert_relative_eq!(plateau.step_learning_rate(100), 0.025);
    }

    #[test]
    fn plateau_lr_warmup() {
        let mut plateau = PlateauLearningRate::new(0.1, 0.5, 2, 2).unwrap();
        assert_relative_eq!(plateau.step_learning_rate(0), 0.0);
        assert_relative_eq!(plateau.step_learning_rate(1), 0.05);
        assert_relative_eq!(plateau.step_learning_rate(2), 0.1);
    }

    #[test]
    fn invalid_schedules() {
        assert!(ExponentialDecay::new(0.1, 1.5, 4, true, 0).is_err());
        assert!(ExponentialDecay::new(0.1, 0.5, 0, true, 0).is_err());
        assert!(PlateauLearningRate::new(0.1, 0.5, 0, 0).is_err());
        assert!(PlateauLearningRate::new(-0.1, 0.5, 2, 0).is_err());
    }
}
