//! Action classifiers.

use failure::Fallible;

mod feedforward;
pub use self::feedforward::{Activation, FeedForward, FeedForwardParams, LayerParams};

mod lr;
pub use self::lr::{
    ConstantLearningRate, ExponentialDecay, LearningRateSchedule, PlateauLearningRate,
};

mod trainer;
pub use self::trainer::{Batch, Trainer};

/// Classifier that scores the actions of the transition system.
pub trait Classifier {
    /// Number of inputs the classifier expects.
    fn n_inputs(&self) -> usize;

    /// Number of scores the classifier returns.
    fn n_outputs(&self) -> usize;

    /// Return one score per action for a feature vector.
    fn predict(&self, input: &[f32]) -> Fallible<Vec<f32>>;
}

impl<'a, C> Classifier for &'a C
where
    C: Classifier + ?Sized,
{
    fn n_inputs(&self) -> usize {
        (**self).n_inputs()
    }

    fn n_outputs(&self) -> usize {
        (**self).n_outputs()
    }

    fn predict(&self, input: &[f32]) -> Fallible<Vec<f32>> {
        (**self).predict(input)
    }
}

/// Results of training or validation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelPerformance {
    /// Model loss.
    pub loss: f32,

    /// Model accuracy
    ///
    /// The accuracy is the fraction of correctly predicted transitions.
    pub accuracy: f32,
}
