use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use failure::{ensure, Fallible};
use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

use super::feedforward::softmax_rows;
use super::{Classifier, FeedForward, ModelPerformance};
use crate::pattern::Pattern;
use crate::serialization::CborWrite;

/// A batch of patterns.
pub struct Batch {
    /// Inputs, shape `(batch_size, n_inputs)`.
    pub inputs: Array2<f32>,

    /// One-hot encoded actions, shape `(batch_size, n_outputs)`.
    pub targets: Array2<f32>,
}

impl Batch {
    /// Construct a batch from patterns, which must all have the same
    /// input and output lengths.
    pub fn from_patterns<'a, I>(patterns: I) -> Fallible<Self>
    where
        I: IntoIterator<Item = &'a Pattern>,
    {
        let patterns: Vec<_> = patterns.into_iter().collect();
        ensure!(!patterns.is_empty(), "Cannot construct an empty batch");

        let n_inputs = patterns[0].input.len();
        let n_outputs = patterns[0].output.len();

        let mut inputs = Array2::zeros((patterns.len(), n_inputs));
        let mut targets = Array2::zeros((patterns.len(), n_outputs));
        for (idx, pattern) in patterns.iter().enumerate() {
            ensure!(
                pattern.input.len() == n_inputs && pattern.output.len() == n_outputs,
                "Pattern {} in batch has shape ({}, {}), expected ({}, {})",
                idx,
                pattern.input.len(),
                pattern.output.len(),
                n_inputs,
                n_outputs
            );

            for (v, &input) in inputs.row_mut(idx).iter_mut().zip(&pattern.input) {
                *v = input;
            }
            for (v, &output) in targets.row_mut(idx).iter_mut().zip(&pattern.output) {
                *v = output;
            }
        }

        Ok(Batch { inputs, targets })
    }

    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trainer for feed-forward classifiers.
///
/// Training uses mini-batch stochastic gradient descent on the
/// softmax cross-entropy loss.
pub struct Trainer {
    network: FeedForward,
    rng: XorShiftRng,
}

impl Trainer {
    /// Construct a trainer, `seed` seeds the shuffling of batches.
    pub fn new(network: FeedForward, seed: u64) -> Self {
        Trainer {
            network,
            rng: XorShiftRng::seed_from_u64(seed),
        }
    }

    pub fn network(&self) -> &FeedForward {
        &self.network
    }

    pub fn into_network(self) -> FeedForward {
        self.network
    }

    /// Split patterns into batches.
    ///
    /// When `shuffle` is used, the patterns are shuffled first.
    pub fn batches(
        &mut self,
        patterns: &[Pattern],
        batch_size: usize,
        shuffle: bool,
    ) -> Fallible<Vec<Batch>> {
        ensure!(batch_size > 0, "Batch size must be non-zero");

        let mut indices: Vec<_> = (0..patterns.len()).collect();
        if shuffle {
            indices.shuffle(&mut self.rng);
        }

        indices
            .chunks(batch_size)
            .map(|chunk| Batch::from_patterns(chunk.iter().map(|&idx| &patterns[idx])))
            .collect()
    }

    /// Update the network on a batch.
    ///
    /// The returned performance is that of the network before the
    /// update.
    pub fn train(&mut self, batch: &Batch, learning_rate: f32) -> Fallible<ModelPerformance> {
        self.check_batch(batch)?;

        let mut activations = self.network.forward(batch.inputs.view());
        let mut probs = activations
            .pop()
            .ok_or_else(|| failure::err_msg("Network without layers"))?;
        softmax_rows(&mut probs);
        let perf = performance(&probs, &batch.targets);

        let layer_activations: Vec<_> = self
            .network
            .layers
            .iter()
            .map(|layer| layer.activation)
            .collect();

        // Gradient of the mean cross-entropy with respect to the logits.
        let mut delta = (probs - &batch.targets) / batch.len() as f32;

        for (idx, layer) in self.network.layers.iter_mut().enumerate().rev() {
            let layer_inputs = &activations[idx];

            let weights_grad = delta.t().dot(layer_inputs);
            let bias_grad = delta.sum_axis(Axis(0));

            if idx > 0 {
                let mut prev_delta = delta.dot(&layer.weights);
                if let Some(activation) = layer_activations[idx - 1] {
                    prev_delta.zip_mut_with(layer_inputs, |d, &y| *d *= activation.derivative(y));
                }
                delta = prev_delta;
            }

            layer.weights.scaled_add(-learning_rate, &weights_grad);
            layer.bias.scaled_add(-learning_rate, &bias_grad);
        }

        Ok(perf)
    }

    /// Compute the performance of the network on a batch.
    pub fn validate(&self, batch: &Batch) -> Fallible<ModelPerformance> {
        self.check_batch(batch)?;
        let probs = self.network.predict_batch(batch.inputs.view())?;
        Ok(performance(&probs, &batch.targets))
    }

    /// Save the network parameters.
    pub fn save<P>(&self, path: P) -> Fallible<()>
    where
        P: AsRef<Path>,
    {
        let mut writer = BufWriter::new(File::create(path)?);
        self.network.to_cbor_write(&mut writer)
    }

    fn check_batch(&self, batch: &Batch) -> Fallible<()> {
        ensure!(
            batch.inputs.ncols() == self.network.n_inputs(),
            "Batch has {} inputs, network expects {}",
            batch.inputs.ncols(),
            self.network.n_inputs()
        );
        ensure!(
            batch.targets.ncols() == self.network.n_outputs(),
            "Batch has {} outputs, network expects {}",
            batch.targets.ncols(),
            self.network.n_outputs()
        );

        Ok(())
    }
}

fn argmax<'a>(values: impl IntoIterator<Item = &'a f32>) -> Option<usize> {
    values
        .into_iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (idx, &v)| match best {
            Some((_, best_v)) if best_v >= v => best,
            _ => Some((idx, v)),
        })
        .map(|(idx, _)| idx)
}

fn performance(probs: &Array2<f32>, targets: &Array2<f32>) -> ModelPerformance {
    let n = probs.nrows();
    if n == 0 {
        return ModelPerformance {
            loss: 0.,
            accuracy: 0.,
        };
    }

    let mut loss = 0.;
    let mut correct = 0;
    for (prob_row, target_row) in probs.genrows().into_iter().zip(targets.genrows()) {
        loss -= prob_row
            .iter()
            .zip(target_row.iter())
            .map(|(&p, &t)| t * p.max(1e-12).ln())
            .sum::<f32>();

        if argmax(&prob_row) == argmax(&target_row) {
            correct += 1;
        }
    }

    ModelPerformance {
        loss: loss / n as f32,
        accuracy: correct as f32 / n as f32,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{argmax, Batch, Trainer};
    use crate::model::{Activation, Classifier, FeedForward};
    use crate::pattern::Pattern;

    /// The action is determined by the first input.
    fn separable_patterns() -> Vec<Pattern> {
        vec![
            Pattern::new(vec![0., 0.], vec![1., 0.]),
            Pattern::new(vec![0., 1.], vec![1., 0.]),
            Pattern::new(vec![1., 0.], vec![0., 1.]),
            Pattern::new(vec![1., 1.], vec![0., 1.]),
        ]
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn batches_cover_all_patterns() {
        let network = FeedForward::random(2, &[], 2, 1).unwrap();
        let mut trainer = Trainer::new(network, 1);
        let batches = trainer.batches(&separable_patterns(), 3, true).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len() + batches[1].len(), 4);
        assert!(trainer.batches(&separable_patterns(), 0, false).is_err());
    }

    #[test]
    fn batch_shapes_must_agree() {
        let patterns = vec![
            Pattern::new(vec![0., 0.], vec![1., 0.]),
            Pattern::new(vec![0.], vec![1., 0.]),
        ];
        assert!(Batch::from_patterns(&patterns).is_err());
    }

    #[test]
    fn training_fits_separable_data() {
        let network = FeedForward::random(2, &[], 2, 13).unwrap();
        let mut trainer = Trainer::new(network, 13);
        let batch = Batch::from_patterns(&separable_patterns()).unwrap();

        let initial = trainer.validate(&batch).unwrap();
        for _ in 0..1000 {
            trainer.train(&batch, 0.5).unwrap();
        }
        let trained = trainer.validate(&batch).unwrap();

        assert!(trained.loss < initial.loss);
        assert_relative_eq!(trained.accuracy, 1.);
    }

    #[test]
    fn hidden_layers_reduce_loss() {
        let hidden = [(6, Activation::Relu), (4, Activation::Sigmoid)];
        let network = FeedForward::random(2, &hidden, 2, 3).unwrap();
        let mut trainer = Trainer::new(network, 3);
        let batch = Batch::from_patterns(&separable_patterns()).unwrap();

        let initial = trainer.validate(&batch).unwrap();
        for _ in 0..100 {
            trainer.train(&batch, 0.05).unwrap();
        }

        assert!(trainer.validate(&batch).unwrap().loss < initial.loss);
    }

    #[test]
    fn mismatched_batch_is_rejected() {
        let network = FeedForward::random(3, &[], 2, 1).unwrap();
        let mut trainer = Trainer::new(network, 1);
        let batch = Batch::from_patterns(&separable_patterns()).unwrap();
        assert!(trainer.train(&batch, 0.1).is_err());
        assert_eq!(trainer.network().n_inputs(), 3);
    }
}
