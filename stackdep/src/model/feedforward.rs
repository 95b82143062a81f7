use std::convert::TryFrom;

use failure::{ensure, format_err, Error, Fallible};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use serde_derive::{Deserialize, Serialize};

use super::Classifier;

/// Activation function of a hidden layer.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    pub(crate) fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Relu => x.max(0.),
            Activation::Sigmoid => 1. / (1. + (-x).exp()),
            Activation::Tanh => x.tanh(),
        }
    }

    /// Derivative, expressed in terms of the activation output.
    pub(crate) fn derivative(self, y: f32) -> f32 {
        match self {
            Activation::Relu => {
                if y > 0. {
                    1.
                } else {
                    0.
                }
            }
            Activation::Sigmoid => y * (1. - y),
            Activation::Tanh => 1. - y * y,
        }
    }
}

/// A fully connected layer.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Dense {
    /// Weight matrix, shape `(outputs, inputs)`.
    pub(crate) weights: Array2<f32>,
    pub(crate) bias: Array1<f32>,

    /// `None` for the output layer, which produces logits.
    pub(crate) activation: Option<Activation>,
}

impl Dense {
    fn random<R>(
        rng: &mut R,
        n_inputs: usize,
        n_outputs: usize,
        activation: Option<Activation>,
    ) -> Self
    where
        R: Rng,
    {
        // Xavier/Glorot uniform initialization.
        let limit = (6. / (n_inputs + n_outputs) as f32).sqrt();
        let weights =
            Array2::from_shape_fn((n_outputs, n_inputs), |_| rng.gen_range(-limit, limit));

        Dense {
            weights,
            bias: Array1::zeros(n_outputs),
            activation,
        }
    }

    pub(crate) fn n_inputs(&self) -> usize {
        self.weights.ncols()
    }

    pub(crate) fn n_outputs(&self) -> usize {
        self.weights.nrows()
    }

    /// Apply the layer to a batch of shape `(batch, inputs)`.
    pub(crate) fn forward(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut outputs = inputs.dot(&self.weights.t()) + &self.bias;
        if let Some(activation) = self.activation {
            outputs.mapv_inplace(|v| activation.apply(v));
        }
        outputs
    }
}

/// Feed-forward action classifier.
///
/// The network consists of zero or more hidden layers followed by a
/// linear output layer. Predictions are normalized with a softmax.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "FeedForwardParams", into = "FeedForwardParams")]
pub struct FeedForward {
    pub(crate) layers: Vec<Dense>,
}

impl FeedForward {
    /// Construct a network with random weights.
    ///
    /// `hidden` lists the size and activation of each hidden layer.
    pub fn random(
        n_inputs: usize,
        hidden: &[(usize, Activation)],
        n_outputs: usize,
        seed: u64,
    ) -> Fallible<Self> {
        ensure!(n_inputs > 0, "Network must have at least one input");
        ensure!(n_outputs > 0, "Network must have at least one output");

        let mut rng = XorShiftRng::seed_from_u64(seed);
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut layer_inputs = n_inputs;
        for &(units, activation) in hidden {
            ensure!(units > 0, "Hidden layers must have at least one unit");
            layers.push(Dense::random(&mut rng, layer_inputs, units, Some(activation)));
            layer_inputs = units;
        }
        layers.push(Dense::random(&mut rng, layer_inputs, n_outputs, None));

        Ok(FeedForward { layers })
    }

    /// Compute the activations of all layers for a batch.
    ///
    /// The first element is the input, the last element holds the
    /// logits of the output layer.
    pub(crate) fn forward(&self, inputs: ArrayView2<f32>) -> Vec<Array2<f32>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(inputs.to_owned());
        for layer in &self.layers {
            let next = layer.forward(activations[activations.len() - 1].view());
            activations.push(next);
        }
        activations
    }

    /// Class probabilities for a batch of shape `(batch, inputs)`.
    pub fn predict_batch(&self, inputs: ArrayView2<f32>) -> Fallible<Array2<f32>> {
        ensure!(
            inputs.ncols() == self.n_inputs(),
            "Network expects {} inputs, got {}",
            self.n_inputs(),
            inputs.ncols()
        );

        let mut outputs = self
            .forward(inputs)
            .pop()
            .ok_or_else(|| format_err!("Network without layers"))?;
        softmax_rows(&mut outputs);

        Ok(outputs)
    }
}

impl Classifier for FeedForward {
    fn n_inputs(&self) -> usize {
        self.layers.first().map(Dense::n_inputs).unwrap_or(0)
    }

    fn n_outputs(&self) -> usize {
        self.layers.last().map(Dense::n_outputs).unwrap_or(0)
    }

    fn predict(&self, input: &[f32]) -> Fallible<Vec<f32>> {
        let input = ArrayView1::from(input);
        let batch = input.insert_axis(Axis(0));
        let probs = self.predict_batch(batch)?;
        Ok(probs.into_raw_vec())
    }
}

/// Normalize each row of logits to a probability distribution.
pub(crate) fn softmax_rows(logits: &mut Array2<f32>) {
    for mut row in logits.genrows_mut() {
        let max = row.fold(std::f32::NEG_INFINITY, |max, &v| max.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
}

/// Serializable parameters of a layer.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LayerParams {
    pub n_inputs: usize,
    pub n_outputs: usize,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
    pub activation: Option<Activation>,
}

/// Serializable parameters of a feed-forward network.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FeedForwardParams {
    pub layers: Vec<LayerParams>,
}

impl From<FeedForward> for FeedForwardParams {
    fn from(network: FeedForward) -> Self {
        let layers = network
            .layers
            .into_iter()
            .map(|layer| LayerParams {
                n_inputs: layer.n_inputs(),
                n_outputs: layer.n_outputs(),
                weights: layer.weights.iter().cloned().collect(),
                bias: layer.bias.to_vec(),
                activation: layer.activation,
            })
            .collect();

        FeedForwardParams { layers }
    }
}

impl TryFrom<FeedForwardParams> for FeedForward {
    type Error = Error;

    fn try_from(params: FeedForwardParams) -> Result<Self, Self::Error> {
        ensure!(!params.layers.is_empty(), "Network without layers");

        let mut layers: Vec<Dense> = Vec::with_capacity(params.layers.len());
        for (idx, layer) in params.layers.into_iter().enumerate() {
            if let Some(prev) = layers.last() {
                ensure!(
                    prev.n_outputs() == layer.n_inputs,
                    "Layer {} has {} inputs, previous layer has {} outputs",
                    idx,
                    layer.n_inputs,
                    prev.n_outputs()
                );
            }
            ensure!(
                layer.bias.len() == layer.n_outputs,
                "Layer {} has {} biases, expected {}",
                idx,
                layer.bias.len(),
                layer.n_outputs
            );

            let weights = Array2::from_shape_vec((layer.n_outputs, layer.n_inputs), layer.weights)?;
            layers.push(Dense {
                weights,
                bias: Array1::from(layer.bias),
                activation: layer.activation,
            });
        }

        Ok(FeedForward { layers })
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};

    use super::{softmax_rows, Activation, Dense, FeedForward, FeedForwardParams};
    use crate::model::Classifier;

    #[test]
    fn random_network_is_reproducible() {
        let hidden = [(8, Activation::Relu), (4, Activation::Tanh)];
        let network1 = FeedForward::random(10, &hidden, 3, 42).unwrap();
        let network2 = FeedForward::random(10, &hidden, 3, 42).unwrap();
        assert_eq!(network1, network2);

        assert_eq!(network1.n_inputs(), 10);
        assert_eq!(network1.n_outputs(), 3);
        assert_eq!(network1.layers.len(), 3);
    }

    #[test]
    fn predictions_are_distributions() {
        let network = FeedForward::random(5, &[(6, Activation::Sigmoid)], 4, 1).unwrap();
        let probs = network.predict(&[0.1, 0.5, 0., 1., 0.3]).unwrap();
        assert_eq!(probs.len(), 4);
        assert_relative_eq!(probs.iter().sum::<f32>(), 1., epsilon = 1e-5);
        assert!(probs.iter().all(|&p| p > 0. && p < 1.));

        assert!(network.predict(&[0.1, 0.5]).is_err());
    }

    #[test]
    fn linear_network() {
        let network = FeedForward {
            layers: vec![Dense {
                weights: arr2(&[[1., 0.], [0., 1.]]),
                bias: arr1(&[0., 0.]),
                activation: None,
            }],
        };

        let probs = network.predict(&[0., 0.]).unwrap();
        assert_relative_eq!(probs[0], 0.5);
        assert_relative_eq!(probs[1], 0.5);
    }

    #[test]
    fn softmax_is_stable() {
        let mut logits = arr2(&[[1000., 1000.], [0., -1000.]]);
        softmax_rows(&mut logits);
        assert_relative_eq!(logits[(0, 0)], 0.5);
        assert_relative_eq!(logits[(1, 0)], 1.);
        assert_relative_eq!(logits[(1, 1)], 0.);
    }

    #[test]
    fn params_preserve_network() {
        let network = FeedForward::random(3, &[(2, Activation::Relu)], 2, 7).unwrap();
        let params = FeedForwardParams::from(network.clone());
        assert_eq!(params.layers[0].weights.len(), 6);
        assert_eq!(FeedForward::try_from(params).unwrap(), network);
    }

    #[test]
    fn params_are_validated() {
        let network = FeedForward::random(3, &[(2, Activation::Relu)], 2, 7).unwrap();
        let mut params = FeedForwardParams::from(network);
        params.layers[1].n_inputs = 3;
        assert!(FeedForward::try_from(params).is_err());
    }

    #[test]
    fn activation_derivatives() {
        assert_relative_eq!(Activation::Relu.derivative(Activation::Relu.apply(-1.)), 0.);
        assert_relative_eq!(Activation::Relu.derivative(Activation::Relu.apply(2.)), 1.);
        assert_relative_eq!(Activation::Sigmoid.apply(0.), 0.5);
        assert_relative_eq!(Activation::Sigmoid.derivative(0.5), 0.25);
        assert_relative_eq!(Activation::Tanh.derivative(Activation::Tanh.apply(0.)), 1.);
    }
}
