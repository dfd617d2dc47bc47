//! Small dense feedforward network trained with mini-batch SGD.
//!
//! Mirrors the browser model: ReLU hidden layers, one sigmoid output and
//! binary cross-entropy loss.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use super::features::FEATURE_COUNT;
use super::labels::RISK_THRESHOLD;

/// Layer widths shared with the TensorFlow.js model on the predictor page.
pub const ATTRITION_LAYERS: [usize; 4] = [FEATURE_COUNT, 16, 8, 1];

const EPSILON: f64 = 1e-7;

#[derive(Debug, Error, PartialEq)]
pub enum NetworkError {
    #[error("a network needs at least an input and an output layer")]
    InvalidShape,
    #[error("the training set is empty")]
    EmptyDataset,
    #[error("expected {expected} inputs, got {found}")]
    WidthMismatch { expected: usize, found: usize },
    #[error("{samples} samples but {labels} labels")]
    LabelCountMismatch { samples: usize, labels: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Activation {
    Relu,
    Sigmoid,
}

impl Activation {
    fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Relu => z.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-z).exp()),
        }
    }
}

#[derive(Debug, Clone)]
struct Dense {
    inputs: usize,
    outputs: usize,
    /// Row-major `outputs × inputs`.
    weights: Vec<f64>,
    biases: Vec<f64>,
    activation: Activation,
}

impl Dense {
    fn new(inputs: usize, outputs: usize, activation: Activation, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();
        Self {
            inputs,
            outputs,
            weights,
            biases: vec![0.0; outputs],
            activation,
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        (0..self.outputs)
            .map(|o| {
                let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
                let z: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + self.biases[o];
                self.activation.apply(z)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 150,
            learning_rate: 0.05,
            batch_size: 16,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct TrainingReport {
    pub epochs: usize,
    pub samples: usize,
    pub initial_loss: f64,
    pub final_loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Dense>,
}

impl Network {
    /// Builds a network with Xavier-uniform weights drawn from `seed`.
    pub fn new(sizes: &[usize], seed: u64) -> Result<Self, NetworkError> {
        if sizes.len() < 2 || sizes.contains(&0) {
            return Err(NetworkError::InvalidShape);
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let last = sizes.len() - 2;
        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let activation = if i == last { Activation::Sigmoid } else { Activation::Relu };
                Dense::new(pair[0], pair[1], activation, &mut rng)
            })
            .collect();
        Ok(Self { layers })
    }

    pub fn attrition(seed: u64) -> Self {
        Self::new(&ATTRITION_LAYERS, seed).expect("attrition layer widths are non-zero")
    }

    pub fn input_width(&self) -> usize {
        self.layers[0].inputs
    }

    /// Activations of every layer, input first.
    fn trace(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());
        for layer in &self.layers {
            let next = layer.forward(activations.last().map(Vec::as_slice).unwrap_or_default());
            activations.push(next);
        }
        activations
    }

    fn check_width(&self, input: &[f64]) -> Result<(), NetworkError> {
        if input.len() != self.input_width() {
            return Err(NetworkError::WidthMismatch {
                expected: self.input_width(),
                found: input.len(),
            });
        }
        Ok(())
    }

    /// Probability of the positive class.
    pub fn predict(&self, input: &[f64]) -> Result<f64, NetworkError> {
        self.check_width(input)?;
        Ok(self.trace(input).last().and_then(|out| out.first()).copied().unwrap_or(0.5))
    }

    /// Mean binary cross-entropy.
    pub fn loss(&self, xs: &[Vec<f64>], ys: &[f64]) -> Result<f64, NetworkError> {
        validate(self, xs, ys)?;
        let total: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, &y)| {
                let p = self.predict(x).unwrap_or(0.5).clamp(EPSILON, 1.0 - EPSILON);
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum();
        Ok(total / xs.len() as f64)
    }

    pub fn accuracy(&self, xs: &[Vec<f64>], ys: &[f64]) -> Result<f64, NetworkError> {
        validate(self, xs, ys)?;
        let correct = xs
            .iter()
            .zip(ys)
            .filter(|(x, y)| {
                let p = self.predict(x).unwrap_or(0.5);
                (p >= RISK_THRESHOLD) == (**y >= RISK_THRESHOLD)
            })
            .count();
        Ok(correct as f64 / xs.len() as f64)
    }

    pub fn fit(
        &mut self,
        xs: &[Vec<f64>],
        ys: &[f64],
        config: &TrainingConfig,
    ) -> Result<TrainingReport, NetworkError> {
        validate(self, xs, ys)?;
        let initial_loss = self.loss(xs, ys)?;

        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
        let mut order: Vec<usize> = (0..xs.len()).collect();
        let batch_size = config.batch_size.max(1);

        for _ in 0..config.epochs {
            order.shuffle(&mut rng);
            for batch in order.chunks(batch_size) {
                self.step(xs, ys, batch, config.learning_rate);
            }
        }

        Ok(TrainingReport {
            epochs: config.epochs,
            samples: xs.len(),
            initial_loss,
            final_loss: self.loss(xs, ys)?,
            accuracy: self.accuracy(xs, ys)?,
        })
    }

    /// One gradient step averaged over `batch`.
    fn step(&mut self, xs: &[Vec<f64>], ys: &[f64], batch: &[usize], learning_rate: f64) {
        let mut weight_grads: Vec<Vec<f64>> = self.layers.iter().map(|l| vec![0.0; l.weights.len()]).collect();
        let mut bias_grads: Vec<Vec<f64>> = self.layers.iter().map(|l| vec![0.0; l.biases.len()]).collect();

        for &i in batch {
            let activations = self.trace(&xs[i]);
            let output = &activations[self.layers.len()];
            // sigmoid + cross-entropy: dL/dz = p - y
            let mut delta: Vec<f64> = output.iter().map(|p| p - ys[i]).collect();

            for l in (0..self.layers.len()).rev() {
                let layer = &self.layers[l];
                let input = &activations[l];
                for o in 0..layer.outputs {
                    bias_grads[l][o] += delta[o];
                    for j in 0..layer.inputs {
                        weight_grads[l][o * layer.inputs + j] += delta[o] * input[j];
                    }
                }
                if l == 0 {
                    break;
                }
                // propagate through the previous (ReLU) layer
                delta = (0..layer.inputs)
                    .map(|j| {
                        if input[j] <= 0.0 {
                            return 0.0;
                        }
                        (0..layer.outputs)
                            .map(|o| layer.weights[o * layer.inputs + j] * delta[o])
                            .sum()
                    })
                    .collect();
            }
        }

        let scale = learning_rate / batch.len() as f64;
        for (l, layer) in self.layers.iter_mut().enumerate() {
            for (w, g) in layer.weights.iter_mut().zip(&weight_grads[l]) {
                *w -= scale * g;
            }
            for (b, g) in layer.biases.iter_mut().zip(&bias_grads[l]) {
                *b -= scale * g;
            }
        }
    }
}

fn validate(network: &Network, xs: &[Vec<f64>], ys: &[f64]) -> Result<(), NetworkError> {
    if xs.is_empty() {
        return Err(NetworkError::EmptyDataset);
    }
    if xs.len() != ys.len() {
        return Err(NetworkError::LabelCountMismatch {
            samples: xs.len(),
            labels: ys.len(),
        });
    }
    for x in xs {
        network.check_width(x)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable(n: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let xs: Vec<Vec<f64>> = (0..n)
            .map(|_| (0..FEATURE_COUNT).map(|_| rng.gen_range(0.0..1.0)).collect())
            .collect();
        let ys = xs.iter().map(|x| if x[3] < 0.5 { 1.0 } else { 0.0 }).collect();
        (xs, ys)
    }

    #[test]
    fn rejects_degenerate_shapes() {
        assert_eq!(Network::new(&[4], 1).unwrap_err(), NetworkError::InvalidShape);
        assert_eq!(Network::new(&[4, 0, 1], 1).unwrap_err(), NetworkError::InvalidShape);
    }

    #[test]
    fn predictions_are_probabilities() {
        let network = Network::attrition(7);
        let p = network.predict(&[0.5; FEATURE_COUNT]).unwrap();
        assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn width_mismatch_is_reported() {
        let network = Network::attrition(7);
        assert_eq!(
            network.predict(&[0.1, 0.2]).unwrap_err(),
            NetworkError::WidthMismatch {
                expected: FEATURE_COUNT,
                found: 2
            }
        );
    }

    #[test]
    fn fit_requires_matching_labels() {
        let mut network = Network::attrition(7);
        let config = TrainingConfig::default();
        assert_eq!(network.fit(&[], &[], &config).unwrap_err(), NetworkError::EmptyDataset);
        assert_eq!(
            network
                .fit(&[vec![0.0; FEATURE_COUNT]], &[1.0, 0.0], &config)
                .unwrap_err(),
            NetworkError::LabelCountMismatch { samples: 1, labels: 2 }
        );
    }

    #[test]
    fn learns_a_single_feature_threshold() {
        let (xs, ys) = separable(200, 3);
        let mut network = Network::attrition(11);
        let config = TrainingConfig {
            epochs: 200,
            learning_rate: 0.3,
            batch_size: 16,
            seed: 11,
        };
        let report = network.fit(&xs, &ys, &config).unwrap();

        assert!(report.final_loss < report.initial_loss);
        assert!(report.accuracy > 0.9, "accuracy was {}", report.accuracy);
        assert_eq!(report.samples, 200);
    }

    #[test]
    fn training_is_deterministic_for_a_seed() {
        let (xs, ys) = separable(40, 5);
        let config = TrainingConfig {
            epochs: 20,
            ..TrainingConfig::default()
        };
        let mut a = Network::attrition(9);
        let mut b = Network::attrition(9);
        a.fit(&xs, &ys, &config).unwrap();
        b.fit(&xs, &ys, &config).unwrap();
        assert_eq!(a.predict(&xs[0]).unwrap(), b.predict(&xs[0]).unwrap());
    }
}
