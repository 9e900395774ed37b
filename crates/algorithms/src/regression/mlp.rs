//! Multilayer perceptron regressor
//!
//! Fully connected network with ReLU hidden layers and a single linear
//! output unit, trained on squared error with an L2 penalty using
//! mini-batch Adam (Kingma & Ba, 2015). Weights use Glorot-uniform
//! initialization. Training stops after `max_epochs` or when the epoch loss
//! has not improved by `tol` for `n_iter_no_change` consecutive epochs.
//!
//! Inputs should be standardized; the regression-kriging orchestrator does
//! this by default.

use ndarray::{Array, Array1, Array2, Axis, Dimension, Zip};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use geokrige_core::{Error, Result};

use super::{check_predict_cols, check_training_data, Predictable, Trainable};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

/// Hyperparameters for [`MlpRegressor`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpParams {
    /// Width of each hidden layer (default `[64, 32]`)
    pub hidden_layer_sizes: Vec<usize>,
    /// Adam step size (default 1e-3)
    pub learning_rate: f64,
    /// Maximum passes over the training data (default 300)
    pub max_epochs: usize,
    /// Mini-batch size, capped at the sample count (default 32)
    pub batch_size: usize,
    /// L2 penalty on weights (default 1e-4)
    pub alpha: f64,
    /// Minimum loss improvement that resets the early-stopping counter (default 1e-6)
    pub tol: f64,
    /// Epochs without improvement before stopping (default 15)
    pub n_iter_no_change: usize,
    /// Seed for weight initialization and batch shuffling
    pub seed: u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![64, 32],
            learning_rate: 1e-3,
            max_epochs: 300,
            batch_size: 32,
            alpha: 1e-4,
            tol: 1e-6,
            n_iter_no_change: 15,
            seed: 0,
        }
    }
}

impl MlpParams {
    fn validate(&self) -> Result<()> {
        if self.hidden_layer_sizes.iter().any(|&w| w == 0) {
            return Err(Error::invalid_param(
                "hidden_layer_sizes",
                format!("{:?}", self.hidden_layer_sizes),
                "layer widths must be positive",
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::invalid_param("learning_rate", self.learning_rate, "must be positive"));
        }
        if self.batch_size == 0 {
            return Err(Error::invalid_param("batch_size", 0, "must be positive"));
        }
        if self.max_epochs == 0 {
            return Err(Error::invalid_param("max_epochs", 0, "must be positive"));
        }
        if !(self.alpha >= 0.0) {
            return Err(Error::invalid_param("alpha", self.alpha, "must be non-negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Dense {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl Dense {
    fn glorot(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
        Self {
            weights: Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit)),
            bias: Array1::from_shape_fn(fan_out, |_| rng.gen_range(-limit..limit)),
        }
    }

    fn zeros_like(&self) -> Self {
        Self {
            weights: Array2::zeros(self.weights.raw_dim()),
            bias: Array1::zeros(self.bias.raw_dim()),
        }
    }
}

/// Multilayer perceptron for scalar regression.
#[derive(Debug, Clone, Default)]
pub struct MlpRegressor {
    params: MlpParams,
    layers: Vec<Dense>,
    n_features: Option<usize>,
    loss_curve: Vec<f64>,
}

impl MlpRegressor {
    pub fn new(params: MlpParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn params(&self) -> &MlpParams {
        &self.params
    }

    /// Mean training loss after each epoch of the last fit.
    pub fn loss_curve(&self) -> &[f64] {
        &self.loss_curve
    }

    fn forward(&self, x: &Array2<f64>) -> Array1<f64> {
        let last = self.layers.len() - 1;
        let mut a = x.to_owned();
        for (i, layer) in self.layers.iter().enumerate() {
            a = a.dot(&layer.weights) + &layer.bias;
            if i < last {
                a.mapv_inplace(relu);
            }
        }
        a.column(0).to_owned()
    }

    /// Loss and per-layer gradients for one mini-batch.
    fn backprop(&self, x: &Array2<f64>, y: &Array1<f64>) -> (f64, Vec<Dense>) {
        let b = x.nrows() as f64;
        let alpha = self.params.alpha;
        let n_layers = self.layers.len();

        let mut activations = Vec::with_capacity(n_layers + 1);
        activations.push(x.to_owned());
        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = activations[i].dot(&layer.weights) + &layer.bias;
            if i + 1 < n_layers {
                z.mapv_inplace(relu);
            }
            activations.push(z);
        }

        let err = &activations[n_layers].column(0) - y;
        let l2: f64 = self
            .layers
            .iter()
            .map(|l| l.weights.iter().map(|w| w * w).sum::<f64>())
            .sum();
        let loss = 0.5 * err.dot(&err) / b + 0.5 * alpha * l2 / b;

        let mut delta: Array2<f64> = err.insert_axis(Axis(1)) / b;
        let mut grads = Vec::with_capacity(n_layers);
        for i in (0..n_layers).rev() {
            let layer = &self.layers[i];
            let weights = activations[i].t().dot(&delta) + &(&layer.weights * (alpha / b));
            let bias = delta.sum_axis(Axis(0));
            if i > 0 {
                let mut back = delta.dot(&layer.weights.t());
                // ReLU derivative: zero where the hidden unit was inactive
                Zip::from(&mut back)
                    .and(&activations[i])
                    .for_each(|d, &a| {
                        if a <= 0.0 {
                            *d = 0.0;
                        }
                    });
                delta = back;
            }
            grads.push(Dense { weights, bias });
        }
        grads.reverse();
        (loss, grads)
    }
}

impl Trainable for MlpRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.n_features = None;
        check_training_data(x, y)?;
        self.params.validate()?;

        let n = x.nrows();
        let p = x.ncols();
        let mut rng = StdRng::seed_from_u64(self.params.seed);

        let mut sizes = Vec::with_capacity(self.params.hidden_layer_sizes.len() + 2);
        sizes.push(p);
        sizes.extend_from_slice(&self.params.hidden_layer_sizes);
        sizes.push(1);
        self.layers = sizes
            .windows(2)
            .map(|w| Dense::glorot(w[0], w[1], &mut rng))
            .collect();
        self.loss_curve.clear();

        let mut first_moment: Vec<Dense> = self.layers.iter().map(Dense::zeros_like).collect();
        let mut second_moment: Vec<Dense> = self.layers.iter().map(Dense::zeros_like).collect();
        let mut step = 0_i32;

        let batch = self.params.batch_size.min(n);
        let mut order: Vec<usize> = (0..n).collect();
        let mut best_loss = f64::INFINITY;
        let mut stale = 0;

        for epoch in 0..self.params.max_epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for chunk in order.chunks(batch) {
                let xb = x.select(Axis(0), chunk);
                let yb = y.select(Axis(0), chunk);
                let (loss, grads) = self.backprop(&xb, &yb);
                epoch_loss += loss * chunk.len() as f64;

                step = step.saturating_add(1);
                let lr_t = self.params.learning_rate * (1.0 - BETA2.powi(step)).sqrt()
                    / (1.0 - BETA1.powi(step));
                for (((layer, grad), m), v) in self
                    .layers
                    .iter_mut()
                    .zip(&grads)
                    .zip(first_moment.iter_mut())
                    .zip(second_moment.iter_mut())
                {
                    adam_update(&mut layer.weights, &grad.weights, &mut m.weights, &mut v.weights, lr_t);
                    adam_update(&mut layer.bias, &grad.bias, &mut m.bias, &mut v.bias, lr_t);
                }
            }

            epoch_loss /= n as f64;
            if !epoch_loss.is_finite() {
                return Err(Error::Algorithm(format!(
                    "MLP training diverged at epoch {} (try a smaller learning_rate)",
                    epoch
                )));
            }
            self.loss_curve.push(epoch_loss);

            if epoch_loss > best_loss - self.params.tol {
                stale += 1;
                if stale >= self.params.n_iter_no_change {
                    debug!("MLP early stop at epoch {} (loss {:.6})", epoch, epoch_loss);
                    break;
                }
            } else {
                stale = 0;
            }
            best_loss = best_loss.min(epoch_loss);
        }

        self.n_features = Some(p);
        debug!(
            "MLP fitted: layers {:?}, {} epochs, final loss {:.6}",
            sizes,
            self.loss_curve.len(),
            self.loss_curve.last().copied().unwrap_or(f64::NAN)
        );
        Ok(())
    }
}

impl Predictable for MlpRegressor {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_predict_cols(self.n_features, x)?;
        Ok(self.forward(x))
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }
}

#[inline]
fn relu(v: f64) -> f64 {
    v.max(0.0)
}

fn adam_update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    lr_t: f64,
) {
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            *p -= lr_t * *m / (v.sqrt() + ADAM_EPS);
        });
}
