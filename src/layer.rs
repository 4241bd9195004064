// layer.rs
// Description: Model layers (forward, backward, parameter access). Implements the dense layer
//              with optional batch normalization and inverted dropout attached to it, and the
//              flat parameter hooks used by checkpoint save and load.
//
//              Backward passes compute the input gradient with the pre-update weights, then
//              step the layer's own optimizers.
//
// History:
// - 2026-10-02: Reduce layer set to Dense, BatchNorm and Dropout for the MLP.
// - 2026-10-03: Add layer specs so checkpoints can rebuild the network.
// - 2026-10-05: Cache dropout masks so backward matches forward.

use std::any::Any;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::activation::Activation;
use crate::error::{MlpError, Result};
use crate::optimizer::{OptimizerConfig, ParamOptimizer};

pub const MAX_DROPOUT_P: f32 = 0.95;

// ----------------------------------------
// Layer trait
// ----------------------------------------

pub trait Layer {
    fn layer_type(&self) -> &str;

    fn input_dim(&self) -> usize;
    fn output_dim(&self) -> usize;

    // Conventions:
    // - input: [batch, input_dim]
    // - output: [batch, output_dim]
    fn forward(&mut self, a_input: &Array2<f32>) -> Array2<f32>;

    // Takes dL/doutput, updates own parameters, returns dL/dinput.
    fn backward(&mut self, a_grads: &Array2<f32>, d_lr: f32) -> Array2<f32>;

    fn parameters(&self) -> usize;

    // Checkpoint hooks.
    fn get_parameters_flat(&self) -> Vec<f32>;
    fn set_parameters_flat(&mut self, v_params: &[f32]) -> Result<usize>;

    fn set_training(&mut self, _b_training: bool) {}

    fn configure_optimizer(&mut self, _optimizer: &OptimizerConfig) {}

    // Optional downcast.
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

// Copies the head of v_params into a_target, replacing non-finite values with 0.0.
fn load_flat_into(a_target: &mut Array2<f32>, v_params: &[f32], s_code: &str) -> Result<usize> {
    let i_needed = a_target.len();
    if v_params.len() < i_needed {
        return Err(MlpError::checkpoint(format!("checkpoint_not_enough_params_{}", s_code)));
    }
    for (d_dst, &d_src) in a_target.iter_mut().zip(v_params.iter()) {
        *d_dst = if d_src.is_finite() { d_src } else { 0.0 };
    }
    Ok(i_needed)
}

// ----------------------------------------
// Dropout (inverted)
// ----------------------------------------

#[derive(Clone, Debug)]
pub struct Dropout {
    d_p: f32,
    b_training: bool,
    rng: StdRng,
    cached_mask: Option<Array2<f32>>,
}

impl Dropout {
    pub fn new(d_p: f32, u64_seed: u64) -> Self {
        Self {
            d_p: clamp_dropout_p(d_p),
            b_training: true,
            rng: StdRng::seed_from_u64(u64_seed),
            cached_mask: None,
        }
    }

    pub fn p(&self) -> f32 {
        self.d_p
    }

    pub fn set_training(&mut self, b_training: bool) {
        self.b_training = b_training;
    }

    // y = x * mask / (1 - p)
    pub fn apply(&mut self, a_x: &Array2<f32>) -> Array2<f32> {
        if !self.b_training || self.d_p <= 0.0 || a_x.is_empty() {
            self.cached_mask = None;
            return a_x.clone();
        }

        let d_keep = 1.0 - self.d_p;
        let d_scale = 1.0 / d_keep;
        let rng = &mut self.rng;
        let a_mask = Array2::from_shape_fn(a_x.raw_dim(), |_| {
            let d_u: f32 = rng.random_range(0.0..1.0);
            if d_u < d_keep {
                d_scale
            } else {
                0.0
            }
        });

        let a_out = a_x * &a_mask;
        self.cached_mask = Some(a_mask);
        a_out
    }

    pub fn backward(&self, a_grads: &Array2<f32>) -> Array2<f32> {
        match self.cached_mask.as_ref() {
            Some(a_mask) if a_mask.raw_dim() == a_grads.raw_dim() => a_grads * a_mask,
            _ => a_grads.clone(),
        }
    }
}

fn clamp_dropout_p(d_p: f32) -> f32 {
    if d_p.is_finite() {
        d_p.clamp(0.0, MAX_DROPOUT_P)
    } else {
        0.0
    }
}

// ----------------------------------------
// BatchNorm
// ----------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchNormConfig {
    pub d_momentum: f32,
    pub d_epsilon: f32,
}

impl Default for BatchNormConfig {
    fn default() -> Self {
        Self {
            d_momentum: 0.99,
            d_epsilon: 1e-3,
        }
    }
}

pub struct BatchNorm {
    config: BatchNormConfig,
    gamma: Array2<f32>,
    beta: Array2<f32>,
    running_mean: Array2<f32>,
    running_var: Array2<f32>,
    b_training: bool,

    cached_x_hat: Option<Array2<f32>>,
    cached_inv_std: Option<Array2<f32>>,
    b_cached_batch_stats: bool,

    opt_gamma: ParamOptimizer,
    opt_beta: ParamOptimizer,
}

impl BatchNorm {
    pub fn new(i_features: usize, config: BatchNormConfig) -> Self {
        let d_momentum = if config.d_momentum.is_finite() {
            config.d_momentum.clamp(0.0, 1.0)
        } else {
            0.99
        };
        let d_epsilon = if config.d_epsilon.is_finite() && config.d_epsilon > 0.0 {
            config.d_epsilon
        } else {
            1e-3
        };
        let optimizer = OptimizerConfig::default();

        Self {
            config: BatchNormConfig { d_momentum, d_epsilon },
            gamma: Array2::ones((1, i_features)),
            beta: Array2::zeros((1, i_features)),
            running_mean: Array2::zeros((1, i_features)),
            running_var: Array2::ones((1, i_features)),
            b_training: true,
            cached_x_hat: None,
            cached_inv_std: None,
            b_cached_batch_stats: false,
            opt_gamma: optimizer.build((1, i_features)),
            opt_beta: optimizer.build((1, i_features)),
        }
    }

    pub fn config(&self) -> BatchNormConfig {
        self.config
    }

    pub fn running_mean(&self) -> &Array2<f32> {
        &self.running_mean
    }

    pub fn running_var(&self) -> &Array2<f32> {
        &self.running_var
    }
}

impl Layer for BatchNorm {
    fn layer_type(&self) -> &str {
        "BatchNorm"
    }

    fn input_dim(&self) -> usize {
        self.gamma.ncols()
    }

    fn output_dim(&self) -> usize {
        self.gamma.ncols()
    }

    fn forward(&mut self, a_input: &Array2<f32>) -> Array2<f32> {
        let i_rows = a_input.nrows();
        if i_rows == 0 || a_input.ncols() != self.gamma.ncols() {
            return a_input.clone();
        }

        let d_eps = self.config.d_epsilon;
        let (a_mean, a_var) = if self.b_training {
            let d_n = i_rows as f32;
            let a_mean = a_input.sum_axis(Axis(0)).insert_axis(Axis(0)) / d_n;
            let a_centered = a_input - &a_mean;
            let a_var = a_centered.mapv(|x| x * x).sum_axis(Axis(0)).insert_axis(Axis(0)) / d_n;

            let d_m = self.config.d_momentum;
            self.running_mean = &self.running_mean * d_m + &a_mean * (1.0 - d_m);
            self.running_var = &self.running_var * d_m + &a_var * (1.0 - d_m);
            (a_mean, a_var)
        } else {
            (self.running_mean.clone(), self.running_var.clone())
        };

        let a_inv_std = a_var.mapv(|v| 1.0 / (v.max(0.0) + d_eps).sqrt());
        let a_x_hat = (a_input - &a_mean) * &a_inv_std;
        let a_out = &a_x_hat * &self.gamma + &self.beta;

        self.cached_x_hat = Some(a_x_hat);
        self.cached_inv_std = Some(a_inv_std);
        self.b_cached_batch_stats = self.b_training;

        a_out
    }

    fn backward(&mut self, a_grads: &Array2<f32>, d_lr: f32) -> Array2<f32> {
        let (a_x_hat, a_inv_std) = match (self.cached_x_hat.as_ref(), self.cached_inv_std.as_ref()) {
            (Some(x), Some(s)) => (x, s),
            _ => return a_grads.clone(),
        };
        if a_x_hat.raw_dim() != a_grads.raw_dim() {
            warn!(
                expected = ?a_x_hat.dim(),
                actual = ?a_grads.dim(),
                "batch norm backward shape mismatch"
            );
            return a_grads.clone();
        }

        let a_grad_gamma = (a_grads * a_x_hat).sum_axis(Axis(0)).insert_axis(Axis(0));
        let a_grad_beta = a_grads.sum_axis(Axis(0)).insert_axis(Axis(0));
        let a_grad_x_hat = a_grads * &self.gamma;

        let a_grad_x = if self.b_cached_batch_stats {
            // dx = inv_std / N * (N * dx_hat - sum(dx_hat) - x_hat * sum(dx_hat * x_hat))
            let d_n = a_grads.nrows() as f32;
            let a_sum = a_grad_x_hat.sum_axis(Axis(0)).insert_axis(Axis(0));
            let a_sum_xhat = (&a_grad_x_hat * a_x_hat).sum_axis(Axis(0)).insert_axis(Axis(0));
            let a_inner = &a_grad_x_hat * d_n - &a_sum - &(a_x_hat * &a_sum_xhat);
            a_inner * &(a_inv_std / d_n)
        } else {
            a_grad_x_hat * a_inv_std
        };

        self.opt_gamma.step(&mut self.gamma, &a_grad_gamma, d_lr);
        self.opt_beta.step(&mut self.beta, &a_grad_beta, d_lr);

        a_grad_x
    }

    fn parameters(&self) -> usize {
        self.gamma.len() + self.beta.len() + self.running_mean.len() + self.running_var.len()
    }

    fn get_parameters_flat(&self) -> Vec<f32> {
        let mut v: Vec<f32> = Vec::with_capacity(self.parameters());
        v.extend(self.gamma.iter().copied());
        v.extend(self.beta.iter().copied());
        v.extend(self.running_mean.iter().copied());
        v.extend(self.running_var.iter().copied());
        v
    }

    fn set_parameters_flat(&mut self, v_params: &[f32]) -> Result<usize> {
        if v_params.len() < self.parameters() {
            return Err(MlpError::checkpoint("checkpoint_not_enough_params_batch_norm"));
        }
        let mut i_pos = load_flat_into(&mut self.gamma, v_params, "batch_norm")?;
        i_pos += load_flat_into(&mut self.beta, &v_params[i_pos..], "batch_norm")?;
        i_pos += load_flat_into(&mut self.running_mean, &v_params[i_pos..], "batch_norm")?;
        i_pos += load_flat_into(&mut self.running_var, &v_params[i_pos..], "batch_norm")?;
        Ok(i_pos)
    }

    fn set_training(&mut self, b_training: bool) {
        self.b_training = b_training;
    }

    fn configure_optimizer(&mut self, optimizer: &OptimizerConfig) {
        self.opt_gamma = optimizer.build(self.gamma.dim());
        self.opt_beta = optimizer.build(self.beta.dim());
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}

// ----------------------------------------
// Dense
// ----------------------------------------

// Serializable description of a dense layer and its attachments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub i_input_dim: usize,
    pub i_units: usize,
    pub activation: Activation,
    pub opt_dropout_p: Option<f32>,
    pub opt_batch_norm: Option<BatchNormConfig>,
}

impl LayerSpec {
    /// Flat parameter count of the described layer, `None` on overflow.
    pub fn parameter_count(&self) -> Option<usize> {
        let i_dense = self.i_input_dim.checked_mul(self.i_units)?.checked_add(self.i_units)?;
        match self.opt_batch_norm {
            Some(_) => self.i_units.checked_mul(4)?.checked_add(i_dense),
            None => Some(i_dense),
        }
    }
}

pub struct Dense {
    w: Array2<f32>,
    b: Array2<f32>,
    activation: Activation,
    dropout: Option<Dropout>,
    batch_norm: Option<BatchNorm>,
    b_training: bool,
    u64_seed: u64,

    cached_input: Option<Array2<f32>>,
    cached_z: Option<Array2<f32>>,
    cached_a: Option<Array2<f32>>,

    opt_w: ParamOptimizer,
    opt_b: ParamOptimizer,
}

impl Dense {
    pub fn new(i_input_dim: usize, i_units: usize, activation: Activation, u64_seed: u64) -> Result<Self> {
        if i_input_dim == 0 || i_units == 0 {
            return Err(MlpError::invalid_parameter("dense_dims_must_be_positive"));
        }

        let mut rng = StdRng::seed_from_u64(u64_seed);
        let d_std = (2.0 / i_input_dim as f32).sqrt();
        let normal = Normal::new(0.0, d_std)
            .map_err(|_| MlpError::invalid_parameter("dense_init_distribution_invalid"))?;
        let optimizer = OptimizerConfig::default();

        debug!(i_input_dim, i_units, %activation, "dense layer created");

        Ok(Self {
            w: Array2::from_shape_fn((i_input_dim, i_units), |_| normal.sample(&mut rng)),
            b: Array2::zeros((1, i_units)),
            activation,
            dropout: None,
            batch_norm: None,
            b_training: true,
            u64_seed,
            cached_input: None,
            cached_z: None,
            cached_a: None,
            opt_w: optimizer.build((i_input_dim, i_units)),
            opt_b: optimizer.build((1, i_units)),
        })
    }

    pub fn from_spec(spec: &LayerSpec, u64_seed: u64) -> Result<Self> {
        let mut dense = Self::new(spec.i_input_dim, spec.i_units, spec.activation, u64_seed)?;
        if let Some(d_p) = spec.opt_dropout_p {
            dense.set_dropout(d_p);
        }
        if let Some(config) = spec.opt_batch_norm {
            dense.set_batch_norm(config);
        }
        Ok(dense)
    }

    pub fn spec(&self) -> LayerSpec {
        LayerSpec {
            i_input_dim: self.w.nrows(),
            i_units: self.w.ncols(),
            activation: self.activation,
            opt_dropout_p: self.dropout.as_ref().map(|d| d.p()),
            opt_batch_norm: self.batch_norm.as_ref().map(|bn| bn.config()),
        }
    }

    pub fn units(&self) -> usize {
        self.w.ncols()
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.w
    }

    pub fn bias(&self) -> &Array2<f32> {
        &self.b
    }

    pub fn set_activation(&mut self, activation: Activation) {
        self.activation = activation;
    }

    pub fn set_dropout(&mut self, d_p: f32) {
        let mut dropout = Dropout::new(d_p, self.u64_seed ^ 0x5A5A_5A5A_5A5A_5A5A);
        dropout.set_training(self.b_training);
        self.dropout = Some(dropout);
    }

    pub fn set_batch_norm(&mut self, config: BatchNormConfig) {
        let mut bn = BatchNorm::new(self.w.ncols(), config);
        bn.set_training(self.b_training);
        self.batch_norm = Some(bn);
    }
}

impl Layer for Dense {
    fn layer_type(&self) -> &str {
        "Dense"
    }

    fn input_dim(&self) -> usize {
        self.w.nrows()
    }

    fn output_dim(&self) -> usize {
        self.w.ncols()
    }

    fn forward(&mut self, a_input: &Array2<f32>) -> Array2<f32> {
        let mut a_z = a_input.dot(&self.w) + &self.b;
        if let Some(bn) = self.batch_norm.as_mut() {
            a_z = bn.forward(&a_z);
        }
        let a_a = self.activation.apply(&a_z);

        let a_out = match self.dropout.as_mut() {
            Some(dropout) => dropout.apply(&a_a),
            None => a_a.clone(),
        };

        self.cached_input = Some(a_input.clone());
        self.cached_z = Some(a_z);
        self.cached_a = Some(a_a);

        a_out
    }

    fn backward(&mut self, a_grads: &Array2<f32>, d_lr: f32) -> Array2<f32> {
        let (a_input, a_z, a_a) = match (
            self.cached_input.as_ref(),
            self.cached_z.as_ref(),
            self.cached_a.as_ref(),
        ) {
            (Some(x), Some(z), Some(a)) => (x, z, a),
            _ => {
                warn!("dense backward called before forward");
                return Array2::zeros((a_grads.nrows(), self.w.nrows()));
            }
        };
        if a_a.raw_dim() != a_grads.raw_dim() {
            warn!(expected = ?a_a.dim(), actual = ?a_grads.dim(), "dense backward shape mismatch");
            return Array2::zeros((a_grads.nrows(), self.w.nrows()));
        }

        let a_grad_a = match self.dropout.as_ref() {
            Some(dropout) => dropout.backward(a_grads),
            None => a_grads.clone(),
        };

        let a_grad_z = self.activation.backward(a_z, a_a, &a_grad_a);
        let a_delta = match self.batch_norm.as_mut() {
            Some(bn) => bn.backward(&a_grad_z, d_lr),
            None => a_grad_z,
        };

        let a_grad_w = a_input.t().dot(&a_delta);
        let a_grad_b = a_delta.sum_axis(Axis(0)).insert_axis(Axis(0));
        let a_grad_input = a_delta.dot(&self.w.t());

        self.opt_w.step(&mut self.w, &a_grad_w, d_lr);
        self.opt_b.step(&mut self.b, &a_grad_b, d_lr);

        a_grad_input
    }

    fn parameters(&self) -> usize {
        self.w.len() + self.b.len() + self.batch_norm.as_ref().map_or(0, |bn| bn.parameters())
    }

    fn get_parameters_flat(&self) -> Vec<f32> {
        let mut v: Vec<f32> = Vec::with_capacity(self.parameters());
        v.extend(self.w.iter().copied());
        v.extend(self.b.iter().copied());
        if let Some(bn) = self.batch_norm.as_ref() {
            v.extend(bn.get_parameters_flat());
        }
        v
    }

    fn set_parameters_flat(&mut self, v_params: &[f32]) -> Result<usize> {
        if v_params.len() < self.parameters() {
            return Err(MlpError::checkpoint("checkpoint_not_enough_params_dense"));
        }
        let mut i_pos = load_flat_into(&mut self.w, v_params, "dense")?;
        i_pos += load_flat_into(&mut self.b, &v_params[i_pos..], "dense")?;
        if let Some(bn) = self.batch_norm.as_mut() {
            i_pos += bn.set_parameters_flat(&v_params[i_pos..])?;
        }
        Ok(i_pos)
    }

    fn set_training(&mut self, b_training: bool) {
        self.b_training = b_training;
        if let Some(dropout) = self.dropout.as_mut() {
            dropout.set_training(b_training);
        }
        if let Some(bn) = self.batch_norm.as_mut() {
            bn.set_training(b_training);
        }
    }

    fn configure_optimizer(&mut self, optimizer: &OptimizerConfig) {
        self.opt_w = optimizer.build(self.w.dim());
        self.opt_b = optimizer.build(self.b.dim());
        if let Some(bn) = self.batch_norm.as_mut() {
            bn.configure_optimizer(optimizer);
        }
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}
