// optimizer.rs
// Description: Per-parameter optimizers (SGD with momentum, AdamW) used by the dense layers.
// History:
// - 2026-10-02: Move AdamW into its own module and add SGD with momentum.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum OptimizerConfig {
    Sgd { momentum: f32 },
    AdamW { weight_decay: f32 },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Sgd { momentum: 0.0 }
    }
}

impl OptimizerConfig {
    pub fn build(&self, t_shape: (usize, usize)) -> ParamOptimizer {
        match *self {
            OptimizerConfig::Sgd { momentum } => ParamOptimizer::Sgd(Sgd::new(t_shape, momentum)),
            OptimizerConfig::AdamW { weight_decay } => {
                ParamOptimizer::AdamW(AdamW::new(t_shape, weight_decay))
            }
        }
    }
}

#[derive(Clone, Debug)]
pub enum ParamOptimizer {
    Sgd(Sgd),
    AdamW(AdamW),
}

impl ParamOptimizer {
    pub fn step(&mut self, a_params: &mut Array2<f32>, a_grads: &Array2<f32>, d_lr: f32) {
        match self {
            ParamOptimizer::Sgd(opt) => opt.step(a_params, a_grads, d_lr),
            ParamOptimizer::AdamW(opt) => opt.step(a_params, a_grads, d_lr),
        }
    }
}

fn lr_is_usable(d_lr: f32) -> bool {
    d_lr.is_finite() && d_lr > 0.0
}

// ----------------------------------------
// SGD with momentum
// ----------------------------------------

#[derive(Clone, Debug)]
pub struct Sgd {
    d_momentum: f32,
    m_velocity: Array2<f32>,
}

impl Sgd {
    pub fn new(t_shape: (usize, usize), d_momentum: f32) -> Self {
        let d_mom = if d_momentum.is_finite() {
            d_momentum.clamp(0.0, 0.999)
        } else {
            0.0
        };

        Self {
            d_momentum: d_mom,
            m_velocity: Array2::zeros(t_shape),
        }
    }

    // v = momentum * v - lr * g; params += v
    pub fn step(&mut self, a_params: &mut Array2<f32>, a_grads: &Array2<f32>, d_lr: f32) {
        if !lr_is_usable(d_lr) || a_params.raw_dim() != a_grads.raw_dim() {
            return;
        }
        if self.m_velocity.raw_dim() != a_params.raw_dim() {
            self.m_velocity = Array2::zeros(a_params.raw_dim());
        }

        self.m_velocity = &self.m_velocity * self.d_momentum - a_grads * d_lr;
        *a_params += &self.m_velocity;
    }
}

// ----------------------------------------
// AdamW
// ----------------------------------------

#[derive(Clone, Debug)]
pub struct AdamW {
    d_beta1: f32,
    d_beta2: f32,
    d_eps: f32,
    d_weight_decay: f32,
    i_t: usize,
    m_m: Array2<f32>,
    m_v: Array2<f32>,
}

impl AdamW {
    pub fn new(t_shape: (usize, usize), d_weight_decay: f32) -> Self {
        let d_wd = if d_weight_decay.is_finite() && d_weight_decay >= 0.0 {
            d_weight_decay
        } else {
            0.0
        };

        Self {
            d_beta1: 0.9,
            d_beta2: 0.999,
            d_eps: 1e-8,
            d_weight_decay: d_wd,
            i_t: 0,
            m_m: Array2::zeros(t_shape),
            m_v: Array2::zeros(t_shape),
        }
    }

    // AdamW step:
    // - Decoupled weight decay: params = params - lr * wd * params
    // - Adam moments update uses gradients only.
    pub fn step(&mut self, a_params: &mut Array2<f32>, a_grads: &Array2<f32>, d_lr: f32) {
        if !lr_is_usable(d_lr) || a_params.raw_dim() != a_grads.raw_dim() {
            return;
        }
        if self.m_m.raw_dim() != a_params.raw_dim() {
            self.m_m = Array2::zeros(a_params.raw_dim());
            self.m_v = Array2::zeros(a_params.raw_dim());
            self.i_t = 0;
        }

        self.i_t = self.i_t.saturating_add(1);

        if self.d_weight_decay > 0.0 {
            let d_decay = d_lr * self.d_weight_decay;
            if d_decay.is_finite() && d_decay > 0.0 {
                a_params.mapv_inplace(|x| x - d_decay * x);
            }
        }

        self.m_m = &self.m_m * self.d_beta1 + a_grads * (1.0 - self.d_beta1);
        self.m_v = &self.m_v * self.d_beta2 + a_grads.mapv(|x| x * x) * (1.0 - self.d_beta2);

        let d_t = self.i_t as f32;
        let d_b1_corr = (1.0 - self.d_beta1.powf(d_t)).max(1e-12);
        let d_b2_corr = (1.0 - self.d_beta2.powf(d_t)).max(1e-12);

        let d_eps = self.d_eps;
        let mut a_update = self.m_m.mapv(|x| x / d_b1_corr);
        a_update.zip_mut_with(&self.m_v, |m, &v| {
            *m /= (v / d_b2_corr).sqrt() + d_eps;
        });

        a_params.scaled_add(-d_lr, &a_update);
    }
}
