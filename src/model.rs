// model.rs
// Description: Sequential MLP (add, compile, fit, predict, evaluate) and checkpoint save/load.
//              Activation, dropout and batch normalization components attach to the most
//              recently added dense layer.
//
// History:
// - 2026-10-03: Replace the LLM wrapper with a sequential dense network.
// - 2026-10-04: Mini-batch training over all batches, including the short last batch.
// - 2026-10-05: Add checkpoint rebuild from stored layer specs.

use std::fs;
use std::path::Path;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::activation::Activation;
use crate::checkpoint::ModelCheckpoint;
use crate::config::TrainingConfig;
use crate::dataset::Dataset;
use crate::error::{MlpError, Result};
use crate::layer::{BatchNormConfig, Dense, Layer, LayerSpec};
use crate::math::{self, Loss};
use crate::optimizer::OptimizerConfig;
use crate::{utils, DEFAULT_SEED};

// Dense layer request; input_dim may be left to the previous layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DenseSpec {
    pub i_units: usize,
    pub opt_input_dim: Option<usize>,
    pub activation: Activation,
}

impl DenseSpec {
    pub fn new(i_units: usize) -> Self {
        Self {
            i_units,
            opt_input_dim: None,
            activation: Activation::Linear,
        }
    }

    pub fn with_input_dim(mut self, i_input_dim: usize) -> Self {
        self.opt_input_dim = Some(i_input_dim);
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Component {
    Dense(DenseSpec),
    Activation(Activation),
    Dropout(f32),
    BatchNorm(BatchNormConfig),
}

impl From<DenseSpec> for Component {
    fn from(spec: DenseSpec) -> Self {
        Component::Dense(spec)
    }
}

impl From<Activation> for Component {
    fn from(activation: Activation) -> Self {
        Component::Activation(activation)
    }
}

impl From<BatchNormConfig> for Component {
    fn from(config: BatchNormConfig) -> Self {
        Component::BatchNorm(config)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingHistory {
    pub v_epoch_losses: Vec<f32>,
}

impl TrainingHistory {
    pub fn final_loss(&self) -> Option<f32> {
        self.v_epoch_losses.last().copied()
    }
}

#[derive(Clone, Copy, Debug)]
struct Compiled {
    loss: Loss,
    optimizer: OptimizerConfig,
    d_learning_rate: f32,
}

pub struct Sequential {
    network: Vec<Box<dyn Layer>>,
    compiled: Option<Compiled>,
    u64_seed: u64,
    b_training: bool,
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequential {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(u64_seed: u64) -> Self {
        Self {
            network: Vec::new(),
            compiled: None,
            u64_seed,
            b_training: false,
        }
    }

    fn layer_seed(&self, i_idx: usize) -> u64 {
        self.u64_seed ^ (i_idx as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    fn last_dense_mut(&mut self) -> Option<&mut Dense> {
        self.network
            .last_mut()
            .and_then(|l| l.as_any_mut())
            .and_then(|a| a.downcast_mut::<Dense>())
    }

    pub fn add(&mut self, component: impl Into<Component>) -> Result<()> {
        match component.into() {
            Component::Dense(spec) => self.add_dense(spec),
            Component::Activation(activation) => {
                let dense = self.last_dense_mut().ok_or(MlpError::NoLayerToAttach)?;
                dense.set_activation(activation);
                Ok(())
            }
            Component::Dropout(d_p) => {
                if !d_p.is_finite() || !(0.0..1.0).contains(&d_p) {
                    return Err(MlpError::invalid_parameter("dropout_p_out_of_range"));
                }
                let dense = self.last_dense_mut().ok_or(MlpError::NoLayerToAttach)?;
                dense.set_dropout(d_p);
                Ok(())
            }
            Component::BatchNorm(config) => {
                let dense = self.last_dense_mut().ok_or(MlpError::NoLayerToAttach)?;
                dense.set_batch_norm(config);
                Ok(())
            }
        }
    }

    fn add_dense(&mut self, spec: DenseSpec) -> Result<()> {
        let opt_prev_units = self.network.last().map(|l| l.output_dim());
        let i_input_dim = match (spec.opt_input_dim, opt_prev_units) {
            (Some(i_in), Some(i_prev)) if i_in != i_prev => {
                return Err(MlpError::shape_mismatch(
                    format!("input_dim {}", i_prev),
                    format!("input_dim {}", i_in),
                ));
            }
            (Some(i_in), _) => i_in,
            (None, Some(i_prev)) => i_prev,
            (None, None) => return Err(MlpError::MissingInputDim),
        };

        let dense = Dense::new(i_input_dim, spec.i_units, spec.activation, self.layer_seed(self.network.len()))?;
        self.push_layer(Box::new(dense));
        Ok(())
    }

    fn push_layer(&mut self, mut layer: Box<dyn Layer>) {
        layer.set_training(self.b_training);
        if let Some(compiled) = self.compiled {
            layer.configure_optimizer(&compiled.optimizer);
        }
        self.network.push(layer);
    }

    pub fn compile(&mut self, loss: Loss, optimizer: OptimizerConfig, d_learning_rate: f32) -> Result<()> {
        if !d_learning_rate.is_finite() || d_learning_rate <= 0.0 {
            return Err(MlpError::invalid_parameter("learning_rate_invalid"));
        }
        for layer in self.network.iter_mut() {
            layer.configure_optimizer(&optimizer);
        }
        self.compiled = Some(Compiled {
            loss,
            optimizer,
            d_learning_rate,
        });
        debug!(%loss, ?optimizer, d_learning_rate, "model compiled");
        Ok(())
    }

    pub fn compile_from_config(&mut self, config: &TrainingConfig) -> Result<()> {
        config.validate()?;
        self.compile(config.loss, config.optimizer, config.d_learning_rate)
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn loss(&self) -> Option<Loss> {
        self.compiled.map(|c| c.loss)
    }

    pub fn set_training(&mut self, b_training: bool) {
        self.b_training = b_training;
        for layer in self.network.iter_mut() {
            layer.set_training(b_training);
        }
    }

    pub fn input_dim(&self) -> Option<usize> {
        self.network.first().map(|l| l.input_dim())
    }

    pub fn output_dim(&self) -> Option<usize> {
        self.network.last().map(|l| l.output_dim())
    }

    pub fn network_description(&self) -> String {
        self.network
            .iter()
            .map(|l| l.layer_type())
            .collect::<Vec<&str>>()
            .join(", ")
    }

    pub fn total_parameters(&self) -> usize {
        self.network.iter().map(|l| l.parameters()).sum()
    }

    pub fn summary(&self) -> Vec<String> {
        self.layer_specs()
            .iter()
            .enumerate()
            .map(|(i_idx, spec)| {
                let mut s_line = format!(
                    "[{}] Dense {} -> {} activation={}",
                    i_idx, spec.i_input_dim, spec.i_units, spec.activation
                );
                if spec.opt_batch_norm.is_some() {
                    s_line.push_str(" batch_norm");
                }
                if let Some(d_p) = spec.opt_dropout_p {
                    s_line.push_str(&format!(" dropout={}", d_p));
                }
                s_line
            })
            .collect()
    }

    pub fn layer_specs(&self) -> Vec<LayerSpec> {
        self.network
            .iter()
            .filter_map(|l| l.as_any().and_then(|a| a.downcast_ref::<Dense>()))
            .map(|d| d.spec())
            .collect()
    }

    fn check_input(&self, a_x: &Array2<f32>) -> Result<()> {
        let i_in = self.input_dim().ok_or(MlpError::EmptyInput("network"))?;
        if a_x.nrows() == 0 {
            return Err(MlpError::EmptyInput("batch"));
        }
        if a_x.ncols() != i_in {
            return Err(MlpError::shape_mismatch(
                format!("{} input columns", i_in),
                format!("{} input columns", a_x.ncols()),
            ));
        }
        Ok(())
    }

    fn check_targets(&self, a_x: &Array2<f32>, a_y: &Array2<f32>) -> Result<()> {
        let i_out = self.output_dim().ok_or(MlpError::EmptyInput("network"))?;
        if a_y.nrows() != a_x.nrows() {
            return Err(MlpError::shape_mismatch(
                format!("{} target rows", a_x.nrows()),
                format!("{} target rows", a_y.nrows()),
            ));
        }
        if a_y.ncols() != i_out {
            return Err(MlpError::shape_mismatch(
                format!("{} target columns", i_out),
                format!("{} target columns", a_y.ncols()),
            ));
        }
        Ok(())
    }

    fn forward_all(&mut self, a_x: &Array2<f32>) -> Array2<f32> {
        let mut a_act = a_x.clone();
        for layer in self.network.iter_mut() {
            a_act = layer.forward(&a_act);
        }
        a_act
    }

    pub fn fit(&mut self, a_x: &Array2<f32>, a_y: &Array2<f32>, config: &TrainingConfig) -> Result<TrainingHistory> {
        let dataset = Dataset::new(a_x.clone(), a_y.clone())?;
        self.fit_dataset(&dataset, config)
    }

    pub fn fit_dataset(&mut self, dataset: &Dataset, config: &TrainingConfig) -> Result<TrainingHistory> {
        config.validate()?;
        let compiled = self.compiled.ok_or(MlpError::NotCompiled)?;
        self.check_input(&dataset.inputs)?;
        self.check_targets(&dataset.inputs, &dataset.targets)?;

        info!(
            i_rows = dataset.len(),
            i_epochs = config.i_epochs,
            i_batch_size = config.i_batch_size,
            loss = %compiled.loss,
            "training started"
        );

        let mut rng = StdRng::seed_from_u64(config.u64_seed);
        let mut history = TrainingHistory::default();

        self.set_training(true);
        for i_epoch in 0..config.i_epochs {
            let opt_rng = if config.b_shuffle { Some(&mut rng) } else { None };
            let v_batches = dataset.batch_indices(config.i_batch_size, opt_rng);

            let mut d_total_loss: f32 = 0.0;
            for v_rows in v_batches.iter() {
                let a_xb = dataset.inputs.select(Axis(0), v_rows);
                let a_yb = dataset.targets.select(Axis(0), v_rows);
                d_total_loss += self.train_batch(&a_xb, &a_yb, &compiled, config)?;
            }

            let d_avg_loss = d_total_loss / (v_batches.len() as f32).max(1.0);
            if !d_avg_loss.is_finite() {
                warn!(i_epoch, "loss is not finite");
            }
            info!(i_epoch, d_loss = d_avg_loss, "epoch finished");
            history.v_epoch_losses.push(d_avg_loss);
        }
        self.set_training(false);

        Ok(history)
    }

    fn train_batch(
        &mut self,
        a_xb: &Array2<f32>,
        a_yb: &Array2<f32>,
        compiled: &Compiled,
        config: &TrainingConfig,
    ) -> Result<f32> {
        let a_pred = self.forward_all(a_xb);
        let d_loss = compiled.loss.value(&a_pred, a_yb)?;

        let mut a_grads = compiled.loss.gradient(&a_pred, a_yb)?;
        math::clip_gradients_global_norm(&mut a_grads, config.d_clip_norm);
        math::clip_gradients_value(&mut a_grads, config.d_clip_value);

        for layer in self.network.iter_mut().rev() {
            a_grads = layer.backward(&a_grads, compiled.d_learning_rate);
        }

        debug!(i_rows = a_xb.nrows(), d_loss, "batch trained");
        Ok(d_loss)
    }

    pub fn predict(&mut self, a_x: &Array2<f32>) -> Result<Array2<f32>> {
        self.check_input(a_x)?;
        self.set_training(false);
        Ok(self.forward_all(a_x))
    }

    pub fn evaluate(&mut self, a_x: &Array2<f32>, a_y: &Array2<f32>) -> Result<f32> {
        let loss = self.loss().ok_or(MlpError::NotCompiled)?;
        self.check_targets(a_x, a_y)?;
        let a_pred = self.predict(a_x)?;
        loss.value(&a_pred, a_y)
    }

    // Index of the largest output per row.
    pub fn predict_classes(&mut self, a_x: &Array2<f32>) -> Result<Vec<usize>> {
        let a_pred = self.predict(a_x)?;
        Ok(a_pred
            .rows()
            .into_iter()
            .map(|a_row| {
                a_row
                    .iter()
                    .enumerate()
                    .fold((0usize, f32::NEG_INFINITY), |(i_best, d_best), (i, &d)| {
                        if d > d_best {
                            (i, d)
                        } else {
                            (i_best, d_best)
                        }
                    })
                    .0
            })
            .collect())
    }

    // ----------------------------------------
    // Checkpoints
    // ----------------------------------------

    fn collect_all_parameters_flat(&self) -> Vec<f32> {
        let mut v_params: Vec<f32> = Vec::new();
        for layer in self.network.iter() {
            v_params.extend(layer.get_parameters_flat());
        }
        v_params
    }

    fn assign_all_parameters_flat(&mut self, v_params: &[f32]) -> Result<()> {
        let i_expected: usize = self.network.iter().map(|l| l.parameters()).sum();
        if i_expected != v_params.len() {
            return Err(MlpError::checkpoint("checkpoint_param_count_mismatch"));
        }

        let mut i_pos: usize = 0;
        for layer in self.network.iter_mut() {
            let i_used = layer.set_parameters_flat(&v_params[i_pos..])?;
            i_pos = i_pos.saturating_add(i_used);
        }

        if i_pos != v_params.len() {
            return Err(MlpError::checkpoint("checkpoint_params_length_mismatch"));
        }
        Ok(())
    }

    pub fn to_checkpoint(&self) -> Result<ModelCheckpoint> {
        if self.network.is_empty() {
            return Err(MlpError::EmptyInput("network"));
        }
        let mut cp = ModelCheckpoint::new(self.u64_seed, self.layer_specs(), self.collect_all_parameters_flat());
        if let Some(compiled) = self.compiled {
            cp.opt_loss = Some(compiled.loss);
            cp.opt_optimizer = Some(compiled.optimizer);
            cp.opt_learning_rate = Some(compiled.d_learning_rate);
        }
        Ok(cp)
    }

    pub fn save_checkpoint(&self, p_path: impl AsRef<Path>) -> Result<()> {
        let cp = self.to_checkpoint()?;
        let s_json = utils::to_json(&cp)?;
        utils::write_file_atomic(p_path.as_ref(), &s_json)?;
        info!(path = %p_path.as_ref().display(), i_params = cp.v_params.len(), "checkpoint saved");
        Ok(())
    }

    fn read_checkpoint(p_path: &Path) -> Result<ModelCheckpoint> {
        let s_json = fs::read_to_string(p_path)?;
        let cp: ModelCheckpoint = utils::from_json(&s_json)?;
        cp.validate()?;
        Ok(cp)
    }

    // Loads parameters into the current architecture, which must match the stored one.
    pub fn load_checkpoint(&mut self, p_path: impl AsRef<Path>) -> Result<()> {
        let cp = Self::read_checkpoint(p_path.as_ref())?;
        if cp.v_layers != self.layer_specs() {
            return Err(MlpError::checkpoint("checkpoint_architecture_mismatch"));
        }
        self.assign_all_parameters_flat(&cp.v_params)?;
        info!(path = %p_path.as_ref().display(), "checkpoint loaded");
        Ok(())
    }

    pub fn load_checkpoint_rebuild(p_path: impl AsRef<Path>) -> Result<Sequential> {
        let cp = Self::read_checkpoint(p_path.as_ref())?;
        let model = Self::from_checkpoint(&cp)?;
        info!(
            path = %p_path.as_ref().display(),
            s_layers = %model.network_description(),
            "model rebuilt from checkpoint"
        );
        Ok(model)
    }

    pub fn from_checkpoint(cp: &ModelCheckpoint) -> Result<Sequential> {
        cp.validate()?;

        let mut model = Sequential::with_seed(cp.u64_seed);
        for spec in cp.v_layers.iter() {
            let seed = model.layer_seed(model.network.len());
            let dense = Dense::from_spec(spec, seed)?;
            model.push_layer(Box::new(dense));
        }

        if let (Some(loss), Some(optimizer), Some(d_lr)) = (cp.opt_loss, cp.opt_optimizer, cp.opt_learning_rate) {
            model.compile(loss, optimizer, d_lr)?;
        }

        model.assign_all_parameters_flat(&cp.v_params)?;
        Ok(model)
    }
}
