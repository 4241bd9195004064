// config.rs
// Description: Training configuration stored as JSON for reproducible runs.
// History:
// - 2026-10-03: Add training config with defaults, JSON loading and validation.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MlpError, Result};
use crate::math::Loss;
use crate::optimizer::OptimizerConfig;
use crate::{DEFAULT_BATCH_SIZE, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE, DEFAULT_SEED};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub i_epochs: usize,
    pub i_batch_size: usize,
    pub d_learning_rate: f32,
    pub loss: Loss,
    pub optimizer: OptimizerConfig,
    pub b_shuffle: bool,
    pub u64_seed: u64,
    // 0.0 disables clipping.
    pub d_clip_norm: f32,
    pub d_clip_value: f32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            i_epochs: DEFAULT_EPOCHS,
            i_batch_size: DEFAULT_BATCH_SIZE,
            d_learning_rate: DEFAULT_LEARNING_RATE,
            loss: Loss::MeanSquaredError,
            optimizer: OptimizerConfig::default(),
            b_shuffle: true,
            u64_seed: DEFAULT_SEED,
            d_clip_norm: 5.0,
            d_clip_value: 0.0,
        }
    }
}

impl TrainingConfig {
    pub fn from_json_str(s_json: &str) -> Result<Self> {
        if s_json.trim().is_empty() {
            return Err(MlpError::invalid_parameter("config_json_empty"));
        }
        let config: TrainingConfig = serde_json::from_str(s_json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(p_path: impl AsRef<Path>) -> Result<Self> {
        let s_json = fs::read_to_string(p_path)?;
        Self::from_json_str(&s_json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.i_epochs == 0 {
            return Err(MlpError::invalid_parameter("epochs_must_be_positive"));
        }
        if self.i_batch_size == 0 {
            return Err(MlpError::invalid_parameter("batch_size_must_be_positive"));
        }
        if !self.d_learning_rate.is_finite() || self.d_learning_rate <= 0.0 {
            return Err(MlpError::invalid_parameter("learning_rate_invalid"));
        }
        if !self.d_clip_norm.is_finite() || self.d_clip_norm < 0.0 {
            return Err(MlpError::invalid_parameter("clip_norm_invalid"));
        }
        if !self.d_clip_value.is_finite() || self.d_clip_value < 0.0 {
            return Err(MlpError::invalid_parameter("clip_value_invalid"));
        }
        match self.optimizer {
            OptimizerConfig::Sgd { momentum } if !(0.0..1.0).contains(&momentum) => {
                Err(MlpError::invalid_parameter("momentum_out_of_range"))
            }
            OptimizerConfig::AdamW { weight_decay } if !weight_decay.is_finite() || weight_decay < 0.0 => {
                Err(MlpError::invalid_parameter("weight_decay_invalid"))
            }
            _ => Ok(()),
        }
    }
}
