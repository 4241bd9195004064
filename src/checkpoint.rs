// checkpoint.rs
// Description: Serializable model checkpoint (architecture specs, loss, optimizer and flat
//              parameters) with header validation.
// History:
// - 2026-10-03: Replace the LLM checkpoint with an MLP checkpoint that can rebuild the network.

use serde::{Deserialize, Serialize};

use crate::error::{MlpError, Result};
use crate::layer::LayerSpec;
use crate::math::Loss;
use crate::optimizer::OptimizerConfig;

pub const CHECKPOINT_MAGIC: &str = "STROKE_MLP_CHECKPOINT";
pub const CHECKPOINT_VERSION: &str = "1";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub s_magic: String,
    pub s_version: String,
    pub u64_seed: u64,
    pub v_layers: Vec<LayerSpec>,
    pub opt_loss: Option<Loss>,
    pub opt_optimizer: Option<OptimizerConfig>,
    pub opt_learning_rate: Option<f32>,
    pub v_params: Vec<f32>,
}

impl ModelCheckpoint {
    pub fn new(u64_seed: u64, v_layers: Vec<LayerSpec>, v_params: Vec<f32>) -> Self {
        Self {
            s_magic: CHECKPOINT_MAGIC.to_string(),
            s_version: CHECKPOINT_VERSION.to_string(),
            u64_seed,
            v_layers,
            opt_loss: None,
            opt_optimizer: None,
            opt_learning_rate: None,
            v_params,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.s_magic != CHECKPOINT_MAGIC {
            return Err(MlpError::checkpoint("checkpoint_magic_mismatch"));
        }
        if self.s_version != CHECKPOINT_VERSION {
            return Err(MlpError::checkpoint("checkpoint_version_unsupported"));
        }
        if self.v_layers.is_empty() {
            return Err(MlpError::checkpoint("checkpoint_no_layers"));
        }
        for (i_idx, w) in self.v_layers.windows(2).enumerate() {
            if w[0].i_units != w[1].i_input_dim {
                return Err(MlpError::checkpoint(format!("checkpoint_layer_{}_dims_inconsistent", i_idx + 1)));
            }
        }
        if self.v_params.is_empty() {
            return Err(MlpError::checkpoint("checkpoint_empty_params"));
        }

        let opt_expected = self
            .v_layers
            .iter()
            .try_fold(0usize, |i_acc, spec| i_acc.checked_add(spec.parameter_count()?));
        if opt_expected != Some(self.v_params.len()) {
            return Err(MlpError::checkpoint("checkpoint_param_count_mismatch"));
        }
        Ok(())
    }
}
