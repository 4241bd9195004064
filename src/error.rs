// error.rs
// Description: Error type shared by the model, dataset, geometry and statistics code.
//              Messages are short ASCII codes so they can be logged and matched on.
// History:
// - 2026-10-02: Replace string errors with a typed error enum.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MlpError>;

#[derive(Debug, Error)]
pub enum MlpError {
    #[error("shape_mismatch: expected {expected}, actual {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("empty_input: {0}")]
    EmptyInput(&'static str),

    #[error("invalid_parameter: {0}")]
    InvalidParameter(String),

    #[error("missing_input_dim")]
    MissingInputDim,

    #[error("no_layer_to_attach")]
    NoLayerToAttach,

    #[error("model_not_compiled")]
    NotCompiled,

    #[error("degenerate_line")]
    DegenerateLine,

    #[error("checkpoint_error: {0}")]
    Checkpoint(String),

    #[error("io_error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json_error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MlpError {
    pub fn shape_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn invalid_parameter(s_message: impl Into<String>) -> Self {
        Self::InvalidParameter(s_message.into())
    }

    pub fn checkpoint(s_code: impl Into<String>) -> Self {
        Self::Checkpoint(s_code.into())
    }
}
