// lib.rs
// Description: Dense multilayer perceptron with a sequential model API, plus geometry,
//              statistics and clustering helpers for handwriting stroke points.
// History:
// - 2026-10-02: Split library from the binary so tests can use the model directly.

pub mod activation;
pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod layer;
pub mod math;
pub mod model;
pub mod optimizer;
pub mod stats;
pub mod utils;

pub use activation::Activation;
pub use config::TrainingConfig;
pub use dataset::Dataset;
pub use error::{MlpError, Result};
pub use layer::{BatchNormConfig, Dense, Layer};
pub use math::Loss;
pub use model::{Component, DenseSpec, Sequential, TrainingHistory};
pub use optimizer::OptimizerConfig;

pub const DEFAULT_EPOCHS: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_LEARNING_RATE: f32 = 0.01;
pub const DEFAULT_SEED: u64 = 1337;
