// dataset.rs
// Description: In-memory training data (input rows and target rows) with JSON loading,
//              one-hot encoding, train/test split and seeded mini-batch iteration.
// History:
// - 2026-10-03: Add dataset loading from JSON files.
// - 2026-10-04: Add seeded shuffled batches for training.

use std::fs;
use std::path::Path;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Deserialize;

use crate::error::{MlpError, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub inputs: Array2<f32>,
    pub targets: Array2<f32>,
}

#[derive(Deserialize)]
struct DatasetJson {
    inputs: Vec<Vec<f32>>,
    targets: Vec<Vec<f32>>,
}

impl Dataset {
    pub fn new(inputs: Array2<f32>, targets: Array2<f32>) -> Result<Self> {
        if inputs.nrows() == 0 || inputs.ncols() == 0 {
            return Err(MlpError::EmptyInput("dataset_inputs"));
        }
        if targets.ncols() == 0 {
            return Err(MlpError::EmptyInput("dataset_targets"));
        }
        if inputs.nrows() != targets.nrows() {
            return Err(MlpError::shape_mismatch(
                format!("{} target rows", inputs.nrows()),
                format!("{} target rows", targets.nrows()),
            ));
        }
        Ok(Self { inputs, targets })
    }

    pub fn from_json_str(s_json: &str) -> Result<Self> {
        let raw: DatasetJson = serde_json::from_str(s_json)?;
        Self::new(rows_to_array(&raw.inputs)?, rows_to_array(&raw.targets)?)
    }

    pub fn from_json_file(p_path: impl AsRef<Path>) -> Result<Self> {
        let s_json = fs::read_to_string(p_path)?;
        Self::from_json_str(&s_json)
    }

    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.nrows() == 0
    }

    pub fn input_dim(&self) -> usize {
        self.inputs.ncols()
    }

    pub fn target_dim(&self) -> usize {
        self.targets.ncols()
    }

    // First round(len * ratio) rows train, the rest test. Both parts must be non-empty.
    pub fn split(&self, d_ratio: f32) -> Result<(Dataset, Dataset)> {
        if !d_ratio.is_finite() || d_ratio <= 0.0 || d_ratio >= 1.0 {
            return Err(MlpError::invalid_parameter("split_ratio_out_of_range"));
        }
        let i_train = (self.len() as f32 * d_ratio).round() as usize;
        if i_train == 0 || i_train >= self.len() {
            return Err(MlpError::invalid_parameter("split_leaves_empty_part"));
        }

        let v_train: Vec<usize> = (0..i_train).collect();
        let v_test: Vec<usize> = (i_train..self.len()).collect();
        Ok((self.select(&v_train), self.select(&v_test)))
    }

    pub fn select(&self, v_rows: &[usize]) -> Dataset {
        Dataset {
            inputs: self.inputs.select(Axis(0), v_rows),
            targets: self.targets.select(Axis(0), v_rows),
        }
    }

    // Row index batches of at most i_batch_size; the last batch may be shorter.
    pub fn batch_indices(&self, i_batch_size: usize, opt_rng: Option<&mut StdRng>) -> Vec<Vec<usize>> {
        let mut v_order: Vec<usize> = (0..self.len()).collect();
        if let Some(rng) = opt_rng {
            v_order.shuffle(rng);
        }
        v_order
            .chunks(i_batch_size.max(1))
            .map(|c| c.to_vec())
            .collect()
    }
}

pub fn rows_to_array(v_rows: &[Vec<f32>]) -> Result<Array2<f32>> {
    let i_cols = v_rows.first().map_or(0, |r| r.len());
    let mut v_flat: Vec<f32> = Vec::with_capacity(v_rows.len() * i_cols);
    for (i_row, v_row) in v_rows.iter().enumerate() {
        if v_row.len() != i_cols {
            return Err(MlpError::shape_mismatch(
                format!("{} columns", i_cols),
                format!("{} columns in row {}", v_row.len(), i_row),
            ));
        }
        v_flat.extend_from_slice(v_row);
    }
    Array2::from_shape_vec((v_rows.len(), i_cols), v_flat)
        .map_err(|e| MlpError::invalid_parameter(format!("array_shape_error_{}", e)))
}

pub fn one_hot(v_labels: &[usize], i_classes: usize) -> Result<Array2<f32>> {
    if i_classes == 0 {
        return Err(MlpError::invalid_parameter("one_hot_zero_classes"));
    }
    let mut a_out = Array2::zeros((v_labels.len(), i_classes));
    for (i_row, &i_label) in v_labels.iter().enumerate() {
        if i_label >= i_classes {
            return Err(MlpError::invalid_parameter(format!("one_hot_label_{}_out_of_range", i_label)));
        }
        a_out[[i_row, i_label]] = 1.0;
    }
    Ok(a_out)
}
