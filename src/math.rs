// math.rs
// Description: Numerical helpers for softmax, loss values and loss gradients, and gradient
//              clipping (global norm and element-wise) with stable handling of non-finite values.
// History:
// - 2026-10-02: Add loss enum (mean squared error, categorical cross entropy).
// - 2026-10-03: Keep gradient clipping helpers, sanitize non-finite gradients.

use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{MlpError, Result};

const PROB_FLOOR: f32 = 1e-7;

pub fn softmax_rows(a_logits: &Array2<f32>) -> Array2<f32> {
    let mut a_result = a_logits.clone();

    for mut a_row in a_result.rows_mut() {
        let d_max = a_row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let v_exp: Vec<f32> = a_row.iter().map(|&x| (x - d_max).exp()).collect();
        let d_sum: f32 = v_exp.iter().sum();

        if !d_sum.is_finite() || d_sum <= 0.0 {
            let d_uniform = 1.0 / (a_row.len() as f32).max(1.0);
            a_row.fill(d_uniform);
            continue;
        }

        for (d_out, &d_e) in a_row.iter_mut().zip(v_exp.iter()) {
            *d_out = d_e / d_sum;
        }
    }

    a_result
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Loss {
    #[default]
    MeanSquaredError,
    CategoricalCrossEntropy,
}

impl Loss {
    pub fn value(&self, a_pred: &Array2<f32>, a_target: &Array2<f32>) -> Result<f32> {
        check_same_shape(a_pred, a_target)?;
        if a_pred.is_empty() {
            return Ok(0.0);
        }

        let d_loss = match self {
            Loss::MeanSquaredError => {
                let d_sum: f32 = a_pred
                    .iter()
                    .zip(a_target.iter())
                    .map(|(&p, &t)| (p - t) * (p - t))
                    .sum();
                d_sum / a_pred.len() as f32
            }
            Loss::CategoricalCrossEntropy => {
                let d_sum: f32 = a_pred
                    .iter()
                    .zip(a_target.iter())
                    .map(|(&p, &t)| -t * p.clamp(PROB_FLOOR, 1.0).ln())
                    .sum();
                d_sum / a_pred.nrows() as f32
            }
        };

        Ok(d_loss)
    }

    // dL/dpred, already divided by the batch normalisation the value uses.
    pub fn gradient(&self, a_pred: &Array2<f32>, a_target: &Array2<f32>) -> Result<Array2<f32>> {
        check_same_shape(a_pred, a_target)?;
        if a_pred.is_empty() {
            return Ok(Array2::zeros(a_pred.raw_dim()));
        }

        let a_grads = match self {
            Loss::MeanSquaredError => {
                let d_scale = 2.0 / a_pred.len() as f32;
                (a_pred - a_target).mapv(|x| x * d_scale)
            }
            Loss::CategoricalCrossEntropy => {
                let d_batch = a_pred.nrows() as f32;
                let mut a_out = a_target.clone();
                a_out.zip_mut_with(a_pred, |t, &p| {
                    *t = -*t / (p.clamp(PROB_FLOOR, 1.0) * d_batch);
                });
                a_out
            }
        };

        Ok(a_grads)
    }
}

impl fmt::Display for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loss::MeanSquaredError => f.write_str("mean_squared_error"),
            Loss::CategoricalCrossEntropy => f.write_str("categorical_cross_entropy"),
        }
    }
}

fn check_same_shape(a_pred: &Array2<f32>, a_target: &Array2<f32>) -> Result<()> {
    if a_pred.dim() != a_target.dim() {
        return Err(MlpError::shape_mismatch(
            format!("{:?}", a_target.dim()),
            format!("{:?}", a_pred.dim()),
        ));
    }
    Ok(())
}

// Replace non-finite values with 0.0 so NaN/Inf never reach the weights.
pub fn sanitize_gradients_inplace(a_grads: &mut Array2<f32>) {
    for d in a_grads.iter_mut() {
        if !d.is_finite() {
            *d = 0.0;
        }
    }
}

// Global norm clipping.
// - Rescales all gradients when their L2 norm exceeds d_max_norm.
// - If the norm is non-finite after sanitization, gradients are set to zero.
pub fn clip_gradients_global_norm(a_grads: &mut Array2<f32>, d_max_norm: f32) {
    if d_max_norm <= 0.0 || !d_max_norm.is_finite() {
        return;
    }

    sanitize_gradients_inplace(a_grads);

    let d_norm_sq: f32 = a_grads.iter().map(|&d| d * d).sum();
    if !d_norm_sq.is_finite() {
        a_grads.fill(0.0);
        return;
    }

    let d_norm = d_norm_sq.sqrt();
    if d_norm <= 0.0 {
        return;
    }

    if d_norm > d_max_norm {
        let d_scale = d_max_norm / d_norm;
        if d_scale.is_finite() && d_scale > 0.0 {
            a_grads.mapv_inplace(|x| x * d_scale);
        } else {
            a_grads.fill(0.0);
        }
    }
}

// Clamp each gradient to [-d_clip_value, +d_clip_value].
pub fn clip_gradients_value(a_grads: &mut Array2<f32>, d_clip_value: f32) {
    if d_clip_value <= 0.0 || !d_clip_value.is_finite() {
        return;
    }

    for d in a_grads.iter_mut() {
        *d = if d.is_finite() {
            d.clamp(-d_clip_value, d_clip_value)
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let a = array![[1.0_f32, 2.0, 3.0], [1000.0, 1000.0, 1000.0]];
        let a_p = softmax_rows(&a);
        for a_row in a_p.rows() {
            assert!((a_row.sum() - 1.0).abs() < 1e-6);
        }
        assert!((a_p[[1, 0]] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_uniform_fallback_on_nan_row() {
        let a = array![[f32::NAN, 1.0]];
        let a_p = softmax_rows(&a);
        assert_eq!(a_p, array![[0.5_f32, 0.5]]);
    }

    #[test]
    fn test_mse_value_and_gradient() {
        let a_pred = array![[1.0_f32, 2.0], [3.0, 4.0]];
        let a_target = array![[1.0_f32, 0.0], [3.0, 6.0]];
        let d_loss = Loss::MeanSquaredError.value(&a_pred, &a_target).unwrap();
        assert!((d_loss - 2.0).abs() < 1e-6);

        let a_g = Loss::MeanSquaredError.gradient(&a_pred, &a_target).unwrap();
        assert_eq!(a_g, array![[0.0_f32, 1.0], [0.0, -1.0]]);
    }

    #[test]
    fn test_cross_entropy_value() {
        let a_pred = array![[0.5_f32, 0.5], [0.9, 0.1]];
        let a_target = array![[1.0_f32, 0.0], [1.0, 0.0]];
        let d_loss = Loss::CategoricalCrossEntropy.value(&a_pred, &a_target).unwrap();
        let d_expected = -(0.5_f32.ln() + 0.9_f32.ln()) / 2.0;
        assert!((d_loss - d_expected).abs() < 1e-6);
    }

    #[test]
    fn test_cross_entropy_with_softmax_yields_p_minus_t() {
        use crate::activation::Activation;

        let a_z = array![[0.2_f32, -0.4, 1.3]];
        let a_t = array![[0.0_f32, 0.0, 1.0]];
        let a_p = softmax_rows(&a_z);
        let a_g = Loss::CategoricalCrossEntropy.gradient(&a_p, &a_t).unwrap();
        let a_dz = Activation::Softmax.backward(&a_z, &a_p, &a_g);
        let a_expected = &a_p - &a_t;
        for (d_x, d_y) in a_dz.iter().zip(a_expected.iter()) {
            assert!((d_x - d_y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_loss_rejects_shape_mismatch() {
        let a_pred = Array2::<f32>::zeros((2, 3));
        let a_target = Array2::<f32>::zeros((2, 2));
        assert!(matches!(
            Loss::MeanSquaredError.value(&a_pred, &a_target),
            Err(MlpError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_clip_global_norm() {
        let mut a_g = array![[3.0_f32, 4.0]];
        clip_gradients_global_norm(&mut a_g, 1.0);
        assert!((a_g[[0, 0]] - 0.6).abs() < 1e-6);
        assert!((a_g[[0, 1]] - 0.8).abs() < 1e-6);

        let mut a_small = array![[0.1_f32, f32::NAN]];
        clip_gradients_global_norm(&mut a_small, 1.0);
        assert_eq!(a_small, array![[0.1_f32, 0.0]]);
    }

    #[test]
    fn test_clip_value() {
        let mut a_g = array![[-3.0_f32, 0.5, f32::INFINITY]];
        clip_gradients_value(&mut a_g, 1.0);
        assert_eq!(a_g, array![[-1.0_f32, 0.5, 0.0]]);
    }
}
