// activation.rs
// Description: Activation functions for dense layers and their backward passes.
//              Element-wise functions use their closed-form derivatives, softmax uses the
//              row-wise Jacobian-vector product.
// History:
// - 2026-10-02: Add activation enum with forward and backward passes.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::MlpError;
use crate::math;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    #[default]
    Linear,
    Sigmoid,
    Tanh,
    Relu,
    Softmax,
}

impl Activation {
    pub fn name(&self) -> &'static str {
        match self {
            Activation::Linear => "linear",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Relu => "relu",
            Activation::Softmax => "softmax",
        }
    }

    pub fn apply(&self, a_z: &Array2<f32>) -> Array2<f32> {
        match self {
            Activation::Linear => a_z.clone(),
            Activation::Sigmoid => a_z.mapv(sigmoid),
            Activation::Tanh => a_z.mapv(f32::tanh),
            Activation::Relu => a_z.mapv(|x| x.max(0.0)),
            Activation::Softmax => math::softmax_rows(a_z),
        }
    }

    // a_z: pre-activation, a_a: activation output, a_grad: dL/da.
    // Returns dL/dz.
    pub fn backward(&self, a_z: &Array2<f32>, a_a: &Array2<f32>, a_grad: &Array2<f32>) -> Array2<f32> {
        match self {
            Activation::Linear => a_grad.clone(),
            Activation::Sigmoid => a_grad * &a_a.mapv(|y| y * (1.0 - y)),
            Activation::Tanh => a_grad * &a_a.mapv(|y| 1.0 - y * y),
            Activation::Relu => a_grad * &a_z.mapv(|x| if x > 0.0 { 1.0 } else { 0.0 }),
            Activation::Softmax => {
                let a_dot = (a_grad * a_a).sum_axis(Axis(1)).insert_axis(Axis(1));
                a_a * &(a_grad - &a_dot)
            }
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let d_e = x.exp();
        d_e / (1.0 + d_e)
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = MlpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Activation::Linear),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "relu" => Ok(Activation::Relu),
            "softmax" => Ok(Activation::Softmax),
            other => Err(MlpError::invalid_parameter(format!("unknown_activation_{}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn numeric_grad(act: Activation, a_z: &Array2<f32>, a_upstream: &Array2<f32>) -> Array2<f32> {
        let d_h = 1e-3;
        let mut a_out = Array2::zeros(a_z.raw_dim());
        for ((i, j), _) in a_z.indexed_iter() {
            let mut a_plus = a_z.clone();
            let mut a_minus = a_z.clone();
            a_plus[[i, j]] += d_h;
            a_minus[[i, j]] -= d_h;
            let d_plus = (act.apply(&a_plus) * a_upstream).sum();
            let d_minus = (act.apply(&a_minus) * a_upstream).sum();
            a_out[[i, j]] = (d_plus - d_minus) / (2.0 * d_h);
        }
        a_out
    }

    #[test]
    fn test_relu_and_linear_forward() {
        let a_z = array![[-1.0_f32, 0.0, 2.5]];
        assert_eq!(Activation::Relu.apply(&a_z), array![[0.0_f32, 0.0, 2.5]]);
        assert_eq!(Activation::Linear.apply(&a_z), a_z);
    }

    #[test]
    fn test_sigmoid_is_stable_for_large_inputs() {
        let a_z = array![[-500.0_f32, 0.0, 500.0]];
        let a_a = Activation::Sigmoid.apply(&a_z);
        assert!(a_a.iter().all(|d| d.is_finite()));
        assert!((a_a[[0, 1]] - 0.5).abs() < 1e-6);
        assert!(a_a[[0, 0]] < 1e-6);
        assert!((a_a[[0, 2]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_backward_matches_finite_differences() {
        let a_z = array![[0.3_f32, -0.7, 1.1], [-0.2, 0.4, 0.05]];
        let a_up = array![[0.5_f32, -1.0, 0.25], [1.0, 0.3, -0.6]];

        for act in [Activation::Sigmoid, Activation::Tanh, Activation::Softmax, Activation::Linear] {
            let a_a = act.apply(&a_z);
            let a_analytic = act.backward(&a_z, &a_a, &a_up);
            let a_numeric = numeric_grad(act, &a_z, &a_up);
            for (d_x, d_y) in a_analytic.iter().zip(a_numeric.iter()) {
                assert!((d_x - d_y).abs() < 1e-2, "{} gradient {} vs {}", act, d_x, d_y);
            }
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("ReLU".parse::<Activation>().unwrap(), Activation::Relu);
        assert_eq!(" softmax ".parse::<Activation>().unwrap(), Activation::Softmax);
        assert!("swish".parse::<Activation>().is_err());
    }
}
