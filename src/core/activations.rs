use crate::prelude::*;
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    pub fn forward(&self, z: &Array2<f32>) -> Result<Array2<f32>> {
        Ok(match self {
            Self::Linear => z.clone(),
            Self::Relu => relu_forward(z),
            Self::Sigmoid => sigmoid_forward(z),
            Self::Tanh => tanh_forward(z),
            Self::Softmax => softmax_forward(z),
        })
    }

    /// Maps the gradient w.r.t. the activation output `da` back onto the
    /// pre-activation `z`.
    pub fn backward(&self, z: &Array2<f32>, da: Array2<f32>) -> Result<Array2<f32>> {
        if z.shape() != da.shape() {
            return Err(NNError::LayerShapeMismatch(format!(
                "activation input {:?} and gradient {:?} differ",
                z.shape(),
                da.shape()
            )));
        }
        Ok(match self {
            Self::Linear => da,
            Self::Relu => da * relu_backward(z),
            Self::Sigmoid => da * sigmoid_backward(z),
            Self::Tanh => da * tanh_backward(z),
            Self::Softmax => softmax_backward(z, da),
        })
    }

    /// Keras identifier, also used in the exported topology.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Relu => "relu",
            Self::Sigmoid => "sigmoid",
            Self::Tanh => "tanh",
            Self::Softmax => "softmax",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = NNError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "relu" => Ok(Self::Relu),
            "sigmoid" => Ok(Self::Sigmoid),
            "tanh" => Ok(Self::Tanh),
            "softmax" => Ok(Self::Softmax),
            _ => Err(NNError::InvalidActivation(s.to_string())),
        }
    }
}

fn sigmoid_forward(z: &Array2<f32>) -> Array2<f32> {
    z.mapv(|z| 1.0 / (1.0 + (-z).exp()))
}

fn sigmoid_backward(z: &Array2<f32>) -> Array2<f32> {
    z.mapv(|z| {
        let s = 1.0 / (1.0 + (-z).exp());
        s * (1.0 - s)
    })
}

fn relu_forward(z: &Array2<f32>) -> Array2<f32> {
    z.mapv(|z| if z > 0.0 { z } else { 0.0 })
}

fn relu_backward(z: &Array2<f32>) -> Array2<f32> {
    z.mapv(|z| if z > 0.0 { 1.0 } else { 0.0 })
}

fn tanh_forward(z: &Array2<f32>) -> Array2<f32> {
    z.mapv(|z| z.tanh())
}

fn tanh_backward(z: &Array2<f32>) -> Array2<f32> {
    z.mapv(|z| {
        let t = z.tanh();
        1.0 - t * t
    })
}

// Row-wise; the row max is subtracted before exponentiating.
fn softmax_forward(z: &Array2<f32>) -> Array2<f32> {
    let mut out = z.clone();
    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    out
}

// Jacobian-vector product per row: s * (da - <da, s>).
fn softmax_backward(z: &Array2<f32>, da: Array2<f32>) -> Array2<f32> {
    let s = softmax_forward(z);
    let dot = (&da * &s).sum_axis(Axis(1)).insert_axis(Axis(1));
    &s * &(da - &dot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_rows_sum_to_one() {
        let z = array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 1000.0], [-5.0, 0.0, 5.0]];
        let s = Activation::Softmax.forward(&z).unwrap();
        for row in s.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-6);
            assert!(row.iter().all(|&p| p >= 0.0 && p.is_finite()));
        }
        assert!((s[[1, 0]] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn relu_clamps_negatives_and_masks_gradient() {
        let z = array![[-1.0, 0.0, 2.5]];
        assert_eq!(Activation::Relu.forward(&z).unwrap(), array![[0.0f32, 0.0, 2.5]]);
        let dz = Activation::Relu.backward(&z, array![[3.0, 3.0, 3.0]]).unwrap();
        assert_eq!(dz, array![[0.0f32, 0.0, 3.0]]);
    }

    #[test]
    fn softmax_backward_matches_finite_difference() {
        let z = array![[0.3, -1.2, 0.8, 0.1]];
        let da = array![[0.5, -0.25, 1.0, 0.0]];
        let dz = Activation::Softmax.backward(&z, da.clone()).unwrap();

        let h = 1e-3;
        for j in 0..4 {
            let mut plus = z.clone();
            let mut minus = z.clone();
            plus[[0, j]] += h;
            minus[[0, j]] -= h;
            let fp = (Activation::Softmax.forward(&plus).unwrap() * &da).sum();
            let fm = (Activation::Softmax.forward(&minus).unwrap() * &da).sum();
            let numeric = (fp - fm) / (2.0 * h);
            assert!((numeric - dz[[0, j]]).abs() < 1e-3, "column {j}: {numeric} vs {}", dz[[0, j]]);
        }
    }

    #[test]
    fn parses_keras_names() {
        assert_eq!("relu".parse::<Activation>().unwrap(), Activation::Relu);
        assert_eq!("Softmax".parse::<Activation>().unwrap(), Activation::Softmax);
        assert!(matches!("gelu".parse::<Activation>(), Err(NNError::InvalidActivation(_))));
    }

    #[test]
    fn backward_rejects_mismatched_gradient() {
        let z = Array2::<f32>::zeros((2, 3));
        let da = Array2::<f32>::zeros((3, 2));
        assert!(Activation::Tanh.backward(&z, da).is_err());
    }
}
