use crate::prelude::*;
use std::fmt;
use std::str::FromStr;

/// Same clipping constant Keras uses for cross-entropy.
pub const EPSILON: f32 = 1e-7;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    SparseCategoricalCrossentropy,
    MSE,
    None,
}

impl Loss {
    pub fn name(&self) -> &'static str {
        match self {
            Loss::SparseCategoricalCrossentropy => "sparse_categorical_crossentropy",
            Loss::MSE => "mean_squared_error",
            Loss::None => "none",
        }
    }
}

impl fmt::Display for Loss {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Loss {
    type Err = NNError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sparse_categorical_crossentropy" => Ok(Loss::SparseCategoricalCrossentropy),
            "mse" | "mean_squared_error" => Ok(Loss::MSE),
            _ => Err(NNError::InvalidLoss(s.to_string())),
        }
    }
}

/// Computes the batch-mean loss of `y_hat` against integer labels and the
/// gradient of that mean w.r.t. `y_hat`.
pub fn criteria(y_hat: &Array2<f32>, y: &Array1<u8>, loss_ty: Loss) -> Result<(f32, Array2<f32>)> {
    check_labels(y_hat, y)?;
    let classes = y_hat.ncols();
    let n = y_hat.nrows().max(1) as f32;

    match loss_ty {
        Loss::SparseCategoricalCrossentropy => {
            let mut loss = 0.0;
            let mut da = Array2::<f32>::zeros(y_hat.raw_dim());
            for (i, &label) in y.iter().enumerate() {
                let p = y_hat[[i, label as usize]].clamp(EPSILON, 1.0 - EPSILON);
                loss -= p.ln();
                da[[i, label as usize]] = -1.0 / (p * n);
            }
            Ok((loss / n, da))
        }
        Loss::MSE => {
            let diff = y_hat - &one_hot(y, classes);
            let loss = diff.mapv(|d| d * d).sum() / (n * classes as f32);
            let da = diff * (2.0 / (n * classes as f32));
            Ok((loss, da))
        }
        Loss::None => Err(NNError::LossNotSet),
    }
}

/// Sparse categorical cross-entropy of a softmax output, taken from the
/// logits `z` so that neither the loss nor the gradient saturates.
/// Returns the batch-mean loss and its gradient w.r.t. `z`,
/// `(softmax(z) - onehot) / n`.
pub fn softmax_crossentropy(z: &Array2<f32>, y: &Array1<u8>) -> Result<(f32, Array2<f32>)> {
    check_labels(z, y)?;
    let n = z.nrows().max(1) as f32;
    let mut loss = 0.0;
    let mut dz = Activation::Softmax.forward(z)?;
    for ((i, &label), row) in y.iter().enumerate().zip(z.rows()) {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let log_sum_exp = max + row.fold(0.0, |acc, &v| acc + (v - max).exp()).ln();
        loss += log_sum_exp - z[[i, label as usize]];
        dz[[i, label as usize]] -= 1.0;
    }
    dz /= n;
    Ok((loss / n, dz))
}

fn check_labels(y_hat: &Array2<f32>, y: &Array1<u8>) -> Result<()> {
    if y_hat.nrows() != y.len() {
        return Err(NNError::LayerShapeMismatch(format!(
            "{} predictions for {} labels",
            y_hat.nrows(),
            y.len()
        )));
    }
    let classes = y_hat.ncols();
    if let Some(&bad) = y.iter().find(|&&label| label as usize >= classes) {
        return Err(NNError::InvalidLabel(format!(
            "label {} does not fit {} output units",
            bad, classes
        )));
    }
    Ok(())
}

pub fn one_hot(y: &Array1<u8>, classes: usize) -> Array2<f32> {
    let mut out = Array2::zeros((y.len(), classes));
    for (i, &label) in y.iter().enumerate() {
        out[[i, label as usize]] = 1.0;
    }
    out
}
