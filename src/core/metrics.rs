use crate::prelude::*;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Accuracy,
}

impl Metric {
    pub fn compute(&self, y_hat: &Array2<f32>, y: &Array1<u8>) -> f32 {
        match self {
            Metric::Accuracy => accuracy(y_hat, y),
        }
    }
}

impl FromStr for Metric {
    type Err = NNError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "accuracy" | "acc" => Ok(Metric::Accuracy),
            _ => Err(NNError::InvalidMetric(s.to_string())),
        }
    }
}

/// Index of the largest entry in each row. Ties resolve to the lowest index.
pub fn argmax_rows(y_hat: &Array2<f32>) -> Array1<usize> {
    y_hat
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
                .0
        })
        .collect()
}

pub fn correct_predictions(y_hat: &Array2<f32>, y: &Array1<u8>) -> usize {
    argmax_rows(y_hat)
        .iter()
        .zip(y.iter())
        .filter(|(&p, &l)| p == l as usize)
        .count()
}

pub fn accuracy(y_hat: &Array2<f32>, y: &Array1<u8>) -> f32 {
    if y.is_empty() {
        return 0.0;
    }
    correct_predictions(y_hat, y) as f32 / y.len() as f32
}
