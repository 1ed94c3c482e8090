use crate::prelude::*;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Optimizer {
    SGD(f32),
    Adam {
        lr: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
    None,
}

impl Optimizer {
    /// Adam with the Keras default hyperparameters.
    pub fn adam() -> Self {
        Optimizer::Adam {
            lr: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }

    pub fn sgd() -> Self {
        Optimizer::SGD(0.01)
    }
}

impl FromStr for Optimizer {
    type Err = NNError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "adam" => Ok(Optimizer::adam()),
            "sgd" => Ok(Optimizer::sgd()),
            _ => Err(NNError::InvalidOptimizer(s.to_string())),
        }
    }
}

/// Per-layer optimizer memory. Adam keeps first and second moments for the
/// kernel and the bias; SGD keeps only the step count.
#[derive(Debug, Clone, Default)]
pub struct OptimizerState {
    pub step: u64,
    m_w: Option<Array2<f32>>,
    v_w: Option<Array2<f32>>,
    m_b: Option<Array1<f32>>,
    v_b: Option<Array1<f32>>,
}

pub trait Optimization {
    fn optimize(
        &mut self,
        dw: Array2<f32>,
        db: Array1<f32>,
        optimizer: &Optimizer,
        state: &mut OptimizerState,
    );
}

pub fn apply_optimization(
    weights: &mut Array2<f32>,
    bias: &mut Array1<f32>,
    dw: Array2<f32>,
    db: Array1<f32>,
    optimizer: &Optimizer,
    state: &mut OptimizerState,
) {
    state.step += 1;

    match optimizer {
        Optimizer::SGD(lr) => {
            weights.scaled_add(-*lr, &dw);
            bias.scaled_add(-*lr, &db);
        }
        Optimizer::Adam {
            lr,
            beta1,
            beta2,
            epsilon,
        } => {
            let t = state.step as i32;
            let lr_t = lr * (1.0 - beta2.powi(t)).sqrt() / (1.0 - beta1.powi(t));

            let m_w = state.m_w.get_or_insert_with(|| Array2::zeros(dw.raw_dim()));
            let v_w = state.v_w.get_or_insert_with(|| Array2::zeros(dw.raw_dim()));
            adam_step(weights, m_w, v_w, &dw, *beta1, *beta2, lr_t, *epsilon);

            let m_b = state.m_b.get_or_insert_with(|| Array1::zeros(db.raw_dim()));
            let v_b = state.v_b.get_or_insert_with(|| Array1::zeros(db.raw_dim()));
            adam_step(bias, m_b, v_b, &db, *beta1, *beta2, lr_t, *epsilon);
        }
        Optimizer::None => (),
    }
}

#[allow(clippy::too_many_arguments)]
fn adam_step<D: Dimension>(
    param: &mut Array<f32, D>,
    m: &mut Array<f32, D>,
    v: &mut Array<f32, D>,
    grad: &Array<f32, D>,
    beta1: f32,
    beta2: f32,
    lr_t: f32,
    epsilon: f32,
) {
    Zip::from(param)
        .and(m)
        .and(v)
        .and(grad)
        .for_each(|p, m, v, &g| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            *p -= lr_t * *m / (v.sqrt() + epsilon);
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sgd_moves_against_gradient() {
        let mut w = array![[1.0f32, 2.0]];
        let mut b = array![0.5f32];
        let mut state = OptimizerState::default();
        apply_optimization(&mut w, &mut b, array![[1.0, -1.0]], array![2.0], &Optimizer::SGD(0.1), &mut state);
        assert!((w[[0, 0]] - 0.9).abs() < 1e-6);
        assert!((w[[0, 1]] - 2.1).abs() < 1e-6);
        assert!((b[0] - 0.3).abs() < 1e-6);
        assert_eq!(state.step, 1);
    }

    #[test]
    fn first_adam_step_is_about_lr_times_sign() {
        // Bias correction makes the first update lr * sign(g).
        let mut w = array![[0.0f32, 0.0]];
        let mut b = array![0.0f32];
        let mut state = OptimizerState::default();
        apply_optimization(
            &mut w,
            &mut b,
            array![[0.5, -3.0]],
            array![0.25],
            &Optimizer::adam(),
            &mut state,
        );
        assert!((w[[0, 0]] + 0.001).abs() < 1e-5);
        assert!((w[[0, 1]] - 0.001).abs() < 1e-5);
        assert!((b[0] + 0.001).abs() < 1e-5);
    }

    #[test]
    fn adam_minimizes_a_quadratic() {
        let mut w = array![[3.0f32]];
        let mut b = array![-2.0f32];
        let mut state = OptimizerState::default();
        let opt = Optimizer::Adam { lr: 0.05, beta1: 0.9, beta2: 0.999, epsilon: 1e-7 };
        for _ in 0..2000 {
            let dw = w.mapv(|x| 2.0 * x);
            let db = b.mapv(|x| 2.0 * x);
            apply_optimization(&mut w, &mut b, dw, db, &opt, &mut state);
        }
        assert!(w[[0, 0]].abs() < 5e-2);
        assert!(b[0].abs() < 5e-2);
    }

    #[test]
    fn optimizer_names() {
        assert_eq!("adam".parse::<Optimizer>().unwrap(), Optimizer::adam());
        assert!(matches!("adagrad".parse::<Optimizer>(), Err(NNError::InvalidOptimizer(_))));
        assert_eq!("SGD".parse::<Optimizer>().unwrap(), Optimizer::SGD(0.01));
    }
}
