pub use serde::{Deserialize, Serialize};

pub use ndarray::*;
pub use ndarray_rand::rand_distr::Uniform;
pub use ndarray_rand::RandomExt;

pub use crate::error::*;
pub use crate::models::{Evaluation, FitOptions, Sequential};

// Internal re-exports
pub use crate::core::{
    apply_optimization,
    Activation,
    Dense,
    LayerTrait,
    Loss,
    Metric,
    Normalization,
    Optimizer,
    OptimizerState,
};
