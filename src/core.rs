// src/core.rs
pub mod activations;
pub mod layers;
pub mod losses;
pub mod metrics;
pub mod normalization;
pub mod optimizers;

// Re-export commonly used items
pub use activations::Activation;
pub use layers::{Dense, LayerTrait};
pub use losses::Loss;
pub use metrics::Metric;
pub use normalization::Normalization;
pub use optimizers::{apply_optimization, Optimization, Optimizer, OptimizerState};
