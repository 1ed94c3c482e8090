pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod export;
pub mod history;
pub mod models;
pub mod pipeline;
pub mod prelude;
pub mod utils;

// Re-export types
pub use config::{LayerSpec, TrainingConfig};
pub use crate::core::{Activation, Dense, LayerTrait, Loss, Metric, Optimizer};
pub use data::{ImageBatch, Mnist};
pub use error::{NNError, Result};
pub use models::Sequential;
