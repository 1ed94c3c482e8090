use crate::core::Activation;
use crate::data::{IMAGE_PIXELS, NUM_CLASSES};
use crate::export::DEFAULT_SHARD_SIZE;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LayerSpec {
    pub name: String,
    pub units: usize,
    pub activation: Activation,
}

impl LayerSpec {
    pub fn new(name: &str, units: usize, activation: Activation) -> Self {
        Self {
            name: name.to_string(),
            units,
            activation,
        }
    }
}

/// Everything the trainer needs to know. The defaults are the fixed
/// MNIST setup: 784 → 128 → 64 → 10, Adam, 5 epochs of 256-sample batches.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub model_name: String,
    pub input_name: String,
    pub input_dim: usize,
    pub layers: Vec<LayerSpec>,
    pub optimizer: String,
    pub loss: String,
    pub metrics: Vec<String>,
    pub epochs: usize,
    pub batch_size: usize,
    pub shuffle: bool,
    pub seed: u64,
    pub shard_size: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_name: "mnist_dense".to_string(),
            input_name: "input".to_string(),
            input_dim: IMAGE_PIXELS,
            layers: vec![
                LayerSpec::new("dense1", 128, Activation::Relu),
                LayerSpec::new("dense2", 64, Activation::Relu),
                LayerSpec::new("output", NUM_CLASSES, Activation::Softmax),
            ],
            optimizer: "adam".to_string(),
            loss: "sparse_categorical_crossentropy".to_string(),
            metrics: vec!["accuracy".to_string()],
            epochs: 5,
            batch_size: 256,
            shuffle: true,
            seed: 42,
            shard_size: DEFAULT_SHARD_SIZE,
        }
    }
}
