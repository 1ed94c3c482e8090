use crate::config::TrainingConfig;
use crate::data::ImageBatch;
use crate::export::{save_layers_model_with_shard_size, ExportedModel};
use crate::history::History;
use crate::prelude::*;
use crate::utils::{list_files, FileEntry};
use log::info;
use std::path::Path;

/// What a full train-and-export run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub model: Sequential<Dense>,
    pub history: History,
    pub evaluation: Evaluation,
    pub exported: ExportedModel,
    pub files: Vec<FileEntry>,
}

/// Builds and compiles the network described by `config`.
pub fn build_model(config: &TrainingConfig) -> Result<Sequential<Dense>> {
    let mut builder = Sequential::builder(&config.model_name)
        .seed(config.seed)
        .input(&config.input_name, config.input_dim);
    for layer in &config.layers {
        builder = builder.add_dense(&layer.name, layer.units, layer.activation)?;
    }
    let mut model = builder.build()?;

    let metrics: Vec<&str> = config.metrics.iter().map(String::as_str).collect();
    model.compile_by_name(&config.optimizer, &config.loss, &metrics)?;
    Ok(model)
}

/// Trains on `train`, validates and evaluates on `test`, and writes the
/// layers-model artifacts to `output_dir`.
pub fn train_and_export(
    config: &TrainingConfig,
    train: &ImageBatch,
    test: &ImageBatch,
    output_dir: &Path,
) -> Result<PipelineReport> {
    let mut model = build_model(config)?;
    info!("\n{}", model.summary());

    info!("Training...");
    let options = FitOptions {
        epochs: config.epochs,
        batch_size: config.batch_size,
        shuffle: config.shuffle,
        seed: config.seed,
        validation_data: Some((&test.images, &test.labels)),
        verbose: true,
    };
    let history = model.fit(&train.images, &train.labels, &options)?;

    let evaluation = model.evaluate(&test.images, &test.labels)?;
    match evaluation.accuracy {
        Some(accuracy) => info!("Test accuracy : {:.4}  (loss: {:.4})", accuracy, evaluation.loss),
        None => info!("Test loss : {:.4}", evaluation.loss),
    }

    info!("Saving TensorFlow.js model to: {}", output_dir.display());
    let exported = save_layers_model_with_shard_size(&model, output_dir, config.shard_size)?;

    let files = list_files(output_dir)?;
    info!("Generated files:");
    for file in &files {
        info!("  {}", file);
    }

    Ok(PipelineReport {
        model,
        history,
        evaluation,
        exported,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayerSpec;

    #[test]
    fn default_config_builds_the_fixed_network() {
        let model = build_model(&TrainingConfig::default()).unwrap();
        let names: Vec<_> = model.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["dense1", "dense2", "output"]);
        assert_eq!(model.count_parameters(), 784 * 128 + 128 + 128 * 64 + 64 + 64 * 10 + 10);
        assert_eq!(model.optimizer, Optimizer::adam());
        assert_eq!(model.loss, Loss::SparseCategoricalCrossentropy);
        assert_eq!(model.metrics, vec![Metric::Accuracy]);
    }

    #[test]
    fn bad_names_surface_from_build() {
        let config = TrainingConfig {
            optimizer: "adamw-fancy".to_string(),
            ..TrainingConfig::default()
        };
        assert!(matches!(build_model(&config), Err(NNError::InvalidOptimizer(_))));

        let config = TrainingConfig {
            layers: vec![LayerSpec::new("dense1", 0, Activation::Relu)],
            ..TrainingConfig::default()
        };
        assert!(matches!(build_model(&config), Err(NNError::InvalidLayerConfiguration(_))));
    }
}
