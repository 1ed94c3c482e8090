//! TensorFlow.js "layers-model" writer.
//!
//! Produces `model.json` (Keras-style topology plus a weights manifest) and
//! little-endian `float32` weight shards named `group1-shard{i}of{n}.bin`.
//! Weights are concatenated in layer order, kernel before bias, and the byte
//! stream is split into shards of at most `shard_size` bytes, so a single
//! tensor may straddle two shards.

use crate::prelude::*;
use log::{debug, info};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const MODEL_JSON: &str = "model.json";
pub const DEFAULT_SHARD_SIZE: usize = 4 * 1024 * 1024;
const KERAS_VERSION: &str = "2.15.0";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WeightSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WeightGroup {
    pub paths: Vec<String>,
    pub weights: Vec<WeightSpec>,
}

/// Contents of `model.json`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ModelArtifacts {
    pub format: String,
    pub generated_by: String,
    pub converted_by: Option<String>,
    pub model_topology: Value,
    pub weights_manifest: Vec<WeightGroup>,
}

impl ModelArtifacts {
    /// Layer names in topology order, the input layer included.
    pub fn layer_names(&self) -> Vec<String> {
        self.model_topology["config"]["layers"]
            .as_array()
            .map(|layers| {
                layers
                    .iter()
                    .filter_map(|l| l["config"]["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedModel {
    pub manifest: PathBuf,
    pub shards: Vec<PathBuf>,
}

pub fn model_topology(model: &Sequential<Dense>) -> Value {
    let mut layers = vec![json!({
        "class_name": "InputLayer",
        "config": {
            "batch_input_shape": [Value::Null, model.input.dim],
            "dtype": "float32",
            "sparse": false,
            "ragged": false,
            "name": model.input.name,
        },
    })];
    for layer in &model.layers {
        layers.push(json!({
            "class_name": layer.typ(),
            "config": {
                "name": layer.name,
                "trainable": true,
                "dtype": "float32",
                "units": layer.units(),
                "activation": layer.activation.name(),
                "use_bias": true,
                "kernel_initializer": { "class_name": "GlorotUniform", "config": { "seed": Value::Null } },
                "bias_initializer": { "class_name": "Zeros", "config": {} },
                "kernel_regularizer": Value::Null,
                "bias_regularizer": Value::Null,
                "activity_regularizer": Value::Null,
                "kernel_constraint": Value::Null,
                "bias_constraint": Value::Null,
            },
        }));
    }
    json!({
        "class_name": "Sequential",
        "config": { "name": model.name, "layers": layers },
        "keras_version": KERAS_VERSION,
        "backend": "tensorflow",
    })
}

pub fn weight_specs(model: &Sequential<Dense>) -> Vec<WeightSpec> {
    model
        .layers
        .iter()
        .flat_map(|layer| {
            [
                WeightSpec {
                    name: format!("{}/kernel", layer.name),
                    shape: layer.w.shape().to_vec(),
                    dtype: "float32".to_string(),
                },
                WeightSpec {
                    name: format!("{}/bias", layer.name),
                    shape: layer.b.shape().to_vec(),
                    dtype: "float32".to_string(),
                },
            ]
        })
        .collect()
}

/// All weights as one little-endian `float32` stream, in manifest order.
pub fn weight_data(model: &Sequential<Dense>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(model.count_parameters() * 4);
    for layer in &model.layers {
        // Logical (row-major) order regardless of memory layout.
        for v in layer.w.iter().chain(layer.b.iter()) {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }
    bytes
}

pub fn save_layers_model(model: &Sequential<Dense>, dir: &Path) -> Result<ExportedModel> {
    save_layers_model_with_shard_size(model, dir, DEFAULT_SHARD_SIZE)
}

pub fn save_layers_model_with_shard_size(
    model: &Sequential<Dense>,
    dir: &Path,
    shard_size: usize,
) -> Result<ExportedModel> {
    if shard_size == 0 {
        return Err(NNError::ExportError("shard size must be greater than 0".to_string()));
    }
    fs::create_dir_all(dir)?;
    remove_previous_export(dir)?;

    let data = weight_data(model);
    let total = data.len().div_ceil(shard_size).max(1);
    let mut names = Vec::with_capacity(total);
    let mut shards = Vec::with_capacity(total);
    for (i, chunk) in data.chunks(shard_size).enumerate() {
        let name = format!("group1-shard{}of{}.bin", i + 1, total);
        let path = dir.join(&name);
        fs::write(&path, chunk)?;
        debug!("wrote {} ({} bytes)", path.display(), chunk.len());
        names.push(name);
        shards.push(path);
    }

    let artifacts = ModelArtifacts {
        format: "layers-model".to_string(),
        generated_by: format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        converted_by: None,
        model_topology: model_topology(model),
        weights_manifest: vec![WeightGroup {
            paths: names,
            weights: weight_specs(model),
        }],
    };
    let manifest = dir.join(MODEL_JSON);
    fs::write(&manifest, serde_json::to_vec(&artifacts)?)?;
    info!(
        "Exported '{}' to {} ({} weight shard(s))",
        model.name,
        dir.display(),
        shards.len()
    );

    Ok(ExportedModel { manifest, shards })
}

pub fn read_artifacts(dir: &Path) -> Result<ModelArtifacts> {
    let text = fs::read(dir.join(MODEL_JSON))?;
    Ok(serde_json::from_slice(&text)?)
}

fn is_shard_file(name: &str) -> bool {
    name.starts_with("group") && name.contains("-shard") && name.ends_with(".bin")
}

/// Drops the manifest and shards of an earlier export so a smaller model
/// does not leave orphaned shards behind.
fn remove_previous_export(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if entry.file_type()?.is_file() && (name == MODEL_JSON || is_shard_file(&name)) {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Sequential<Dense> {
        Sequential::builder("mnist_dense")
            .seed(11)
            .input("input", 12)
            .add_dense("dense1", 6, Activation::Relu)
            .unwrap()
            .add_dense("dense2", 5, Activation::Relu)
            .unwrap()
            .add_dense("output", 3, Activation::Softmax)
            .unwrap()
            .build()
            .unwrap()
    }

    fn read_floats(paths: &[PathBuf]) -> Vec<f32> {
        let mut bytes = Vec::new();
        for p in paths {
            bytes.extend(fs::read(p).unwrap());
        }
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn manifest_names_layers_and_weights() {
        let tmp = tempfile::tempdir().unwrap();
        let model = model();
        let exported = save_layers_model(&model, tmp.path()).unwrap();
        assert_eq!(exported.shards.len(), 1);
        assert!(exported.shards[0].ends_with("group1-shard1of1.bin"));

        let artifacts = read_artifacts(tmp.path()).unwrap();
        assert_eq!(artifacts.format, "layers-model");
        assert_eq!(artifacts.layer_names(), ["input", "dense1", "dense2", "output"]);
        assert_eq!(artifacts.model_topology["config"]["layers"][0]["config"]["batch_input_shape"], json!([null, 12]));
        assert_eq!(artifacts.model_topology["config"]["layers"][3]["config"]["activation"], "softmax");

        let group = &artifacts.weights_manifest[0];
        assert_eq!(group.paths, ["group1-shard1of1.bin"]);
        let names: Vec<_> = group.weights.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(
            names,
            ["dense1/kernel", "dense1/bias", "dense2/kernel", "dense2/bias", "output/kernel", "output/bias"]
        );
        assert_eq!(group.weights[0].shape, [12usize, 6]);
        assert_eq!(group.weights[5].shape, [3usize]);
    }

    #[test]
    fn shards_hold_weights_in_manifest_order() {
        let tmp = tempfile::tempdir().unwrap();
        let model = model();
        let exported = save_layers_model(&model, tmp.path()).unwrap();

        let floats = read_floats(&exported.shards);
        assert_eq!(floats.len(), model.count_parameters());
        let w1 = &model.layers[0].w;
        assert_eq!(floats[0], w1[[0, 0]]);
        assert_eq!(floats[1], w1[[0, 1]]);
        assert_eq!(floats[6], w1[[1, 0]]);
        let last = model.layers[2].b[2];
        assert_eq!(*floats.last().unwrap(), last);
    }

    #[test]
    fn small_shard_size_splits_the_stream() {
        let tmp = tempfile::tempdir().unwrap();
        let model = model();
        let bytes = model.count_parameters() * 4;
        let exported = save_layers_model_with_shard_size(&model, tmp.path(), 100).unwrap();
        assert_eq!(exported.shards.len(), bytes.div_ceil(100));
        assert!(exported.shards.last().unwrap().ends_with(format!(
            "group1-shard{}of{}.bin",
            exported.shards.len(),
            exported.shards.len()
        )));
        assert_eq!(read_floats(&exported.shards), weight_data(&model)
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect::<Vec<_>>());
    }

    #[test]
    fn re_export_replaces_stale_shards() {
        let tmp = tempfile::tempdir().unwrap();
        let model = model();
        save_layers_model_with_shard_size(&model, tmp.path(), 64).unwrap();
        fs::write(tmp.path().join("README.txt"), "keep me").unwrap();
        save_layers_model(&model, tmp.path()).unwrap();

        let mut names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["README.txt", "group1-shard1of1.bin", "model.json"]);
    }

    #[test]
    fn zero_shard_size_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            save_layers_model_with_shard_size(&model(), tmp.path(), 0),
            Err(NNError::ExportError(_))
        ));
    }
}
