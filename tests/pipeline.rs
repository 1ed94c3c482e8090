use mnist_dense::data::{ImageBatch, Mnist, IMAGE_PIXELS, NUM_CLASSES, TEST_SIZE, TRAIN_SIZE};
use mnist_dense::export::{read_artifacts, MODEL_JSON};
use mnist_dense::pipeline::train_and_export;
use mnist_dense::prelude::*;
use mnist_dense::utils::{output_dir, prepare_dir};
use mnist_dense::TrainingConfig;
use std::fs;
use std::path::Path;

/// Digit-shaped stand-in for MNIST: class `k` lights up pixel rows
/// `2k + 4` and `2k + 5`, with a little deterministic speckle elsewhere.
fn synthetic(n: usize, offset: usize) -> ImageBatch {
    let mut images = Array2::<f32>::zeros((n, IMAGE_PIXELS));
    let mut labels = Array1::<u8>::zeros(n);
    for i in 0..n {
        let class = (i + offset) % NUM_CLASSES;
        labels[i] = class as u8;
        for row in [2 * class + 4, 2 * class + 5] {
            for col in 4..24 {
                images[[i, row * 28 + col]] = 0.6 + 0.4 * (((i + col) % 5) as f32 / 5.0);
            }
        }
        let speckle = (i * 131 + offset * 7) % IMAGE_PIXELS;
        images[[i, speckle]] = 0.5;
    }
    ImageBatch { images, labels }
}

fn small_config() -> TrainingConfig {
    TrainingConfig {
        epochs: 20,
        batch_size: 16,
        ..TrainingConfig::default()
    }
}

#[test]
fn trains_and_exports_a_loadable_model() {
    let tmp = tempfile::tempdir().unwrap();
    let script_dir = tmp.path().join("app").join("model");
    let out = prepare_dir(&output_dir(&script_dir)).unwrap();
    assert!(out.ends_with("public/model"));

    let train = synthetic(300, 0);
    let test = synthetic(100, 3);
    let report = train_and_export(&small_config(), &train, &test, &out).unwrap();

    assert_eq!(report.history.len(), 20);
    assert!(report.history.last().unwrap().val_accuracy.is_some());
    let accuracy = report.evaluation.accuracy.unwrap();
    assert!(accuracy > 0.9, "accuracy {}", accuracy);

    // Exactly one manifest and at least one shard.
    let names: Vec<_> = report.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names.iter().filter(|n| n.ends_with(".json")).count(), 1);
    assert!(names.iter().any(|n| n.ends_with(".bin")));
    assert!(names.contains(&MODEL_JSON));

    let artifacts = read_artifacts(&out).unwrap();
    assert_eq!(artifacts.layer_names(), ["input", "dense1", "dense2", "output"]);
    let shard_bytes: u64 = report
        .files
        .iter()
        .filter(|f| f.name.ends_with(".bin"))
        .map(|f| f.size)
        .sum();
    assert_eq!(shard_bytes as usize, report.model.count_parameters() * 4);

    // Softmax output: ten probabilities per image.
    let probabilities = report.model.predict(&test.images).unwrap();
    assert_eq!(probabilities.ncols(), 10);
    for row in probabilities.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-5);
        assert!(row.iter().all(|&p| p >= 0.0));
    }
}

#[test]
fn rerun_overwrites_with_identical_output() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("public").join("model");
    let train = synthetic(64, 0);
    let test = synthetic(20, 1);
    let config = TrainingConfig {
        epochs: 1,
        batch_size: 32,
        ..TrainingConfig::default()
    };

    let first = train_and_export(&config, &train, &test, &out).unwrap();
    let first_shard = fs::read(&first.exported.shards[0]).unwrap();
    let second = train_and_export(&config, &train, &test, &out).unwrap();
    let second_shard = fs::read(&second.exported.shards[0]).unwrap();

    assert_eq!(first.files, second.files);
    assert_eq!(first_shard, second_shard);
}

#[test]
fn mismatched_input_width_surfaces_as_error() {
    let tmp = tempfile::tempdir().unwrap();
    let train = ImageBatch {
        images: Array2::zeros((4, 100)),
        labels: Array1::zeros(4),
    };
    let err = train_and_export(&small_config(), &train, &train, tmp.path()).unwrap_err();
    assert!(matches!(err, NNError::InvalidInputShape(_)));
    assert!(!tmp.path().join(MODEL_JSON).exists());
}

/// Downloads MNIST (about 11 MB) and runs the real five-epoch training.
#[test]
#[ignore = "downloads MNIST and trains for several seconds"]
fn mnist_end_to_end_exceeds_ninety_percent() {
    let cache = Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join("mnist");
    let mnist = Mnist::load(&cache).unwrap();
    assert_eq!(mnist.train.len(), TRAIN_SIZE);
    assert_eq!(mnist.test.len(), TEST_SIZE);
    assert!(mnist.train.images.iter().all(|&v| (0.0..=1.0).contains(&v)));

    let tmp = tempfile::tempdir().unwrap();
    let report = train_and_export(&TrainingConfig::default(), &mnist.train, &mnist.test, tmp.path()).unwrap();
    let accuracy = report.evaluation.accuracy.unwrap();
    assert!(accuracy > 0.90, "accuracy {}", accuracy);
}
