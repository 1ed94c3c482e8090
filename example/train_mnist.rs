use env_logger::Env;
use log::info;
use mnist_dense::data::Mnist;
use mnist_dense::export::MODEL_JSON;
use mnist_dense::pipeline::train_and_export;
use mnist_dense::prelude::*;
use mnist_dense::utils::{output_dir, prepare_dir};
use mnist_dense::TrainingConfig;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = TrainingConfig::default();

    // Paths are resolved from the crate directory, not the working directory.
    let script_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let output_dir = prepare_dir(&output_dir(script_dir))?;
    let artifacts_dir = prepare_dir(&script_dir.join("artifacts"))?;

    info!("Loading MNIST dataset...");
    let mnist = Mnist::load(&script_dir.join("data").join("mnist"))?;
    info!("  Train samples : {}", mnist.train.len());
    info!("  Test  samples : {}", mnist.test.len());

    let report = train_and_export(&config, &mnist.train, &mnist.test, &output_dir)?;

    report.history.write_csv(&artifacts_dir.join("history.csv"))?;
    report
        .model
        .save(&artifacts_dir.join(format!("{}.model", config.model_name)))?;

    info!("Done! Load in browser with:");
    info!("  const model = await tf.loadLayersModel('/model/{}');", MODEL_JSON);
    Ok(())
}
