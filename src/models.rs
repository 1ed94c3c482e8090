use crate::core::losses::{criteria, softmax_crossentropy};
use crate::core::metrics::correct_predictions;
use crate::core::optimizers::Optimization;
use crate::history::{EpochLog, History};
use crate::prelude::*;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Rows per chunk when predicting in parallel.
const PREDICT_CHUNK: usize = 1024;

/// The named input of a model and its feature width.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub name: String,
    pub dim: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Sequential<T: LayerTrait> {
    pub name: String,
    pub input: InputSpec,
    pub layers: Vec<T>,
    pub optimizer: Optimizer,
    pub loss: Loss,
    pub metrics: Vec<Metric>,
    #[serde(skip)]
    state: Vec<OptimizerState>,
}

/// Settings for one call to [`Sequential::fit`].
#[derive(Debug, Clone)]
pub struct FitOptions<'a> {
    pub epochs: usize,
    pub batch_size: usize,
    pub shuffle: bool,
    pub seed: u64,
    pub validation_data: Option<(&'a Array2<f32>, &'a Array1<u8>)>,
    pub verbose: bool,
}

impl Default for FitOptions<'_> {
    fn default() -> Self {
        Self {
            epochs: 1,
            batch_size: 32,
            shuffle: true,
            seed: 0,
            validation_data: None,
            verbose: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss: f32,
    /// Set when `Metric::Accuracy` was compiled in.
    pub accuracy: Option<f32>,
}

pub struct SequentialBuilder {
    name: String,
    input: Option<InputSpec>,
    layers: Vec<Dense>,
    rng: StdRng,
}

impl SequentialBuilder {
    /// Seeds the weight initializer. Call before adding layers.
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn input(mut self, name: &str, dim: usize) -> Self {
        self.input = Some(InputSpec {
            name: name.to_string(),
            dim,
        });
        self
    }

    pub fn add_dense(mut self, name: &str, units: usize, activation: Activation) -> Result<Self> {
        let input = self.input.as_ref().ok_or_else(|| {
            NNError::InvalidLayerConfiguration(format!("layer '{}' added before the input", name))
        })?;
        if input.name == name || self.layers.iter().any(|l| l.name == name) {
            return Err(NNError::InvalidLayerConfiguration(format!(
                "duplicate layer name '{}'",
                name
            )));
        }
        let prev = self.layers.last().map_or(input.dim, |l| l.units());
        let layer = Dense::new(name, units, prev, activation, &mut self.rng)?;
        self.layers.push(layer);
        Ok(self)
    }

    pub fn build(self) -> Result<Sequential<Dense>> {
        let input = self.input.ok_or_else(|| {
            NNError::InvalidLayerConfiguration("model has no input".to_string())
        })?;
        if input.dim == 0 {
            return Err(NNError::InvalidLayerConfiguration(
                "input width must be greater than 0".to_string(),
            ));
        }
        Sequential::new(&self.name, input, self.layers)
    }
}

impl Sequential<Dense> {
    pub fn builder(name: &str) -> SequentialBuilder {
        SequentialBuilder {
            name: name.to_string(),
            input: None,
            layers: Vec::new(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn new(name: &str, input: InputSpec, layers: Vec<Dense>) -> Result<Self> {
        if layers.is_empty() {
            return Err(NNError::EmptyModel);
        }
        let mut prev = input.dim;
        for layer in &layers {
            if layer.inputs() != prev || layer.b.len() != layer.w.ncols() {
                return Err(NNError::LayerShapeMismatch(format!(
                    "layer '{}' has kernel {:?} and bias {:?} after width {}",
                    layer.name,
                    layer.w.shape(),
                    layer.b.shape(),
                    prev
                )));
            }
            prev = layer.units();
        }
        Ok(Self {
            name: name.to_string(),
            input,
            layers,
            optimizer: Optimizer::None,
            loss: Loss::None,
            metrics: Vec::new(),
            state: Vec::new(),
        })
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(self.input.dim, |l| l.units())
    }

    pub fn count_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.count_parameters()).sum()
    }

    /// Keras-style table of layers, output shapes and parameter counts.
    pub fn summary(&self) -> String {
        let rule = "_".repeat(65);
        let double = "=".repeat(65);
        let mut res = format!("Model: \"{}\"\n{}\n", self.name, rule);
        res.push_str(&format!(" {:<28}{:<26}{}\n{}\n", "Layer (type)", "Output Shape", "Param #", double));
        res.push_str(&format!(
            " {:<28}{:<26}{}\n",
            format!("{} (InputLayer)", self.input.name),
            format!("[(None, {})]", self.input.dim),
            0
        ));
        for layer in self.layers.iter() {
            res.push_str(&format!(
                " {:<28}{:<26}{}\n",
                format!("{} ({})", layer.name, layer.typ()),
                format!("(None, {})", layer.units()),
                layer.count_parameters()
            ));
        }
        res.push_str(&format!("{}\n", double));
        res.push_str(&format!("Total params: {}\n", self.count_parameters()));
        res.push_str(&format!("Trainable params: {}\n", self.count_parameters()));
        res.push_str("Non-trainable params: 0\n");
        res.push_str(&rule);
        res
    }

    pub fn compile(&mut self, optimizer: Optimizer, loss: Loss, metrics: &[Metric]) {
        self.optimizer = optimizer;
        self.loss = loss;
        self.metrics = metrics.to_vec();
        self.state = vec![OptimizerState::default(); self.layers.len()];
    }

    /// Compiles from Keras identifiers such as `"adam"`,
    /// `"sparse_categorical_crossentropy"` and `"accuracy"`.
    pub fn compile_by_name(&mut self, optimizer: &str, loss: &str, metrics: &[&str]) -> Result<()> {
        let optimizer = optimizer.parse::<Optimizer>()?;
        let loss = loss.parse::<Loss>()?;
        let metrics = metrics
            .iter()
            .map(|m| m.parse::<Metric>())
            .collect::<Result<Vec<_>>>()?;
        self.compile(optimizer, loss, &metrics);
        Ok(())
    }

    pub fn fit(&mut self, x: &Array2<f32>, y: &Array1<u8>, options: &FitOptions) -> Result<History> {
        if matches!(self.optimizer, Optimizer::None) {
            return Err(NNError::OptimizerNotSet);
        }
        if matches!(self.loss, Loss::None) {
            return Err(NNError::LossNotSet);
        }
        self.check_batch(x, y)?;
        if options.batch_size == 0 {
            return Err(NNError::InvalidInputShape("batch size must be greater than 0".to_string()));
        }
        if self.state.len() != self.layers.len() {
            self.state = vec![OptimizerState::default(); self.layers.len()];
        }

        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut order: Vec<usize> = (0..x.nrows()).collect();
        let mut history = History::default();
        let steps = x.nrows().div_ceil(options.batch_size);

        for epoch in 1..=options.epochs {
            if options.shuffle {
                order.shuffle(&mut rng);
            }

            let track_accuracy = self.metrics.contains(&Metric::Accuracy);
            let mut loss_sum = 0.0f64;
            let mut correct = 0usize;
            for (step, batch) in order.chunks(options.batch_size).enumerate() {
                let xb = x.select(Axis(0), batch);
                let yb = y.select(Axis(0), batch);
                let (loss, y_hat) = self.train_step(&xb, &yb)?;
                loss_sum += loss as f64 * batch.len() as f64;
                if track_accuracy {
                    correct += correct_predictions(&y_hat, &yb);
                }
                debug!("epoch {} step {}/{} loss {:.4}", epoch, step + 1, steps, loss);
            }

            let samples = x.nrows().max(1) as f64;
            let mut log = EpochLog {
                epoch,
                loss: (loss_sum / samples) as f32,
                accuracy: track_accuracy.then(|| (correct as f64 / samples) as f32),
                val_loss: None,
                val_accuracy: None,
            };
            if let Some((x_val, y_val)) = options.validation_data {
                let val = self.evaluate(x_val, y_val)?;
                log.val_loss = Some(val.loss);
                log.val_accuracy = val.accuracy;
            }
            if options.verbose {
                info!("Epoch {}/{} - {} steps - {}", epoch, options.epochs, steps, log);
            }
            history.push(log);
        }
        Ok(history)
    }

    /// One forward/backward pass and parameter update on a single batch.
    /// Returns the batch loss and the predictions made before the update.
    fn train_step(&mut self, x: &Array2<f32>, y: &Array1<u8>) -> Result<(f32, Array2<f32>)> {
        // cache (required for back propagation)
        let mut z_cache = Vec::with_capacity(self.layers.len());
        let mut a_cache = Vec::with_capacity(self.layers.len() + 1);
        a_cache.push(x.clone());

        for layer in self.layers.iter() {
            let (z, a) = layer.forward(a_cache.last().unwrap_or(x))?;
            z_cache.push(z);
            a_cache.push(a);
        }

        let y_hat = a_cache.pop().ok_or(NNError::EmptyModel)?;
        let fused = self.fused_head(self.loss);
        let (loss, mut grad) = match z_cache.last() {
            Some(z) if fused => softmax_crossentropy(z, y)?,
            _ => criteria(&y_hat, y, self.loss)?,
        };

        // With a fused head, `grad` starts out w.r.t. the output logits.
        let mut grads = Vec::with_capacity(self.layers.len());
        let layers = self.layers.iter().rev().zip(z_cache.iter().rev()).zip(a_cache.iter().rev());
        for (i, ((layer, z), a)) in layers.enumerate() {
            let (dw, db, da_prev) = if fused && i == 0 {
                layer.backward_from_logits(a, grad)
            } else {
                layer.backward(z, a, grad)?
            };
            grads.push((dw, db));
            grad = da_prev;
        }
        grads.reverse();

        for ((layer, state), (dw, db)) in self.layers.iter_mut().zip(self.state.iter_mut()).zip(grads) {
            layer.optimize(dw, db, &self.optimizer, state);
        }
        Ok((loss, y_hat))
    }

    pub fn evaluate(&self, x: &Array2<f32>, y: &Array1<u8>) -> Result<Evaluation> {
        self.check_batch(x, y)?;
        let loss_ty = match self.loss {
            Loss::None => Loss::SparseCategoricalCrossentropy,
            loss => loss,
        };
        let (loss, y_hat) = if self.fused_head(loss_ty) {
            let z = self.forward_batched(x, true)?;
            let (loss, _) = softmax_crossentropy(&z, y)?;
            (loss, Activation::Softmax.forward(&z)?)
        } else {
            let y_hat = self.predict(x)?;
            (criteria(&y_hat, y, loss_ty)?.0, y_hat)
        };

        let mut evaluation = Evaluation { loss, accuracy: None };
        for metric in &self.metrics {
            match metric {
                Metric::Accuracy => evaluation.accuracy = Some(metric.compute(&y_hat, y)),
            }
        }
        Ok(evaluation)
    }

    pub fn predict(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        self.forward_batched(x, false)
    }

    /// Sparse categorical cross-entropy over a softmax output is computed
    /// from the logits instead of the clipped probabilities.
    fn fused_head(&self, loss: Loss) -> bool {
        loss == Loss::SparseCategoricalCrossentropy
            && self.layers.last().map(|layer| layer.activation) == Some(Activation::Softmax)
    }

    /// Forward pass over `x`, split into chunks that run on the rayon pool.
    /// With `logits` the output layer's activation is left off.
    fn forward_batched(&self, x: &Array2<f32>, logits: bool) -> Result<Array2<f32>> {
        if x.ncols() != self.input.dim {
            return Err(NNError::InvalidInputShape(format!(
                "model '{}' expects {} features, got {}",
                self.name,
                self.input.dim,
                x.ncols()
            )));
        }
        if x.nrows() <= PREDICT_CHUNK {
            return self.forward(x.to_owned(), logits);
        }
        let chunks: Vec<ArrayView2<f32>> = x.axis_chunks_iter(Axis(0), PREDICT_CHUNK).collect();
        let outputs = chunks
            .par_iter()
            .map(|chunk| self.forward(chunk.to_owned(), logits))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<ArrayView2<f32>> = outputs.iter().map(|o| o.view()).collect();
        Ok(concatenate(Axis(0), &views)?)
    }

    fn forward(&self, mut x: Array2<f32>, logits: bool) -> Result<Array2<f32>> {
        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            let (z, a) = layer.forward(&x)?;
            x = if logits && i == last { z } else { a };
        }
        Ok(x)
    }

    fn check_batch(&self, x: &Array2<f32>, y: &Array1<u8>) -> Result<()> {
        if x.ncols() != self.input.dim {
            return Err(NNError::InvalidInputShape(format!(
                "expected {} features, got {}",
                self.input.dim,
                x.ncols()
            )));
        }
        if x.nrows() != y.len() {
            return Err(NNError::InvalidOutputShape(format!(
                "{} samples but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        Ok(())
    }

    /// Binary checkpoint of the whole model (topology, weights, compile
    /// settings). Optimizer moments are not kept.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self).map_err(NNError::SerializationError)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Sequential<Dense>> {
        let reader = BufReader::new(File::open(path)?);
        let Sequential {
            name,
            input,
            layers,
            optimizer,
            loss,
            metrics,
            ..
        }: Sequential<Dense> = bincode::deserialize_from(reader)
            .map_err(|err| NNError::ModelLoadError(format!("{}: {}", path.display(), err)))?;

        // Re-validate shapes; the file may not come from `save`.
        let mut model = Sequential::new(&name, input, layers)?;
        model.compile(optimizer, loss, &metrics);
        Ok(model)
    }
}
