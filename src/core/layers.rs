use crate::core::activations::Activation;
use crate::core::optimizers::{Optimization, Optimizer, OptimizerState};
use crate::glorot_array;
use crate::prelude::*;
use rand::Rng;

pub trait LayerTrait {
    fn typ(&self) -> &'static str;

    fn name(&self) -> &str;

    fn units(&self) -> usize;

    fn count_parameters(&self) -> usize;
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Dense {
    pub name: String,
    /// Kernel, `[inputs, units]`.
    pub w: Array2<f32>,
    pub b: Array1<f32>,
    pub activation: Activation,
}

impl LayerTrait for Dense {
    fn typ(&self) -> &'static str {
        "Dense"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn units(&self) -> usize {
        self.b.len()
    }

    fn count_parameters(&self) -> usize {
        self.w.len() + self.b.len()
    }
}

impl Dense {
    /// Glorot-uniform kernel and zero bias, the Keras defaults.
    pub fn new<R: Rng + ?Sized>(
        name: &str,
        perceptron: usize,
        prev: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        if perceptron == 0 || prev == 0 {
            return Err(NNError::InvalidLayerConfiguration(format!(
                "layer '{}': dimensions must be greater than 0",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            w: glorot_array!(rng, prev, perceptron),
            b: Array1::zeros(perceptron),
            activation,
        })
    }

    pub fn inputs(&self) -> usize {
        self.w.nrows()
    }

    pub fn forward(&self, a: &Array2<f32>) -> Result<(Array2<f32>, Array2<f32>)> {
        if a.ncols() != self.inputs() {
            return Err(NNError::InvalidInputShape(format!(
                "layer '{}' expects {} features, got {}",
                self.name,
                self.inputs(),
                a.ncols()
            )));
        }
        let z = a.dot(&self.w) + &self.b;
        let a = self.activation.forward(&z)?;
        Ok((z, a))
    }

    /// `da` is the loss gradient w.r.t. this layer's output, already averaged
    /// over the batch. Returns `(dw, db, da_prev)`.
    pub fn backward(
        &self,
        z: &Array2<f32>,
        a_prev: &Array2<f32>,
        da: Array2<f32>,
    ) -> Result<(Array2<f32>, Array1<f32>, Array2<f32>)> {
        let dz = self.activation.backward(z, da)?;
        Ok(self.backward_from_logits(a_prev, dz))
    }

    /// Same as [`Dense::backward`] when the gradient w.r.t. the
    /// pre-activation `z` is already known.
    pub fn backward_from_logits(
        &self,
        a_prev: &Array2<f32>,
        dz: Array2<f32>,
    ) -> (Array2<f32>, Array1<f32>, Array2<f32>) {
        let dw = a_prev.t().dot(&dz);
        let db = dz.sum_axis(Axis(0));
        let da_prev = dz.dot(&self.w.t());
        (dw, db, da_prev)
    }
}

impl Optimization for Dense {
    fn optimize(
        &mut self,
        dw: Array2<f32>,
        db: Array1<f32>,
        optimizer: &Optimizer,
        state: &mut OptimizerState,
    ) {
        apply_optimization(&mut self.w, &mut self.b, dw, db, optimizer, state);
    }
}
