use ndarray::Array2;

pub trait Normalization {
    fn to_unity(&mut self, lb: f32, ub: f32);
    fn from_unity(&mut self, lb: f32, ub: f32);
}

impl Normalization for Array2<f32> {
    fn to_unity(&mut self, lb: f32, ub: f32) {
        let range = ub - lb;

        // A degenerate range maps everything to 0.0
        if range.abs() < f32::EPSILON {
            self.fill(0.0);
        } else {
            self.mapv_inplace(|v| ((v - lb) / range).clamp(0.0, 1.0));
        }
    }

    fn from_unity(&mut self, lb: f32, ub: f32) {
        let range = ub - lb;

        if range.abs() < f32::EPSILON {
            self.fill(lb);
        } else {
            self.mapv_inplace(|v| v * range + lb);
        }
    }
}
