use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// `X·w + b`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    pub weights: Array1<f64>,
    pub bias: f64,
}

impl LinearModel {
    pub fn new(weights: Array1<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    pub fn feature_count(&self) -> usize {
        self.weights.len()
    }

    pub fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        if features.ncols() != self.weights.len() {
            return Err(Error::shape(
                "model input columns",
                self.weights.len(),
                features.ncols(),
            ));
        }

        Ok(features.dot(&self.weights) + self.bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn predicts_affine_combination() {
        let model = LinearModel::new(array![2., -3.], 5.);

        let predictions = model.predict(&array![[1., 1.], [0., 2.]]).unwrap();

        assert_eq!(predictions, array![4., -1.]);
        assert!(model.predict(&array![[1.]]).is_err());
    }
}
