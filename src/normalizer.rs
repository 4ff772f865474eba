use ndarray::{Array1, Array2, Axis};

use crate::error::{Error, Result};

/// Added to every column range so constant columns never divide by zero.
pub const RANGE_EPSILON: f64 = 1e-20;

/// Column-wise min-max scaling fitted on the training features.
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxScaler {
    pub min: Array1<f64>,
    pub max: Array1<f64>,
}

impl MinMaxScaler {
    pub fn fit(reference: &Array2<f64>) -> Result<Self> {
        if reference.nrows() == 0 {
            return Err(Error::shape("scaler reference rows", "at least 1", 0));
        }

        let min = reference.fold_axis(Axis(0), f64::INFINITY, |&acc, &x| acc.min(x));
        let max = reference.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &x| acc.max(x));

        Ok(Self { min, max })
    }

    pub fn from_parts(min: Array1<f64>, max: Array1<f64>) -> Result<Self> {
        if min.len() != max.len() {
            return Err(Error::shape("scaler bounds", min.len(), max.len()));
        }

        Ok(Self { min, max })
    }

    pub fn len(&self) -> usize {
        self.min.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    /// `(data - min) / (max - min + ε)`, column by column.
    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.len() {
            return Err(Error::shape("normalized columns", self.len(), data.ncols()));
        }

        let range = &self.max - &self.min + RANGE_EPSILON;

        Ok((data - &self.min) / &range)
    }
}
