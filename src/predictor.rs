use std::io::Write;
use std::path::Path;

use ndarray::{Array1, Array3};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::features::FeatureBuilder;
use crate::model::LinearModel;
use crate::normalizer::MinMaxScaler;

#[derive(Debug, Serialize)]
struct PredictionRow {
    id: String,
    value: f64,
}

/// Applies the training-time feature layout and normalization to unseen records.
#[derive(Debug, Clone)]
pub struct Predictor {
    features: FeatureBuilder,
    scaler: MinMaxScaler,
    model: LinearModel,
}

impl Predictor {
    pub fn new(features: FeatureBuilder, scaler: MinMaxScaler, model: LinearModel) -> Result<Self> {
        let expected = features.feature_count();

        if scaler.len() != expected {
            return Err(Error::shape("scaler columns", expected, scaler.len()));
        }

        if model.feature_count() != expected {
            return Err(Error::shape("model weights", expected, model.feature_count()));
        }

        Ok(Self {
            features,
            scaler,
            model,
        })
    }

    pub fn predict(&self, records: &Array3<f64>) -> Result<Array1<f64>> {
        let features = self.features.build_inference(records)?;
        let normalized = self.scaler.transform(&features)?;

        self.model.predict(&normalized)
    }
}

/// Writes `id,value` followed by `id_<index>,<prediction>` rows.
pub fn write_predictions<W: Write>(writer: W, predictions: &Array1<f64>) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    writer.write_record(["id", "value"])?;

    for (i, &value) in predictions.iter().enumerate() {
        writer.serialize(PredictionRow {
            id: format!("id_{}", i),
            value,
        })?;
    }

    writer.flush()?;

    Ok(())
}

pub fn save_predictions<P: AsRef<Path>>(path: P, predictions: &Array1<f64>) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_predictions(file, predictions)?;

    log::info!(
        "{} predictions written to {}",
        predictions.len(),
        path.as_ref().display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureConfig;
    use ndarray::{array, Array2};

    #[test]
    fn writes_header_and_indexed_rows() {
        let mut buf = Vec::new();
        write_predictions(&mut buf, &array![1.5, -2., 0.1]).unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "id,value\nid_0,1.5\nid_1,-2.0\nid_2,0.1\n"
        );
    }

    #[test]
    fn empty_predictions_still_write_header() {
        let mut buf = Vec::new();
        write_predictions(&mut buf, &Array1::zeros(0)).unwrap();

        assert_eq!(String::from_utf8(buf).unwrap(), "id,value\n");
    }

    #[test]
    fn predicts_through_features_and_scaler() {
        let builder = FeatureBuilder::new(FeatureConfig {
            window: 1,
            channels: vec![0],
            target_channel: 0,
            cross_pair: (0, 0),
        })
        .unwrap();

        // columns: x, x^2, x*x
        let reference = Array2::from_shape_vec((2, 3), vec![0., 0., 0., 2., 4., 4.]).unwrap();
        let scaler = MinMaxScaler::fit(&reference).unwrap();
        let model = LinearModel::new(array![2., 0., 0.], 1.);

        let predictor = Predictor::new(builder, scaler, model).unwrap();
        let records = Array3::from_shape_vec((2, 1, 2), vec![9., 1., 9., 2.]).unwrap();

        let predictions = predictor.predict(&records).unwrap();

        assert!((predictions[0] - 2.).abs() < 1e-12);
        assert!((predictions[1] - 3.).abs() < 1e-12);
    }

    #[test]
    fn rejects_mismatched_parts() {
        let builder = FeatureBuilder::new(FeatureConfig::default()).unwrap();
        let scaler = MinMaxScaler::from_parts(Array1::zeros(3), Array1::ones(3)).unwrap();

        assert!(Predictor::new(builder, scaler, LinearModel::new(Array1::zeros(3), 0.)).is_err());
    }
}
