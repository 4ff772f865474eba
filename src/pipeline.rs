//! Train-or-load, then predict.
//!
//! When the model file is missing (or a retrain is requested) the model is fitted on the
//! training csv and saved along with its normalization bounds. Otherwise the saved model
//! is loaded and used as is.

use std::path::PathBuf;

use itertools::Itertools;
use ndarray::Array1;

use crate::dataset::{load_test, load_training, MissingValuePolicy, SensorLayout};
use crate::error::Result;
use crate::features::{FeatureBuilder, FeatureConfig};
use crate::gradient_descent::{FitReport, GradientDescent, StoppingPolicy, TrainingConfig};
use crate::model::LinearModel;
use crate::model_store::{load_model, save_model, ModelFile};
use crate::normalizer::MinMaxScaler;
use crate::plots::save_loss_plot;
use crate::predictor::{save_predictions, Predictor};

pub const DEFAULT_TRAIN_PATH: &str = "./data/train.csv";
pub const DEFAULT_MODEL_PATH: &str = "./linear_regression_model.csv";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub output_path: PathBuf,
    pub model_path: PathBuf,
    /// Fit a new model even if `model_path` exists.
    pub retrain: bool,
    pub loss_plot: Option<PathBuf>,
    pub layout: SensorLayout,
    pub missing_values: MissingValuePolicy,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub stopping: StoppingPolicy,
}

impl PipelineConfig {
    pub fn new(test_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            train_path: DEFAULT_TRAIN_PATH.into(),
            test_path: test_path.into(),
            output_path: output_path.into(),
            model_path: DEFAULT_MODEL_PATH.into(),
            retrain: false,
            loss_plot: None,
            layout: SensorLayout::default(),
            missing_values: MissingValuePolicy::default(),
            features: FeatureConfig::default(),
            training: TrainingConfig::default(),
            stopping: StoppingPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Train,
    Load,
}

#[derive(Debug)]
pub struct RunSummary {
    pub mode: RunMode,
    pub predictions: Array1<f64>,
    /// Only present when the model was trained in this run.
    pub report: Option<FitReport>,
}

fn training_features(
    config: &PipelineConfig,
    builder: &FeatureBuilder,
) -> Result<(ndarray::Array2<f64>, Array1<f64>)> {
    log::info!("reading training data from {}..", config.train_path.display());

    let tensor = load_training(&config.train_path, &config.layout, config.missing_values)?;

    builder.build_training(&tensor)
}

fn train(
    config: &PipelineConfig,
    builder: &FeatureBuilder,
) -> Result<(LinearModel, MinMaxScaler, FitReport)> {
    let (features, labels) = training_features(config, builder)?;

    let scaler = MinMaxScaler::fit(&features)?;
    let normalized = scaler.transform(&features)?;

    log::info!(
        "training on {} windows with {} features..",
        normalized.nrows(),
        normalized.ncols()
    );

    let (model, report) =
        GradientDescent::new(config.training, config.stopping).fit(&normalized, &labels)?;

    log::info!(
        "training stopped ({:?}) after {} iterations, RMSE {:.6}",
        report.stop_reason,
        report.iterations,
        report.final_rmse
    );

    let names = builder.feature_names();
    for (name, w) in names
        .iter()
        .zip(model.weights.iter())
        .sorted_by(|a, b| b.1.abs().total_cmp(&a.1.abs()))
        .take(5)
    {
        log::debug!("{:>24}: {:+.6}", name, w);
    }

    save_model(&config.model_path, &model, Some(&scaler))?;

    if let Some(path) = &config.loss_plot {
        save_loss_plot(&report.loss_history, path)?;
    }

    Ok((model, scaler, report))
}

fn load(config: &PipelineConfig, builder: &FeatureBuilder) -> Result<(LinearModel, MinMaxScaler)> {
    let ModelFile { model, scaler } = load_model(&config.model_path)?;

    let scaler = match scaler {
        Some(scaler) => scaler,
        None => {
            log::warn!(
                "{} has no normalization bounds, recomputing them from the training data",
                config.model_path.display()
            );

            let (features, _) = training_features(config, builder)?;
            MinMaxScaler::fit(&features)?
        }
    };

    Ok((model, scaler))
}

pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    let builder = FeatureBuilder::new(config.features.clone())?;

    let records = load_test(&config.test_path, &config.layout, config.missing_values)?;

    let (mode, model, scaler, report) = if !config.retrain && config.model_path.is_file() {
        let (model, scaler) = load(config, &builder)?;
        (RunMode::Load, model, scaler, None)
    } else {
        let (model, scaler, report) = train(config, &builder)?;
        (RunMode::Train, model, scaler, Some(report))
    };

    let predictor = Predictor::new(builder, scaler, model)?;
    let predictions = predictor.predict(&records)?;

    save_predictions(&config.output_path, &predictions)?;

    Ok(RunSummary {
        mode,
        predictions,
        report,
    })
}
