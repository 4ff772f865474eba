use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use pm25_regression::dataset::MissingValuePolicy;
use pm25_regression::gradient_descent::{StoppingPolicy, TrainingConfig};
use pm25_regression::pipeline::{self, PipelineConfig, RunMode};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "PM2.5 forecasting with AdaGrad linear regression",
    long_about = None
)]
struct Args {
    /// Test records csv
    test_path: PathBuf,

    /// Where to write the `id,value` predictions
    output_path: PathBuf,

    #[clap(long, default_value = pipeline::DEFAULT_TRAIN_PATH)]
    train_path: PathBuf,

    #[clap(long, default_value = pipeline::DEFAULT_MODEL_PATH)]
    model_path: PathBuf,

    /// Train even if the model file already exists
    #[clap(long)]
    retrain: bool,

    #[clap(long, default_value_t = 0.5)]
    learning_rate: f64,

    #[clap(long, default_value_t = 1e-4)]
    lambda: f64,

    #[clap(long, default_value_t = 100_000)]
    max_iterations: usize,

    /// Stop once the gradient norm drops below this value
    #[clap(long)]
    gradient_tolerance: Option<f64>,

    /// Stop once the RMSE improves by less than this value between reports
    #[clap(long)]
    plateau_tolerance: Option<f64>,

    #[clap(long, default_value_t = 3)]
    plateau_patience: usize,

    /// Map every unparsable reading to zero instead of failing
    #[clap(long)]
    lenient: bool,

    /// Render the training RMSE history to this svg file
    #[clap(long)]
    loss_plot: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();

    let mut stopping = StoppingPolicy::fixed(args.max_iterations);
    if let Some(tolerance) = args.gradient_tolerance {
        stopping = stopping.with_gradient_tolerance(tolerance);
    }
    if let Some(tolerance) = args.plateau_tolerance {
        stopping = stopping.with_plateau(tolerance, args.plateau_patience);
    }

    let config = PipelineConfig {
        train_path: args.train_path,
        model_path: args.model_path,
        retrain: args.retrain,
        loss_plot: args.loss_plot,
        missing_values: if args.lenient {
            MissingValuePolicy::ZeroFillMalformed
        } else {
            MissingValuePolicy::ZeroFill
        },
        training: TrainingConfig {
            learning_rate: args.learning_rate,
            lambda: args.lambda,
            ..TrainingConfig::default()
        },
        stopping,
        ..PipelineConfig::new(&args.test_path, &args.output_path)
    };

    let summary = pipeline::run(&config).with_context(|| {
        format!(
            "failed to predict {} into {}",
            config.test_path.display(),
            config.output_path.display()
        )
    })?;

    match summary.mode {
        RunMode::Train => log::info!("model trained and saved to {}", config.model_path.display()),
        RunMode::Load => log::info!("used existing model {}", config.model_path.display()),
    }

    log::info!("{} predictions done", summary.predictions.len());

    Ok(())
}
