//! Batch gradient descent with AdaGrad step sizes and an L2 penalty on the weights.

use ndarray::{Array1, Array2, Zip};

use crate::error::{Error, Result};
use crate::model::LinearModel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    /// L2 penalty on the weights, the bias is not penalized.
    pub lambda: f64,
    pub initial_weight: f64,
    /// Starting value of the squared gradient sums, keeps the first step finite.
    pub accumulator_init: f64,
    /// RMSE is logged and recorded every `report_every` iterations.
    pub report_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            lambda: 1e-4,
            initial_weight: 1.,
            accumulator_init: 1e-20,
            report_every: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plateau {
    /// Smallest RMSE drop between two reports that still counts as progress.
    pub tolerance: f64,
    /// Reports without progress tolerated before stopping.
    pub patience: usize,
}

/// Training stops on whichever condition is met first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoppingPolicy {
    pub max_iterations: usize,
    pub gradient_tolerance: Option<f64>,
    pub plateau: Option<Plateau>,
}

impl Default for StoppingPolicy {
    fn default() -> Self {
        Self::fixed(100_000)
    }
}

impl StoppingPolicy {
    pub fn fixed(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            gradient_tolerance: None,
            plateau: None,
        }
    }

    pub fn with_gradient_tolerance(mut self, tolerance: f64) -> Self {
        self.gradient_tolerance = Some(tolerance);
        self
    }

    pub fn with_plateau(mut self, tolerance: f64, patience: usize) -> Self {
        self.plateau = Some(Plateau {
            tolerance,
            patience,
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxIterations,
    GradientNorm,
    LossPlateau,
}

#[derive(Debug, Clone)]
pub struct FitReport {
    /// Parameter updates applied.
    pub iterations: usize,
    pub stop_reason: StopReason,
    /// `(iteration, rmse)` recorded every `report_every` iterations.
    pub loss_history: Vec<(usize, f64)>,
    pub final_rmse: f64,
}

fn rmse(error: &Array1<f64>) -> f64 {
    error.mapv(|e| e * e).mean().unwrap_or_default().sqrt()
}

#[derive(Debug, Clone, Default)]
pub struct GradientDescent {
    pub config: TrainingConfig,
    pub stopping: StoppingPolicy,
}

impl GradientDescent {
    pub fn new(config: TrainingConfig, stopping: StoppingPolicy) -> Self {
        Self { config, stopping }
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(LinearModel, FitReport)> {
        let (n, m) = x.dim();

        if n == 0 {
            return Err(Error::shape("training rows", "at least 1", 0));
        }

        if y.len() != n {
            return Err(Error::shape("training labels", n, y.len()));
        }

        if let Some(Plateau { patience: 0, .. }) = self.stopping.plateau {
            return Err(Error::InvalidConfig(
                "plateau patience must be at least one report".into(),
            ));
        }

        let TrainingConfig {
            learning_rate: lr,
            lambda,
            initial_weight,
            accumulator_init,
            report_every,
        } = self.config;

        let mut w = Array1::from_elem(m, initial_weight);
        let mut b = 0.;

        let mut w_acc = Array1::from_elem(m, accumulator_init);
        let mut b_acc = accumulator_init;

        let mut loss_history = Vec::new();
        let mut last_rmse: Option<f64> = None;
        let mut stale_reports = 0;

        let mut iterations = 0;
        let mut stop_reason = StopReason::MaxIterations;

        for i in 0..self.stopping.max_iterations {
            let error = y - &(x.dot(&w) + b);

            let w_grad = -2. * error.dot(x) + 2. * lambda * &w;
            let b_grad = -2. * error.sum();

            if let Some(tolerance) = self.stopping.gradient_tolerance {
                let norm = (w_grad.dot(&w_grad) + b_grad * b_grad).sqrt();

                if norm < tolerance {
                    log::info!(
                        "gradient norm {:.3e} below {:.3e} after {} iterations",
                        norm,
                        tolerance,
                        i
                    );
                    stop_reason = StopReason::GradientNorm;
                    break;
                }
            }

            Zip::from(&mut w_acc).and(&w_grad).for_each(|acc, &g| *acc += g * g);
            b_acc += b_grad * b_grad;

            Zip::from(&mut w)
                .and(&w_grad)
                .and(&w_acc)
                .for_each(|w, &g, &acc| *w -= lr / acc.sqrt() * g);
            b -= lr / b_acc.sqrt() * b_grad;

            iterations = i + 1;

            if report_every > 0 && iterations % report_every == 0 {
                let loss = rmse(&error);

                log::info!("iterations = {}", iterations);
                log::info!("RMSE Loss = {:.6}", loss);

                loss_history.push((iterations, loss));

                if let Some(Plateau { tolerance, patience }) = self.stopping.plateau {
                    match last_rmse {
                        Some(last) if last - loss < tolerance => stale_reports += 1,
                        _ => stale_reports = 0,
                    }

                    last_rmse = Some(loss);

                    if stale_reports >= patience {
                        log::info!(
                            "RMSE plateaued at {:.6} after {} iterations",
                            loss,
                            iterations
                        );
                        stop_reason = StopReason::LossPlateau;
                        break;
                    }
                }
            }
        }

        let model = LinearModel::new(w, b);
        let final_rmse = rmse(&(y - &model.predict(x)?));

        log::debug!(
            "training finished: {:?} after {} iterations, rmse {}",
            stop_reason,
            iterations,
            final_rmse
        );

        Ok((
            model,
            FitReport {
                iterations,
                stop_reason,
                loss_history,
                final_rmse,
            },
        ))
    }
}
