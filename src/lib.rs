pub mod dataset;
pub mod error;
pub mod features;
pub mod gradient_descent;
pub mod model;
pub mod model_store;
pub mod normalizer;
pub mod pipeline;
pub mod plots;
pub mod predictor;

pub use error::{Error, Result};
