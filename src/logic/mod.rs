//! Logic Module - prediction engine
//!
//! - `features/` - fixed feature layout and vector construction
//! - `model/` - classifier artifact and inference
//! - `explain/` - TreeSHAP attributions and the summary plot
//! - `predictor` - ties the above together for one request

pub mod explain;
pub mod features;
pub mod model;
pub mod predictor;

pub use predictor::{ModelStatus, PredictError, Prediction, Predictor, PredictorOptions};
