pub mod http;
pub mod types;

use crate::intake::SelectedImage;
use anyhow::Result;

pub use types::{BoundingBox, Detection, PredictResponse, ServiceHealth};

/// Remote inference backend.
pub trait Predictor {
    /// Where predictions are requested from, for logs and reports.
    fn endpoint(&self) -> String;
    fn health(&self) -> Result<ServiceHealth>;
    fn predict(&self, image: &SelectedImage) -> Result<PredictResponse>;
}
