//! Model analysis providers
//!
//! A [`ModelAnalyzer`] turns a stored model file into the printability metrics
//! the pricing engine consumes. Pricing never looks at file bytes; it trusts
//! whatever the analyzer reports.

mod fixed;
mod placeholder;

pub use fixed::FixedAnalyzer;
pub use placeholder::PlaceholderSlicer;

use crate::pricing::ModelAnalysis;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Print settings forwarded to the slicer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlicingParameters {
    /// Millimetres
    pub layer_height: f64,
    pub infill_percentage: u32,
    pub material_type: String,
    pub support_material: bool,
}

impl Default for SlicingParameters {
    fn default() -> Self {
        Self {
            layer_height: 0.2,
            infill_percentage: 20,
            material_type: "PLA".to_string(),
            support_material: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("STL file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Error processing STL file: {0}")]
    Processing(String),
}

#[async_trait]
pub trait ModelAnalyzer: Send + Sync + 'static {
    /// Short identifier used in logs and metrics
    fn name(&self) -> &str;

    /// Analyze a model file. Failures are final; callers do not retry.
    async fn analyze(
        &self,
        path: &Path,
        params: &SlicingParameters,
    ) -> Result<ModelAnalysis, AnalysisError>;
}
