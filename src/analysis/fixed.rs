use crate::analysis::{AnalysisError, ModelAnalyzer, SlicingParameters};
use crate::pricing::ModelAnalysis;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Analyzer returning a preset result, recording every request.
/// Used where tests must not depend on a slicer.
#[derive(Debug)]
pub struct FixedAnalyzer {
    outcome: Result<ModelAnalysis, String>,
    calls: Mutex<Vec<(PathBuf, SlicingParameters)>>,
}

impl FixedAnalyzer {
    pub fn new(analysis: ModelAnalysis) -> Self {
        Self {
            outcome: Ok(analysis),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Analyzer that fails every request with the given reason
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(reason.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(PathBuf, SlicingParameters)> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ModelAnalyzer for FixedAnalyzer {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn analyze(
        &self,
        path: &Path,
        params: &SlicingParameters,
    ) -> Result<ModelAnalysis, AnalysisError> {
        match self.calls.lock() {
            Ok(mut calls) => calls.push((path.to_path_buf(), params.clone())),
            Err(poisoned) => poisoned.into_inner().push((path.to_path_buf(), params.clone())),
        }

        self.outcome.clone().map_err(AnalysisError::Processing)
    }
}
