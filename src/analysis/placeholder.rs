use crate::analysis::{AnalysisError, ModelAnalyzer, SlicingParameters};
use crate::config::AnalysisConfig;
use crate::pricing::{BoundingBox, ModelAnalysis};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Stand-in for a slicer engine.
///
/// Confirms the file exists and reports the same metrics for every model:
/// a two hour, 50 g print of medium complexity.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderSlicer {
    simulated_latency: Duration,
}

impl PlaceholderSlicer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            simulated_latency: Duration::from_millis(config.simulated_latency_ms),
        }
    }

    fn metrics(params: &SlicingParameters) -> ModelAnalysis {
        ModelAnalysis {
            volume_cm3: 40.0,
            surface_area_cm2: 0.0,
            bounding_box: BoundingBox {
                x: 100.0,
                y: 100.0,
                z: 50.0,
            },
            filament_used_grams: 50.0,
            print_time_minutes: 120.0,
            support_volume_cm3: if params.support_material { 5.0 } else { 0.0 },
            layer_count: 200,
            complexity_score: 65.0,
        }
    }
}

#[async_trait]
impl ModelAnalyzer for PlaceholderSlicer {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn analyze(
        &self,
        path: &Path,
        params: &SlicingParameters,
    ) -> Result<ModelAnalysis, AnalysisError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(AnalysisError::FileNotFound(path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnalysisError::FileNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(AnalysisError::Processing(e.to_string())),
        }

        debug!(
            path = %path.display(),
            layer_height = params.layer_height,
            infill = params.infill_percentage,
            "Slicing model"
        );

        if !self.simulated_latency.is_zero() {
            tokio::time::sleep(self.simulated_latency).await;
        }

        let analysis = Self::metrics(params);
        info!(
            path = %path.display(),
            print_time_minutes = analysis.print_time_minutes,
            filament_used_grams = analysis.filament_used_grams,
            "Model analysis complete"
        );
        Ok(analysis)
    }
}
