use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder.
/// Fails if a recorder is already installed (e.g. a second server in one process).
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!("quotes_total", "Quote calculations by material and outcome");
    describe_histogram!("quote_total_cost", "Total cost of successful quotes");
    describe_counter!("uploads_total", "Model uploads by outcome");
    describe_counter!("payments_total", "Payment gateway operations by outcome");
    describe_gauge!("print_quote_info", "Service version information");

    gauge!("print_quote_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record a quote calculation. `outcome` is `success` or `failure`.
pub fn record_quote(material: &str, outcome: &str) {
    counter!(
        "quotes_total",
        "material" => material.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);
}

pub fn record_quote_cost(material: &str, total_cost: f64) {
    histogram!("quote_total_cost", "material" => material.to_string()).record(total_cost);
}

pub fn record_upload(outcome: &str) {
    counter!("uploads_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a gateway call. `operation` is `create`, `capture`, `get` or `webhook`.
pub fn record_payment(operation: &str, outcome: &str) {
    counter!(
        "payments_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_record_metrics() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            init_metric_descriptions();
            record_quote("PLA", "success");
            record_quote_cost("PLA", 17.29);
            record_upload("success");
            record_payment("create", "failure");
        });

        let rendered = handle.render();
        assert!(rendered.contains("quotes_total{material=\"PLA\",outcome=\"success\"} 1"));
        assert!(rendered.contains("uploads_total{outcome=\"success\"} 1"));
        assert!(rendered.contains("payments_total{operation=\"create\",outcome=\"failure\"} 1"));
        assert!(rendered.contains("quote_total_cost"));
    }
}
