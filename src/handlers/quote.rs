use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::analysis::SlicingParameters;
use crate::error::AppError;
use crate::handlers::AppState;
use crate::metrics;
use crate::pricing::{round_currency, ModelAnalysis, OrderOptions, QuoteResult, QuoteSummary};
use crate::uploads::UploadError;

/// Only this many validation problems are reported back
const MAX_REPORTED_ERRORS: usize = 3;

const DEFAULT_LAYER_HEIGHT: f64 = 0.2;
const DEFAULT_INFILL: u32 = 20;

/// Print settings pulled from a validated calculate request
#[derive(Debug, Clone, PartialEq)]
struct QuoteParameters {
    upload_id: String,
    material: Value,
    material_name: String,
    print_options: Value,
    slicing: SlicingParameters,
    options: OrderOptions,
}

/// Numbers may arrive as JSON numbers or numeric strings
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Check a calculate request body, returning at most three problems
fn validate_quote_request(body: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    match body.get("uploadId") {
        None => errors.push("Missing required field: uploadId".to_string()),
        Some(id) if is_empty_value(id) => {
            errors.push("Empty value for required field: uploadId".to_string())
        }
        Some(_) => {}
    }

    match body.get("configuration") {
        None => errors.push("Missing required field: configuration".to_string()),
        Some(config) => {
            match config.get("material") {
                None => errors.push("Missing required field: configuration.material".to_string()),
                Some(material) if is_empty_value(material) => {
                    errors.push(
                        "Empty value for required field: configuration.material".to_string(),
                    )
                }
                Some(_) => {}
            }

            if let Some(options) = config.get("printOptions") {
                if let Some(infill) = options.get("infillPercentage") {
                    match number(infill) {
                        Some(v) if (0.0..=100.0).contains(&v) => {}
                        Some(_) => {
                            let message = "Invalid infillPercentage: Must be between 0 and 100";
                            errors.push(message.to_string())
                        }
                        None => {
                            errors.push("Invalid infillPercentage: Must be a number".to_string())
                        }
                    }
                }
                if let Some(layer) = options.get("layerHeight") {
                    match number(layer) {
                        Some(v) if (0.05..=0.4).contains(&v) => {}
                        Some(_) => {
                            let message = "Invalid layerHeight: Must be between 0.05 and 0.4 mm";
                            errors.push(message.to_string())
                        }
                        None => errors.push("Invalid layerHeight: Must be a number".to_string()),
                    }
                }
            }

            if let Some(quantity) = config.get("quantity") {
                match integer(quantity) {
                    Some(q) if q >= 1 && q <= u32::MAX as i64 => {}
                    Some(_) => errors.push("Invalid quantity: Must be at least 1".to_string()),
                    None => errors.push("Invalid quantity: Must be an integer".to_string()),
                }
            }
        }
    }

    errors.truncate(MAX_REPORTED_ERRORS);
    errors
}

/// Pull typed parameters out of a body that passed validation
fn extract_parameters(body: &Value) -> QuoteParameters {
    let upload_id = match &body["uploadId"] {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };

    let config = &body["configuration"];
    let material = config["material"].clone();
    let material_name = match &material {
        Value::String(name) => name.clone(),
        other => other
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("PLA")
            .to_string(),
    };

    let print_options = match config.get("printOptions") {
        Some(options @ Value::Object(_)) => options.clone(),
        _ => json!({}),
    };

    let layer_height = print_options
        .get("layerHeight")
        .and_then(number)
        .unwrap_or(DEFAULT_LAYER_HEIGHT);
    let infill_percentage = print_options
        .get("infillPercentage")
        .and_then(number)
        .map(|v| v.round() as u32)
        .unwrap_or(DEFAULT_INFILL);
    let support_material = print_options
        .get("supportMaterial")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let rush = print_options
        .get("rushOrder")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let quantity = config
        .get("quantity")
        .and_then(integer)
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or(1);

    QuoteParameters {
        upload_id,
        slicing: SlicingParameters {
            layer_height,
            infill_percentage,
            material_type: material_name.clone(),
            support_material,
        },
        material,
        material_name,
        print_options,
        options: OrderOptions { quantity, rush },
    }
}

fn complexity_label(score: f64) -> &'static str {
    if score < 40.0 {
        "LOW"
    } else if score < 70.0 {
        "MEDIUM"
    } else {
        "HIGH"
    }
}

fn model_analysis_json(analysis: &ModelAnalysis) -> Value {
    json!({
        "volume": analysis.volume_cm3,
        "surfaceArea": analysis.surface_area_cm2,
        "boundingBox": {
            "x": analysis.bounding_box.x,
            "y": analysis.bounding_box.y,
            "z": analysis.bounding_box.z,
        },
        "layerCount": analysis.layer_count,
        "complexity": complexity_label(analysis.complexity_score),
        "complexityScore": analysis.complexity_score,
        "requiredSupports": analysis.requires_supports(),
        "estimatedMaterial": analysis.filament_used_grams,
        "estimatedPrintTime": analysis.print_time_minutes,
    })
}

fn record_outcome(material: &str, result: &QuoteResult) {
    match result {
        QuoteResult::Success(quote) => {
            metrics::record_quote(&quote.material_key, "success");
            metrics::record_quote_cost(&quote.material_key, quote.total_cost);
        }
        QuoteResult::Failure { .. } => metrics::record_quote(material, "failure"),
    }
}

/// Handle POST /api/v1/quote/calculate
///
/// Resolves the upload, runs model analysis, prices the job and stores the
/// quote so checkout can refer to it by id.
pub async fn calculate_quote(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = payload?;

    let errors = validate_quote_request(&body);
    if !errors.is_empty() {
        return Err(AppError::validation("Invalid quote request", errors));
    }
    let params = extract_parameters(&body);

    let path = state.uploads.resolve(&params.upload_id).await.map_err(|e| match e {
        UploadError::NotFound(_) | UploadError::InvalidId(_) => {
            AppError::validation(e.to_string(), vec![e.to_string()])
        }
        other => other.into(),
    })?;

    let analysis = state.analyzer.analyze(&path, &params.slicing).await.map_err(|e| {
        warn!(
            upload_id = %params.upload_id,
            analyzer = state.analyzer.name(),
            error = %e,
            "Model analysis failed"
        );
        metrics::record_quote(&params.material_name, "failure");
        AppError::from(e)
    })?;

    let engine = state.engine.load();
    let result = engine.calculate(&analysis, &params.material_name, params.options);
    record_outcome(&params.material_name, &result);

    let quote = result.into_result().map_err(AppError::Unprocessable)?;

    let config = state.config.load();
    let now = Utc::now();
    let stored = state.quotes.insert(&quote, &config.pricing.currency, now);

    info!(
        quote_id = %stored.id,
        upload_id = %params.upload_id,
        material = %quote.material_key,
        material_match = ?quote.material_match,
        quantity = quote.quantity,
        total_cost = round_currency(quote.total_cost),
        "Quote calculated"
    );

    let breakdown: Vec<_> = quote.breakdown.iter().map(|line| line.rounded()).collect();
    let quantity_discount_amount =
        quote.base_cost * f64::from(quote.quantity) * quote.quantity_discount;

    Ok((
        StatusCode::OK,
        Json(json!({
            "id": stored.id,
            "success": true,
            "timestamp": now.to_rfc3339(),
            "valid_until": stored.valid_until.to_rfc3339(),
            "material": params.material,
            "resolvedMaterial": quote.material_key,
            "printOptions": params.print_options,
            "quantity": quote.quantity,
            "modelAnalysis": model_analysis_json(&analysis),
            "calculation": {
                "materialCost": round_currency(quote.material_cost),
                "laborCost": round_currency(quote.time_cost),
                "machineTime": analysis.print_time_minutes,
                "complexityAdjustment": round_currency(quote.complexity_adjustment),
                "setupCost": round_currency(quote.overhead_cost),
                "rushOrderSurcharge": round_currency(quote.rush_surcharge),
                "quantityDiscount": round_currency(quantity_discount_amount),
                "profitMargin": round_currency(quote.profit_margin),
                "subtotal": round_currency(quote.subtotal),
                "total": round_currency(quote.total_cost),
                "currency": stored.currency,
                "estimatedDelivery": (now + Duration::days(7)).to_rfc3339(),
                "breakdown": breakdown,
            },
            "status": "DRAFT",
            "createdAt": now.to_rfc3339(),
        })),
    ))
}

fn default_material_type() -> String {
    "PLA".to_string()
}

/// Analysis metrics supplied directly, skipping upload and slicing
#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    #[serde(default = "default_material_type")]
    pub material_type: String,
    pub filament_used_grams: Option<f64>,
    pub print_time_minutes: Option<f64>,
    pub complexity_score: Option<f64>,
    pub quantity: Option<u32>,
    pub rush_order: Option<bool>,
}

impl EstimateRequest {
    fn analysis(&self) -> ModelAnalysis {
        ModelAnalysis::for_pricing(
            self.filament_used_grams.unwrap_or(50.0),
            self.print_time_minutes.unwrap_or(120.0),
            self.complexity_score.unwrap_or(50.0),
        )
    }

    fn options(&self) -> OrderOptions {
        OrderOptions {
            quantity: self.quantity.unwrap_or(1),
            rush: self.rush_order.unwrap_or(false),
        }
    }
}

/// Handle POST /api/v1/quote/estimate
///
/// Every failure, including an unreadable body, answers with a
/// `QuoteSummary` carrying `error_message`.
pub async fn estimate_quote(
    State(state): State<AppState>,
    payload: Result<Json<EstimateRequest>, JsonRejection>,
) -> (StatusCode, Json<QuoteSummary>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            metrics::record_quote("unknown", "failure");
            let summary = QuoteSummary::failure(format!(
                "Invalid estimate request: {}",
                rejection.body_text()
            ));
            return (StatusCode::BAD_REQUEST, Json(summary));
        }
    };

    let engine = state.engine.load();
    let result = engine.calculate(&request.analysis(), &request.material_type, request.options());
    record_outcome(&request.material_type, &result);

    let status = if result.is_success() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };

    (status, Json(QuoteSummary::from(&result)))
}
