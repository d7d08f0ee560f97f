use serde::{Deserialize, Serialize};

/// Catalog entry for a printable material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProfile {
    pub key: String,
    pub display_name: String,
    pub cost_per_gram: f64,
    /// g/cm³
    pub density: f64,
    pub machine_multiplier: f64,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Printability metrics produced by a model analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAnalysis {
    pub volume_cm3: f64,
    pub surface_area_cm2: f64,
    /// Millimetres
    pub bounding_box: BoundingBox,
    pub filament_used_grams: f64,
    pub print_time_minutes: f64,
    pub support_volume_cm3: f64,
    pub layer_count: u32,
    /// 0-100, 50 is neutral
    pub complexity_score: f64,
}

impl ModelAnalysis {
    /// Analysis carrying only the metrics pricing reads
    pub fn for_pricing(
        filament_used_grams: f64,
        print_time_minutes: f64,
        complexity_score: f64,
    ) -> Self {
        Self {
            volume_cm3: 0.0,
            surface_area_cm2: 0.0,
            bounding_box: BoundingBox::default(),
            filament_used_grams,
            print_time_minutes,
            support_volume_cm3: 0.0,
            layer_count: 0,
            complexity_score,
        }
    }

    pub fn requires_supports(&self) -> bool {
        self.support_volume_cm3 > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOptions {
    pub quantity: u32,
    pub rush: bool,
}

impl Default for OrderOptions {
    fn default() -> Self {
        Self {
            quantity: 1,
            rush: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakdownCategory {
    Materials,
    Production,
    Surcharges,
    Adjustments,
    Discounts,
}

/// One itemized line of a quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdownLine {
    pub category: BreakdownCategory,
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total: f64,
}

impl CostBreakdownLine {
    pub fn new(
        category: BreakdownCategory,
        description: impl Into<String>,
        quantity: u32,
        unit_price: f64,
    ) -> Self {
        Self {
            category,
            description: description.into(),
            quantity,
            unit_price,
            total: unit_price * quantity as f64,
        }
    }

    /// Copy with monetary fields rounded for display
    pub fn rounded(&self) -> Self {
        Self {
            unit_price: round_currency(self.unit_price),
            total: round_currency(self.total),
            ..self.clone()
        }
    }
}

/// How a free-text material label was mapped onto the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialMatch {
    Exact,
    Substring,
    /// Nothing matched; the catalog default was used
    Default,
}

/// A successful price calculation. Values are unrounded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub material_key: String,
    pub material_match: MaterialMatch,
    pub quantity: u32,
    pub material_cost: f64,
    pub time_cost: f64,
    pub complexity_factor: f64,
    pub complexity_adjustment: f64,
    pub quantity_discount: f64,
    pub rush_surcharge: f64,
    pub base_cost: f64,
    pub subtotal: f64,
    pub overhead_cost: f64,
    pub subtotal_with_overhead: f64,
    pub profit_margin: f64,
    pub total_cost: f64,
    pub breakdown: Vec<CostBreakdownLine>,
}

/// Outcome of [`PricingEngine::calculate`](super::PricingEngine::calculate)
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteResult {
    Success(Quote),
    Failure { error_message: String },
}

impl QuoteResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn quote(&self) -> Option<&Quote> {
        match self {
            Self::Success(quote) => Some(quote),
            Self::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error_message } => Some(error_message),
        }
    }

    pub fn into_result(self) -> Result<Quote, String> {
        match self {
            Self::Success(quote) => Ok(quote),
            Self::Failure { error_message } => Err(error_message),
        }
    }
}

/// Wire form of a [`QuoteResult`], rounded to cents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity_adjustment: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overhead_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_margin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<CostBreakdownLine>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&QuoteResult> for QuoteSummary {
    fn from(result: &QuoteResult) -> Self {
        match result {
            QuoteResult::Success(quote) => Self {
                success: true,
                material_cost: Some(round_currency(quote.material_cost)),
                time_cost: Some(round_currency(quote.time_cost)),
                complexity_adjustment: Some(round_currency(quote.complexity_adjustment)),
                overhead_cost: Some(round_currency(quote.overhead_cost)),
                profit_margin: Some(round_currency(quote.profit_margin)),
                subtotal: Some(round_currency(quote.subtotal)),
                total_cost: Some(round_currency(quote.total_cost)),
                breakdown: Some(quote.breakdown.iter().map(CostBreakdownLine::rounded).collect()),
                error_message: None,
            },
            QuoteResult::Failure { error_message } => Self::failure(error_message.clone()),
        }
    }
}

impl QuoteSummary {
    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            material_cost: None,
            time_cost: None,
            complexity_adjustment: None,
            overhead_cost: None,
            profit_margin: None,
            subtotal: None,
            total_cost: None,
            breakdown: None,
            error_message: Some(error_message.into()),
        }
    }
}

/// Round a monetary amount to two decimal places
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_currency() {
        assert_eq!(round_currency(2.882), 2.88);
        assert_eq!(round_currency(17.292), 17.29);
        assert_eq!(round_currency(-0.456), -0.46);
        assert_eq!(round_currency(10.0), 10.0);
    }

    #[test]
    fn test_breakdown_line_serializes_camel_case() {
        let line =
            CostBreakdownLine::new(BreakdownCategory::Materials, "PLA filament (50.0g)", 2, 2.5);
        let json = serde_json::to_value(&line).unwrap();

        assert_eq!(json["category"], "Materials");
        assert_eq!(json["unitPrice"], 2.5);
        assert_eq!(json["total"], 5.0);
        assert_eq!(json["quantity"], 2);
    }

    #[test]
    fn test_failure_summary_omits_amounts() {
        let result = QuoteResult::Failure {
            error_message: "Pricing calculation failed: bad input".to_string(),
        };
        let json = serde_json::to_value(QuoteSummary::from(&result)).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["error_message"], "Pricing calculation failed: bad input");
        assert!(json.get("total_cost").is_none());
    }
}
