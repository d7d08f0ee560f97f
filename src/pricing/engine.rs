use crate::config::{PricingConfig, QuantityDiscountTier};
use crate::pricing::catalog::MaterialCatalog;
use crate::pricing::models::{
    BreakdownCategory, CostBreakdownLine, ModelAnalysis, OrderOptions, Quote, QuoteResult,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("calculation produced a non-finite {0}")]
    NonFinite(&'static str),
}

/// Rates and constants applied on top of catalog prices
#[derive(Debug, Clone, PartialEq)]
pub struct PricingRates {
    pub machine_rate_per_hour: f64,
    pub overhead_rate: f64,
    pub profit_margin_rate: f64,
    pub rush_multiplier: f64,
    pub complexity_baseline: f64,
    pub complexity_weight: f64,
    pub adjustment_line_threshold: f64,
    /// Sorted by descending threshold
    quantity_discounts: Vec<QuantityDiscountTier>,
}

impl PricingRates {
    pub fn new(config: &PricingConfig) -> Self {
        let mut quantity_discounts = config.quantity_discounts.clone();
        quantity_discounts.sort_by(|a, b| b.min_quantity.cmp(&a.min_quantity));

        Self {
            machine_rate_per_hour: config.machine_rate_per_hour,
            overhead_rate: config.overhead_rate,
            profit_margin_rate: config.profit_margin_rate,
            rush_multiplier: config.rush_multiplier,
            complexity_baseline: config.complexity_baseline,
            complexity_weight: config.complexity_weight,
            adjustment_line_threshold: config.adjustment_line_threshold,
            quantity_discounts,
        }
    }

    /// Stepped discount: the highest tier whose threshold the quantity reaches
    pub fn quantity_discount(&self, quantity: u32) -> f64 {
        self.quantity_discounts
            .iter()
            .find(|tier| quantity >= tier.min_quantity)
            .map(|tier| tier.rate)
            .unwrap_or(0.0)
    }
}

impl Default for PricingRates {
    fn default() -> Self {
        Self::new(&PricingConfig::default())
    }
}

/// Stateless quote calculator over an injected catalog and rate set
#[derive(Debug, Clone)]
pub struct PricingEngine {
    catalog: MaterialCatalog,
    rates: PricingRates,
}

impl PricingEngine {
    pub fn new(catalog: MaterialCatalog, rates: PricingRates) -> Self {
        Self { catalog, rates }
    }

    pub fn catalog(&self) -> &MaterialCatalog {
        &self.catalog
    }

    pub fn rates(&self) -> &PricingRates {
        &self.rates
    }

    /// Price a job. Input problems come back as [`QuoteResult::Failure`].
    pub fn calculate(
        &self,
        analysis: &ModelAnalysis,
        material_type: &str,
        options: OrderOptions,
    ) -> QuoteResult {
        match self.try_calculate(analysis, material_type, options) {
            Ok(quote) => QuoteResult::Success(quote),
            Err(e) => QuoteResult::Failure {
                error_message: format!("Pricing calculation failed: {}", e),
            },
        }
    }

    pub fn try_calculate(
        &self,
        analysis: &ModelAnalysis,
        material_type: &str,
        options: OrderOptions,
    ) -> Result<Quote, PricingError> {
        validate_inputs(analysis, material_type, options)?;

        let rates = &self.rates;
        let (profile, material_match) = self.catalog.resolve_detailed(material_type);
        let quantity = options.quantity as f64;

        let material_cost = analysis.filament_used_grams * profile.cost_per_gram;
        let time_cost = (analysis.print_time_minutes / 60.0)
            * rates.machine_rate_per_hour
            * profile.machine_multiplier;

        let complexity_factor = analysis.complexity_score / rates.complexity_baseline;
        let complexity_adjustment = time_cost * (complexity_factor - 1.0) * rates.complexity_weight;

        let quantity_discount = rates.quantity_discount(options.quantity);
        let rush_surcharge = if options.rush {
            time_cost * quantity * (rates.rush_multiplier - 1.0)
        } else {
            0.0
        };

        let base_cost = material_cost + time_cost + complexity_adjustment;
        let subtotal = base_cost * quantity * (1.0 - quantity_discount);
        let overhead_cost = subtotal * rates.overhead_rate;
        let subtotal_with_overhead = subtotal + overhead_cost + rush_surcharge;
        let profit_margin = subtotal_with_overhead * rates.profit_margin_rate;
        let total_cost = subtotal_with_overhead + profit_margin;

        if !total_cost.is_finite() {
            return Err(PricingError::NonFinite("total cost"));
        }

        let mut breakdown = vec![
            CostBreakdownLine::new(
                BreakdownCategory::Materials,
                format!("{} filament ({:.1}g)", material_type, analysis.filament_used_grams),
                options.quantity,
                material_cost,
            ),
            CostBreakdownLine::new(
                BreakdownCategory::Production,
                format!("Printing time ({:.1} hours)", analysis.print_time_minutes / 60.0),
                options.quantity,
                time_cost,
            ),
        ];

        if options.rush {
            breakdown.push(CostBreakdownLine::new(
                BreakdownCategory::Surcharges,
                "Rush order premium",
                1,
                rush_surcharge,
            ));
        }

        if complexity_adjustment.abs() > rates.adjustment_line_threshold {
            breakdown.push(CostBreakdownLine::new(
                BreakdownCategory::Adjustments,
                format!("Complexity {}/100", analysis.complexity_score),
                options.quantity,
                complexity_adjustment,
            ));
        }

        if quantity_discount > 0.0 {
            let discount_amount = base_cost * quantity * quantity_discount;
            breakdown.push(CostBreakdownLine::new(
                BreakdownCategory::Discounts,
                format!("Quantity discount ({}%)", (quantity_discount * 100.0).round()),
                1,
                -discount_amount,
            ));
        }

        debug!(
            material = %profile.key,
            ?material_match,
            quantity = options.quantity,
            rush = options.rush,
            total_cost,
            "Quote calculated"
        );

        Ok(Quote {
            material_key: profile.key.clone(),
            material_match,
            quantity: options.quantity,
            material_cost,
            time_cost,
            complexity_factor,
            complexity_adjustment,
            quantity_discount,
            rush_surcharge,
            base_cost,
            subtotal,
            overhead_cost,
            subtotal_with_overhead,
            profit_margin,
            total_cost,
            breakdown,
        })
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(MaterialCatalog::default(), PricingRates::default())
    }
}

fn validate_inputs(
    analysis: &ModelAnalysis,
    material_type: &str,
    options: OrderOptions,
) -> Result<(), PricingError> {
    if material_type.trim().is_empty() {
        return Err(PricingError::InvalidInput("material type is required".to_string()));
    }
    if options.quantity == 0 {
        return Err(PricingError::InvalidInput("quantity must be at least 1".to_string()));
    }

    for (name, value) in [
        ("filament_used_grams", analysis.filament_used_grams),
        ("print_time_minutes", analysis.print_time_minutes),
    ] {
        if !value.is_finite() {
            return Err(PricingError::InvalidInput(format!("{} is not a number", name)));
        }
        if value < 0.0 {
            return Err(PricingError::InvalidInput(format!("{} cannot be negative", name)));
        }
    }

    let score = analysis.complexity_score;
    if !score.is_finite() || !(0.0..=100.0).contains(&score) {
        return Err(PricingError::InvalidInput(format!(
            "complexity_score must be between 0 and 100, got {}",
            score
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::models::{round_currency, MaterialMatch};

    fn reference_analysis() -> ModelAnalysis {
        ModelAnalysis::for_pricing(50.0, 120.0, 65.0)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_reference_quote() {
        let engine = PricingEngine::default();
        let quote = engine
            .try_calculate(&reference_analysis(), "PLA", OrderOptions::default())
            .unwrap();

        assert_close(quote.material_cost, 2.5);
        assert_close(quote.time_cost, 10.0);
        assert_close(quote.complexity_factor, 1.3);
        assert_close(quote.complexity_adjustment, 0.6);
        assert_close(quote.base_cost, 13.1);
        assert_close(quote.subtotal, 13.1);
        assert_close(quote.overhead_cost, 1.31);
        assert_close(quote.subtotal_with_overhead, 14.41);
        assert_close(quote.profit_margin, 2.882);
        assert_close(quote.total_cost, 17.292);
        assert_eq!(round_currency(quote.total_cost), 17.29);
        assert_eq!(quote.material_match, MaterialMatch::Exact);
    }

    #[test]
    fn test_reference_breakdown_lines() {
        let engine = PricingEngine::default();
        let quote = engine
            .try_calculate(&reference_analysis(), "PLA", OrderOptions::default())
            .unwrap();

        let categories: Vec<BreakdownCategory> =
            quote.breakdown.iter().map(|l| l.category).collect();
        assert_eq!(
            categories,
            vec![
                BreakdownCategory::Materials,
                BreakdownCategory::Production,
                BreakdownCategory::Adjustments
            ]
        );
        assert_eq!(quote.breakdown[0].description, "PLA filament (50.0g)");
        assert_eq!(quote.breakdown[1].description, "Printing time (2.0 hours)");
        assert_eq!(quote.breakdown[2].description, "Complexity 65/100");
    }

    #[test]
    fn test_neutral_complexity_has_no_adjustment_line() {
        let engine = PricingEngine::default();
        let analysis = ModelAnalysis::for_pricing(50.0, 120.0, 50.0);
        let quote = engine.try_calculate(&analysis, "PLA", OrderOptions::default()).unwrap();

        assert_eq!(quote.complexity_adjustment, 0.0);
        assert!(quote
            .breakdown
            .iter()
            .all(|l| l.category != BreakdownCategory::Adjustments));
    }

    #[test]
    fn test_low_complexity_discounts_time_cost() {
        let engine = PricingEngine::default();
        let analysis = ModelAnalysis::for_pricing(50.0, 120.0, 10.0);
        let quote = engine.try_calculate(&analysis, "PLA", OrderOptions::default()).unwrap();

        // 10.00 * (0.2 - 1) * 0.2
        assert_close(quote.complexity_adjustment, -1.6);
        let line = quote
            .breakdown
            .iter()
            .find(|l| l.category == BreakdownCategory::Adjustments)
            .unwrap();
        assert_close(line.unit_price, -1.6);
    }

    #[test]
    fn test_quantity_discount_steps() {
        let rates = PricingRates::default();
        assert_eq!(rates.quantity_discount(1), 0.0);
        assert_eq!(rates.quantity_discount(4), 0.0);
        assert_eq!(rates.quantity_discount(5), 0.05);
        assert_eq!(rates.quantity_discount(9), 0.05);
        assert_eq!(rates.quantity_discount(10), 0.10);
        assert_eq!(rates.quantity_discount(250), 0.10);
    }

    #[test]
    fn test_discount_line() {
        let engine = PricingEngine::default();
        let options = OrderOptions {
            quantity: 10,
            rush: false,
        };
        let quote = engine.try_calculate(&reference_analysis(), "PLA", options).unwrap();

        assert_close(quote.subtotal, 13.1 * 10.0 * 0.9);
        let line = quote.breakdown.last().unwrap();
        assert_eq!(line.category, BreakdownCategory::Discounts);
        assert_eq!(line.description, "Quantity discount (10%)");
        assert_eq!(line.quantity, 1);
        assert_close(line.total, -13.1);
    }

    #[test]
    fn test_rush_surcharge_applies_to_time_cost_only() {
        let engine = PricingEngine::default();
        let options = OrderOptions { quantity: 3, rush: true };
        let quote = engine.try_calculate(&reference_analysis(), "PLA", options).unwrap();

        assert_close(quote.rush_surcharge, quote.time_cost * 3.0 * 0.5);
        assert_close(
            quote.subtotal_with_overhead,
            quote.subtotal + quote.overhead_cost + quote.rush_surcharge,
        );
        assert!(quote
            .breakdown
            .iter()
            .any(|l| {
                l.category == BreakdownCategory::Surcharges && l.description == "Rush order premium"
            }));
    }

    #[test]
    fn test_machine_multiplier_scales_time_cost() {
        let engine = PricingEngine::default();
        let quote = engine
            .try_calculate(&reference_analysis(), "TPU 95A", OrderOptions::default())
            .unwrap();

        assert_eq!(quote.material_key, "TPU");
        assert_eq!(quote.material_match, MaterialMatch::Substring);
        assert_close(quote.material_cost, 50.0 * 0.15);
        assert_close(quote.time_cost, 2.0 * 5.0 * 1.5);
    }

    #[test]
    fn test_invalid_inputs_become_failures() {
        let engine = PricingEngine::default();

        let nan = ModelAnalysis::for_pricing(f64::NAN, 120.0, 50.0);
        let result = engine.calculate(&nan, "PLA", OrderOptions::default());
        assert!(!result.is_success());
        assert!(result
            .error_message()
            .unwrap()
            .starts_with("Pricing calculation failed:"));

        let negative = ModelAnalysis::for_pricing(50.0, -1.0, 50.0);
        assert!(!engine.calculate(&negative, "PLA", OrderOptions::default()).is_success());

        let out_of_range = ModelAnalysis::for_pricing(50.0, 120.0, 150.0);
        assert!(!engine.calculate(&out_of_range, "PLA", OrderOptions::default()).is_success());

        let zero_quantity = OrderOptions { quantity: 0, rush: false };
        assert!(!engine.calculate(&reference_analysis(), "PLA", zero_quantity).is_success());

        assert!(!engine
            .calculate(&reference_analysis(), "  ", OrderOptions::default())
            .is_success());
    }

    #[test]
    fn test_custom_rates() {
        let config = PricingConfig {
            machine_rate_per_hour: 8.0,
            overhead_rate: 0.0,
            profit_margin_rate: 0.0,
            quantity_discounts: vec![],
            ..PricingConfig::default()
        };
        let engine = PricingEngine::new(MaterialCatalog::default(), PricingRates::new(&config));
        let analysis = ModelAnalysis::for_pricing(0.0, 60.0, 50.0);
        let quote = engine
            .try_calculate(&analysis, "PLA", OrderOptions { quantity: 20, rush: false })
            .unwrap();

        assert_close(quote.total_cost, 8.0 * 20.0);
        assert_eq!(quote.quantity_discount, 0.0);
    }
}
