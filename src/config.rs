use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pricing: PricingConfig,
    pub materials: MaterialsConfig,
    pub uploads: UploadConfig,
    pub analysis: AnalysisConfig,
    pub payment: PaymentConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// `json` or `pretty`
    pub log_format: String,
    pub cors_allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            max_body_bytes: 100 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PricingConfig {
    pub machine_rate_per_hour: f64,
    pub overhead_rate: f64,
    pub profit_margin_rate: f64,
    pub rush_multiplier: f64,
    /// Complexity score treated as neutral
    pub complexity_baseline: f64,
    /// Fraction of time cost swung per unit of complexity deviation
    pub complexity_weight: f64,
    /// Adjustments smaller than this (absolute) are left out of the breakdown
    pub adjustment_line_threshold: f64,
    pub currency: String,
    pub quote_validity_hours: i64,
    /// Highest matching `min_quantity` wins
    pub quantity_discounts: Vec<QuantityDiscountTier>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            machine_rate_per_hour: 5.0,
            overhead_rate: 0.10,
            profit_margin_rate: 0.20,
            rush_multiplier: 1.5,
            complexity_baseline: 50.0,
            complexity_weight: 0.2,
            adjustment_line_threshold: 0.5,
            quantity_discounts: vec![
                QuantityDiscountTier {
                    min_quantity: 10,
                    rate: 0.10,
                },
                QuantityDiscountTier {
                    min_quantity: 5,
                    rate: 0.05,
                },
            ],
            currency: "USD".to_string(),
            quote_validity_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct QuantityDiscountTier {
    pub min_quantity: u32,
    pub rate: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MaterialsConfig {
    pub default_material: String,
    /// Resolution order for substring matching follows this list
    pub catalog: Vec<MaterialConfig>,
}

impl Default for MaterialsConfig {
    fn default() -> Self {
        Self {
            default_material: "PLA".to_string(),
            catalog: vec![
                MaterialConfig::new("PLA", "PLA Basic", 0.05, 1.24, 1.0),
                MaterialConfig::new("ABS", "ABS", 0.07, 1.04, 1.2),
                MaterialConfig::new("PETG", "PETG", 0.08, 1.27, 1.15),
                MaterialConfig::new("TPU", "TPU Flexible", 0.15, 1.21, 1.5),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MaterialConfig {
    pub key: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub cost_per_gram: f64,
    pub density: f64,
    #[serde(default = "default_machine_multiplier")]
    pub machine_multiplier: f64,
    #[serde(default = "default_true")]
    pub available: bool,
}

impl MaterialConfig {
    fn new(
        key: &str,
        display_name: &str,
        cost_per_gram: f64,
        density: f64,
        machine_multiplier: f64,
    ) -> Self {
        Self {
            key: key.to_string(),
            display_name: Some(display_name.to_string()),
            cost_per_gram,
            density,
            machine_multiplier,
            available: true,
        }
    }
}

fn default_machine_multiplier() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    pub directory: String,
    pub max_file_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub max_age_hours: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            directory: "uploads".to_string(),
            max_file_size_bytes: 100 * 1024 * 1024,
            allowed_extensions: vec![".stl".to_string(), ".obj".to_string(), ".ply".to_string()],
            max_age_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Artificial delay applied by the placeholder slicer
    pub simulated_latency_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    #[default]
    Sandbox,
    Paypal,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub provider: PaymentProvider,
    /// Settled orders (completed, denied, refunded) are dropped from the
    /// ledger this long after their last update; receipts go with them
    pub order_retention_hours: i64,
    pub paypal: PayPalConfig,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            provider: PaymentProvider::default(),
            order_retention_hours: 168,
            paypal: PayPalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Empty disables webhook header verification
    pub webhook_id: String,
    pub sandbox: bool,
    /// Overrides the sandbox/live URL when set
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
    pub brand_name: String,
    pub return_url: String,
    pub cancel_url: String,
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            webhook_id: String::new(),
            sandbox: true,
            base_url: None,
            timeout_seconds: 30,
            brand_name: "3D Print Quoting Service".to_string(),
            return_url: "http://localhost:3000/payment/success".to_string(),
            cancel_url: "http://localhost:3000/payment/cancel".to_string(),
        }
    }
}

impl PayPalConfig {
    pub fn api_base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.sandbox => "https://api.sandbox.paypal.com",
            None => "https://api.paypal.com",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "/metrics".to_string(),
        }
    }
}

/// Load configuration from an optional TOML file layered under
/// `PRINT_QUOTE__*` environment variables.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("PRINT_QUOTE").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    let pricing = &cfg.pricing;

    if !(pricing.machine_rate_per_hour.is_finite() && pricing.machine_rate_per_hour >= 0.0) {
        anyhow::bail!("pricing.machine_rate_per_hour must be a non-negative number");
    }
    for (name, rate) in [
        ("overhead_rate", pricing.overhead_rate),
        ("profit_margin_rate", pricing.profit_margin_rate),
        ("complexity_weight", pricing.complexity_weight),
    ] {
        if !(rate.is_finite() && rate >= 0.0) {
            anyhow::bail!("pricing.{} must be a non-negative number", name);
        }
    }
    if !(pricing.rush_multiplier.is_finite() && pricing.rush_multiplier >= 1.0) {
        anyhow::bail!("pricing.rush_multiplier must be at least 1.0");
    }
    if !(pricing.complexity_baseline.is_finite() && pricing.complexity_baseline > 0.0) {
        anyhow::bail!("pricing.complexity_baseline must be positive");
    }
    for tier in &pricing.quantity_discounts {
        if tier.min_quantity == 0 {
            anyhow::bail!("Quantity discount tiers must start at quantity 1 or above");
        }
        if !(0.0..1.0).contains(&tier.rate) {
            anyhow::bail!(
                "Quantity discount for {}+ units must be in [0, 1), got {}",
                tier.min_quantity,
                tier.rate
            );
        }
    }
    if pricing.quote_validity_hours <= 0 {
        anyhow::bail!("pricing.quote_validity_hours must be positive");
    }
    if cfg.payment.order_retention_hours <= 0 {
        anyhow::bail!("payment.order_retention_hours must be positive");
    }

    if cfg.materials.catalog.is_empty() {
        anyhow::bail!("At least one material must be configured");
    }
    let mut seen = HashSet::new();
    for material in &cfg.materials.catalog {
        let key = material.key.trim().to_uppercase();
        if key.is_empty() {
            anyhow::bail!("Material key cannot be empty");
        }
        if !seen.insert(key.clone()) {
            anyhow::bail!("Duplicate material key: {}", key);
        }
        if !(material.cost_per_gram.is_finite() && material.cost_per_gram > 0.0) {
            anyhow::bail!("Material '{}' must have a positive cost_per_gram", key);
        }
        if !(material.machine_multiplier.is_finite() && material.machine_multiplier >= 0.0) {
            anyhow::bail!("Material '{}' must have a non-negative machine_multiplier", key);
        }
    }
    if !seen.contains(&cfg.materials.default_material.trim().to_uppercase()) {
        anyhow::bail!(
            "Default material '{}' is not in the catalog",
            cfg.materials.default_material
        );
    }

    if cfg.uploads.allowed_extensions.is_empty() {
        anyhow::bail!("At least one upload extension must be allowed");
    }

    match cfg.server.log_format.as_str() {
        "json" | "pretty" => {}
        other => anyhow::bail!("Invalid log_format '{}', expected 'json' or 'pretty'", other),
    }

    if cfg.payment.provider == PaymentProvider::Paypal {
        if cfg.payment.paypal.client_id.is_empty() {
            anyhow::bail!("PayPal client ID is required when payment.provider = \"paypal\"");
        }
        if cfg.payment.paypal.client_secret.is_empty() {
            anyhow::bail!("PayPal client secret is required when payment.provider = \"paypal\"");
        }
    }

    Ok(())
}
