use anyhow::Result;
use colored::Colorize;
use print_quote::config::{self, Config, PaymentProvider};
use print_quote::logging::mask_secret;
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the current configuration with secrets masked
pub fn show(path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!(path = %path.display(), "Loading configuration for display");

    let cfg = config::load_config(path)?;
    let sanitized = sanitize_secrets(&cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&sanitized)?;
    println!("{}", toml_string);

    Ok(())
}

/// Execute the config validate command
pub fn validate(path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());

    if !path.exists() {
        println!(
            "{}",
            format!("  {} not found, using defaults and environment", path.display()).yellow()
        );
    }

    let cfg = config::load_config(path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  Listen: {}:{}", cfg.server.host, cfg.server.port);
    println!(
        "  Materials: {} (default {})",
        cfg.materials.catalog.len(),
        cfg.materials.default_material
    );
    println!("  Discount tiers: {}", cfg.pricing.quantity_discounts.len());
    println!("  Payment provider: {}", provider_name(&cfg));
    println!("  Upload directory: {}", cfg.uploads.directory);

    info!("Configuration validation successful");
    Ok(())
}

fn provider_name(cfg: &Config) -> &'static str {
    match cfg.payment.provider {
        PaymentProvider::Sandbox => "sandbox",
        PaymentProvider::Paypal if cfg.payment.paypal.sandbox => "paypal (sandbox)",
        PaymentProvider::Paypal => "paypal (live)",
    }
}

/// Mask payment credentials for safe display
fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();
    let paypal = &mut sanitized.payment.paypal;

    paypal.client_id = mask_secret(&paypal.client_id);
    paypal.client_secret = mask_secret(&paypal.client_secret);
    paypal.webhook_id = mask_secret(&paypal.webhook_id);

    sanitized
}
