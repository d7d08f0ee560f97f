use anyhow::{bail, Result};
use colored::Colorize;
use print_quote::config;
use print_quote::pricing::{
    self, round_currency, MaterialMatch, ModelAnalysis, OrderOptions, Quote, QuoteSummary,
};
use std::path::Path;

/// Inputs for an offline quote
#[derive(Debug, Clone)]
pub struct QuoteArgs {
    pub material: String,
    pub grams: f64,
    pub minutes: f64,
    pub complexity: f64,
    pub quantity: u32,
    pub rush: bool,
    pub json: bool,
}

/// Execute the quote command
///
/// Prices a job with the configured catalog and rates, without a server.
pub fn execute(path: &Path, args: QuoteArgs) -> Result<()> {
    let cfg = config::load_config(path)?;
    let engine = pricing::engine_from_config(&cfg)?;

    let analysis = ModelAnalysis::for_pricing(args.grams, args.minutes, args.complexity);
    let options = OrderOptions {
        quantity: args.quantity,
        rush: args.rush,
    };
    let result = engine.calculate(&analysis, &args.material, options);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&QuoteSummary::from(&result))?);
        return Ok(());
    }

    match result.into_result() {
        Ok(quote) => {
            print_quote(&quote, &cfg.pricing.currency);
            Ok(())
        }
        Err(message) => bail!(message),
    }
}

fn print_quote(quote: &Quote, currency: &str) {
    let resolution = match quote.material_match {
        MaterialMatch::Exact => String::new(),
        MaterialMatch::Substring => " (matched by name)".to_string(),
        MaterialMatch::Default => " (fallback to default)".yellow().to_string(),
    };

    println!("{}", "Quote".green().bold());
    println!("  Material: {}{}", quote.material_key, resolution);
    println!("  Quantity: {}", quote.quantity);
    println!();
    println!("{}", "Breakdown:".bold());
    for line in &quote.breakdown {
        let line = line.rounded();
        println!(
            "  {:<12} {:<32} {:>4} x {:>9.2} = {:>9.2}",
            format!("{:?}", line.category),
            line.description,
            line.quantity,
            line.unit_price,
            line.total
        );
    }
    println!();
    println!("  Subtotal:        {:>9.2}", round_currency(quote.subtotal));
    println!("  Overhead:        {:>9.2}", round_currency(quote.overhead_cost));
    if quote.rush_surcharge > 0.0 {
        println!("  Rush surcharge:  {:>9.2}", round_currency(quote.rush_surcharge));
    }
    println!("  Profit margin:   {:>9.2}", round_currency(quote.profit_margin));
    println!(
        "  {} {:>9.2} {}",
        "Total:          ".bold(),
        round_currency(quote.total_cost),
        currency
    );
}
