use anyhow::Result;
use colored::Colorize;
use print_quote::config;
use print_quote::pricing::MaterialCatalog;
use std::path::Path;

/// Execute the materials command
///
/// Prints the catalog in resolution order; the default material is starred.
pub fn execute(path: &Path) -> Result<()> {
    let cfg = config::load_config(path)?;
    let catalog = MaterialCatalog::from_config(&cfg.materials)?;
    let default_key = catalog.default_profile().key.clone();

    println!("{}", "Materials:".green().bold());
    println!(
        "  {:<8} {:<16} {:>10} {:>8} {:>10}",
        "KEY", "NAME", "COST/G", "DENSITY", "MACHINE"
    );
    for profile in catalog.profiles() {
        let marker = if profile.key == default_key { "*" } else { " " };
        let row = format!(
            "{}{:<7} {:<16} {:>10.3} {:>8.2} {:>9.2}x",
            marker,
            profile.key,
            profile.display_name,
            profile.cost_per_gram,
            profile.density,
            profile.machine_multiplier
        );
        if profile.available {
            println!(" {}", row);
        } else {
            println!(" {} {}", row.dimmed(), "(unavailable)".dimmed());
        }
    }

    Ok(())
}
