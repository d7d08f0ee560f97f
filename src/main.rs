use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use print_quote::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.get_command();

    // The server configures logging from its config file; other commands stay quiet
    if !matches!(command, cli::Commands::Start) {
        init_tracing("warn", "pretty");
    }

    match command {
        cli::Commands::Start => {
            commands::start::execute(args.config).await?;
        }
        cli::Commands::Quote {
            material,
            grams,
            minutes,
            complexity,
            quantity,
            rush,
            json,
        } => {
            commands::quote::execute(
                &args.config,
                commands::quote::QuoteArgs {
                    material,
                    grams,
                    minutes,
                    complexity,
                    quantity,
                    rush,
                    json,
                },
            )?;
        }
        cli::Commands::Materials => {
            commands::materials::execute(&args.config)?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&args.config)?,
            cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
        },
        cli::Commands::Version => {
            println!("print-quote v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
