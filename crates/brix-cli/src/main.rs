mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;

use brix_cache::load_config;
use brix_cache::observability::init_tracing_with_level;
use cli::{Cli, Commands, LimitCommands};
use commands::Context;
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    let config = load_config(cli.config.as_deref()).map_err(anyhow::Error::msg)?;
    // Store fallbacks and failures are reported as warnings.
    init_tracing_with_level("warn");

    let ctx = Context::connect(config).await;

    match &cli.command {
        Commands::Ping => commands::health::ping(&ctx, format).await?,
        Commands::Stats => commands::cache::stats(&ctx, format).await?,
        Commands::Clear => commands::cache::clear(&ctx).await?,
        Commands::Delete(args) => commands::cache::delete(&ctx, &args.key).await?,
        Commands::Invalidate(args) => commands::cache::invalidate(&ctx, &args.tags).await?,
        Commands::Limit(args) => match &args.command {
            LimitCommands::Status(status) => {
                commands::limit::status(&ctx, status, format).await?
            }
            LimitCommands::Reset(reset) => commands::limit::reset(&ctx, reset).await?,
        },
    }

    Ok(())
}
