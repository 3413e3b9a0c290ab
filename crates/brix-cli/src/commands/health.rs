use std::time::Instant;

use anyhow::{Context as _, Result};
use colored::Colorize;
use serde_json::json;

use super::Context;
use crate::cli::OutputFormat;
use crate::output::{print_value, print_warning};

pub async fn ping(ctx: &Context, format: OutputFormat) -> Result<()> {
    let started = Instant::now();
    ctx.store
        .ping()
        .await
        .with_context(|| format!("{} store did not answer", ctx.store.backend_name()))?;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    match format {
        OutputFormat::Json => print_value(
            &json!({
                "backend": ctx.store.backend_name(),
                "namespace": ctx.config.namespace,
                "latencyMs": elapsed_ms,
            }),
            format,
        )?,
        OutputFormat::Table => println!(
            "{} {} store is {} ({elapsed_ms:.2}ms)",
            "✓".green(),
            ctx.store.backend_name().cyan(),
            "reachable".green()
        ),
    }

    if ctx.is_local() {
        print_warning("Redis is disabled or unreachable; this is a process-local store");
    }
    Ok(())
}
