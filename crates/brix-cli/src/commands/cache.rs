use anyhow::{Result, bail};
use brix_cache::AdminSnapshot;

use super::Context;
use crate::cli::OutputFormat;
use crate::output::{print_success, print_value, print_warning};

pub async fn stats(ctx: &Context, format: OutputFormat) -> Result<()> {
    let snapshot = AdminSnapshot::collect(&ctx.cache, &ctx.limiter).await;
    if snapshot.cache.is_none() && snapshot.rate_limit.is_none() {
        bail!("could not read statistics from the {} store", ctx.store.backend_name());
    }
    print_value(&snapshot, format)
}

pub async fn clear(ctx: &Context) -> Result<()> {
    guard_local(ctx);
    if !ctx.cache.clear().await {
        bail!("clear failed for namespace '{}'", ctx.config.namespace);
    }
    print_success(&format!("Cleared cache namespace '{}'", ctx.config.namespace));
    Ok(())
}

pub async fn delete(ctx: &Context, key: &str) -> Result<()> {
    guard_local(ctx);
    if ctx.cache.delete(key).await {
        print_success(&format!("Deleted '{key}'"));
    } else {
        print_warning(&format!("No entry for '{key}'"));
    }
    Ok(())
}

pub async fn invalidate(ctx: &Context, tags: &[String]) -> Result<()> {
    guard_local(ctx);
    let removed = ctx.cache.invalidate_tags(tags).await;
    print_success(&format!(
        "Invalidated {removed} entr{} tagged {}",
        if removed == 1 { "y" } else { "ies" },
        tags.join(", ")
    ));
    Ok(())
}

fn guard_local(ctx: &Context) {
    if ctx.is_local() {
        print_warning("Redis is disabled or unreachable; changes only affect this process");
    }
}
