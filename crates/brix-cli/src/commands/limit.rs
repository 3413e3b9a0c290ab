use anyhow::Result;
use brix_cache::{RateLimitOptions, RateLimitResult};
use colored::Colorize;
use serde_json::json;

use super::Context;
use crate::cli::{LimitResetArgs, LimitStatusArgs, OutputFormat};
use crate::output::{print_success, print_value, print_warning};

pub async fn status(ctx: &Context, args: &LimitStatusArgs, format: OutputFormat) -> Result<()> {
    let options = options(ctx, args.window_ms, args.max_requests, args.prefix.as_deref());
    let result = ctx.limiter.get(&args.key, &options).await;

    match format {
        OutputFormat::Json => print_value(
            &json!({
                "key": args.key,
                "keyPrefix": options.key_prefix,
                "result": result,
                "headers": result.headers(),
            }),
            format,
        ),
        OutputFormat::Table => {
            print_status_line(&args.key, &result);
            print_value(&result, format)
        }
    }
}

pub async fn reset(ctx: &Context, args: &LimitResetArgs) -> Result<()> {
    let options = options(ctx, None, None, args.prefix.as_deref());
    if ctx.limiter.reset(&args.key, &options).await {
        print_success(&format!(
            "Reset window {}:{}",
            options.key_prefix, args.key
        ));
    } else {
        print_warning(&format!(
            "No window for {}:{}",
            options.key_prefix, args.key
        ));
    }
    Ok(())
}

fn options(
    ctx: &Context,
    window_ms: Option<u64>,
    max_requests: Option<u32>,
    prefix: Option<&str>,
) -> RateLimitOptions {
    let mut options = ctx.limiter.default_options();
    if let Some(window_ms) = window_ms {
        options.window_ms = window_ms;
    }
    if let Some(max_requests) = max_requests {
        options.max_requests = max_requests;
    }
    if let Some(prefix) = prefix {
        options.key_prefix = prefix.to_string();
    }
    options
}

fn print_status_line(key: &str, result: &RateLimitResult) {
    if result.success {
        println!(
            "{} {} has {} of {} requests left",
            "✓".green(),
            key.cyan(),
            result.remaining.to_string().green(),
            result.limit
        );
    } else {
        println!(
            "{} {} is {} (retry in {}s)",
            "✗".red(),
            key.cyan(),
            "limited".red(),
            result.retry_after.unwrap_or(1)
        );
    }
}
