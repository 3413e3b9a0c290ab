use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "brix")]
#[command(about = "brix CLI - inspect and manage the shared cache and rate limits")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ./brix.toml when present)
    #[arg(short, long, global = true, env = "BRIX_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the shared store answers
    Ping,
    /// Show cache and rate-limit statistics
    Stats,
    /// Remove every cache entry and tag index in the namespace
    Clear,
    /// Delete one cache entry
    Delete(DeleteArgs),
    /// Invalidate all entries carrying any of the given tags
    Invalidate(InvalidateArgs),
    /// Inspect or reset rate-limit windows
    Limit(LimitArgs),
}

#[derive(clap::Args)]
pub struct DeleteArgs {
    /// Cache key, without the namespace (e.g. fixtures:today)
    pub key: String,
}

#[derive(clap::Args)]
pub struct InvalidateArgs {
    /// Tags to invalidate
    #[arg(required = true)]
    pub tags: Vec<String>,
}

#[derive(clap::Args)]
pub struct LimitArgs {
    #[command(subcommand)]
    pub command: LimitCommands,
}

#[derive(Subcommand)]
pub enum LimitCommands {
    /// Show the current window for a key without consuming quota
    Status(LimitStatusArgs),
    /// Drop the window for a key
    Reset(LimitResetArgs),
}

#[derive(clap::Args)]
pub struct LimitStatusArgs {
    /// Rate-limit key, usually a client address
    pub key: String,
    /// Window length in milliseconds (defaults to config)
    #[arg(long)]
    pub window_ms: Option<u64>,
    /// Requests allowed per window (defaults to config)
    #[arg(long)]
    pub max_requests: Option<u32>,
    /// Key prefix (defaults to config)
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(clap::Args)]
pub struct LimitResetArgs {
    /// Rate-limit key, usually a client address
    pub key: String,
    /// Key prefix (defaults to config)
    #[arg(long)]
    pub prefix: Option<String>,
}
