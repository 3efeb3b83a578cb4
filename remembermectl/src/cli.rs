use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "remembermectl", version)]
#[command(about = "Maintain remember-me triplet storage")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file (defaults to rememberme.toml or config/rememberme.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Environment file to load before reading variables (defaults to .env)
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Delete stored triplets whose expiry has passed
    Sweep {
        /// Cut-off instant (RFC 3339); defaults to now
        #[arg(long, value_name = "TIMESTAMP", value_parser = parse_rfc3339)]
        before: Option<DateTime<Utc>>,
    },
    /// Log a credential out on every device
    Revoke {
        #[arg(long)]
        credential: String,
    },
    /// Issue a new remember-me cookie for a credential and print it
    Issue {
        #[arg(long)]
        credential: String,

        /// Print a full Set-Cookie header instead of the bare payload
        #[arg(long, default_value_t = false)]
        set_cookie: bool,
    },
    /// Run a login with a cookie value and print the outcome as JSON
    Check {
        /// Cookie payload as sent by the browser
        #[arg(long, value_name = "VALUE")]
        cookie: String,
    },
    /// Print the resolved configuration with secrets redacted
    Config,
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| format!("expected an RFC 3339 timestamp: {err}"))
}
