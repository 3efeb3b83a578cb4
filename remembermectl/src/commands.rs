use anyhow::{Context, Result};
use chrono::Utc;
use rememberme_config::{
    Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions, build_authenticator,
};
use rememberme_core::{
    Authenticator, CookieSource, HttpCookie, LoginOutcome, LoginResult,
    MemoryCookie,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{Cli, Command, GlobalArgs};

/// JSON report printed by `check`.
#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    outcome: LoginOutcome,
    #[serde(flatten)]
    result: &'a LoginResult,
    /// Replacement payload the browser should store, if any.
    cookie: Option<&'a str>,
    cookie_deleted: bool,
}

pub async fn run(cli: Cli) -> Result<()> {
    let ConfigLoad { config, warnings } = load_config(&cli.global)?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    match cli.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config.summary())?);
        }
        Command::Sweep { before } => {
            let before = before.unwrap_or_else(Utc::now);
            connect(&config)
                .await?
                .storage()
                .clean_expired_tokens(before)
                .await
                .context("sweep failed")?;
            println!("swept triplets expired before {}", before.to_rfc3339());
        }
        Command::Revoke { credential } => {
            connect(&config)
                .await?
                .storage()
                .clean_all_triplets(&credential)
                .await
                .context("revoke failed")?;
            println!("revoked every device of {credential}");
        }
        Command::Issue {
            credential,
            set_cookie,
        } => {
            let authenticator = connect(&config).await?;
            if set_cookie {
                let mut cookie = HttpCookie::new(config.cookie.clone());
                authenticator
                    .create_cookie(&credential, &mut cookie)
                    .await
                    .context("failed to issue cookie")?;
                for header in cookie.set_cookie_headers() {
                    let header =
                        header.to_str().context("Set-Cookie header is not ASCII")?;
                    println!("Set-Cookie: {header}");
                }
            } else {
                let mut cookie = MemoryCookie::new();
                authenticator
                    .create_cookie(&credential, &mut cookie)
                    .await
                    .context("failed to issue cookie")?;
                println!("{}", cookie.value().unwrap_or_default());
            }
        }
        Command::Check { cookie: value } => {
            let authenticator = connect(&config).await?;
            let mut cookie = MemoryCookie::with_value(value);
            let result = authenticator
                .login(&mut cookie)
                .await
                .context("login check failed")?;
            let report = CheckReport {
                outcome: result.outcome(),
                result: &result,
                cookie: cookie.writes().last().map(String::as_str),
                cookie_deleted: cookie.was_deleted(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn load_config(args: &GlobalArgs) -> Result<ConfigLoad> {
    ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: args.config.clone(),
        env_file: args.env_file.clone(),
    })
    .load()
    .context("failed to load configuration")
}

async fn connect(config: &Config) -> Result<Authenticator> {
    build_authenticator(config)
        .await
        .context("failed to initialise authenticator")
}
