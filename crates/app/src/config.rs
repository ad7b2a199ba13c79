//! Client configuration

use std::{path::PathBuf, time::Duration};

use clap::Args;
use reqwest::Url;
use rusty_money::iso::{self, Currency};

use crate::{context::AppInitError, http::HttpConfig};

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "CANTEEN_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Backend, storage and display settings shared by every command.
#[derive(Debug, Args)]
pub struct AppConfig {
    /// Backend API root
    #[arg(long, env = "CANTEEN_API_URL")]
    pub api_url: Option<Url>,

    /// Backend API token
    #[arg(long, env = "CANTEEN_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Signed-in account
    #[arg(long, env = "CANTEEN_ACCOUNT")]
    pub account: String,

    /// Where the cart is kept between runs
    #[arg(long, env = "CANTEEN_CART_PATH", default_value = "canteen-cart.json")]
    pub cart_path: PathBuf,

    /// Run against an in-process backend instead of the API
    #[arg(long, env = "CANTEEN_OFFLINE", default_value_t = false)]
    pub offline: bool,

    /// Where the in-process backend keeps its state between runs
    #[arg(
        long,
        env = "CANTEEN_OFFLINE_STATE",
        default_value = "canteen-offline.json"
    )]
    pub offline_state: PathBuf,

    /// HTTP request timeout in seconds
    #[arg(long, env = "CANTEEN_HTTP_TIMEOUT_SECS", default_value_t = 10u64)]
    pub http_timeout_secs: u64,

    /// ISO currency code used to display amounts
    #[arg(long, env = "CANTEEN_CURRENCY", default_value = "USD")]
    pub currency: String,

    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// HTTP client settings.
    ///
    /// # Errors
    ///
    /// Returns [`AppInitError::MissingApiUrl`] when no API URL is configured.
    pub fn http_config(&self) -> Result<HttpConfig, AppInitError> {
        let base_url = self.api_url.clone().ok_or(AppInitError::MissingApiUrl)?;

        Ok(HttpConfig {
            base_url,
            token: self.api_token.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs),
        })
    }

    /// Display currency.
    ///
    /// # Errors
    ///
    /// Returns [`AppInitError::UnknownCurrency`] for codes that are not ISO 4217.
    pub fn currency(&self) -> Result<&'static Currency, AppInitError> {
        iso::find(&self.currency.to_uppercase())
            .ok_or_else(|| AppInitError::UnknownCurrency(self.currency.clone()))
    }
}
