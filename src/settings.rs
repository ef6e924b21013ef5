use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;

use config::{Config, Environment, File};

use secrecy::Secret;

use serde::Deserialize;
use serde_aux::prelude::*;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use url::Url;

use crate::rate_limit::RateLimits;
use crate::repo::RetryPolicy;
use crate::worker::WorkerOptions;

/// Runtime environment, either `Dev` for local development, or `Prod` for release
#[derive(Debug)]
pub enum Runtime {
    Dev,
    Prod,
}

impl Runtime {
    pub fn as_str(&self) -> &str {
        match self {
            Runtime::Dev => "dev",
            Runtime::Prod => "prod",
        }
    }
}

impl TryFrom<String> for Runtime {
    type Error = anyhow::Error;

    fn try_from(s: String) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => anyhow::bail!("{} is not a valid runtime environment", other),
        }
    }
}

/// Application settings wrapper
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: ApplicationSettings,
    pub database: DatabaseSettings,
    pub dedupe: DedupeSettings,
    pub rate_limit: RateLimitSettings,
    pub events: EventSettings,
    pub sms: SmsSettings,
    pub worker: WorkerSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Load application settings from the settings directory
    pub fn load() -> anyhow::Result<Self> {
        // Get the path to the settings directory
        let path = env::current_dir()?.join("settings");
        // Get the current environment based on the `APP_ENV` environment variable, default to `Dev`
        let runtime: Runtime = env::var("APP_ENV")
            .unwrap_or_else(|_| "dev".into())
            .try_into()?;

        Self::load_from(runtime, &path)
    }
    /// Load application settings from a specified path and runtime
    pub fn load_from(runtime: Runtime, base_path: &Path) -> anyhow::Result<Self> {
        Config::builder()
            // Include the base settings
            .add_source(File::from(base_path.join("base")).required(true))
            // Include the runtime settings
            .add_source(File::from(base_path.join(runtime.as_str())).required(true))
            // Override/include any settings from environment variables
            // NOTE: Should be used for any prod secrets. Takes the form `APP_<settings category>__<setting name>`.
            .add_source(
                Environment::with_prefix("app")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
            .context("Failed to load/deserialize settings")
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    /// Serve `/metrics`; answers 404 when disabled
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub metrics_enabled: bool,
}

impl ApplicationSettings {
    /// The application address to bind to
    pub fn addr(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub name: String,
    pub username: String,
    pub password: Secret<String>,
    pub require_ssl: bool,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_connections: u32,
    /// Full connection string, taking precedence over the individual parts
    #[serde(default)]
    pub url: Option<Secret<String>>,
}

impl DatabaseSettings {
    /// The database connection options, without specifying the database name
    pub fn without_db(&self) -> PgConnectOptions {
        use secrecy::ExposeSecret;

        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .port(self.port)
            .host(&self.host)
            .ssl_mode(ssl_mode)
            .username(&self.username)
            .password(self.password.expose_secret())
    }
    /// The database connection options, with the database name
    pub fn with_db(&self) -> anyhow::Result<PgConnectOptions> {
        use secrecy::ExposeSecret;

        match &self.url {
            Some(url) if !url.expose_secret().is_empty() => url
                .expose_secret()
                .parse()
                .context("Failed to parse database URL"),
            _ => Ok(self.without_db().database(&self.name)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DedupeSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub ttl_seconds: u64,
}

impl DedupeSettings {
    /// How long a submitted email blocks repeat submissions
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Deserialize)]
pub struct RateLimitSettings {
    /// Form views allowed per client and window
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub view_per_minute: u32,
    /// Form submissions allowed per client and window
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub submit_per_minute: u32,
    /// Confirmation page views allowed per client and window
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub confirmation_per_minute: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub window_seconds: u64,
    /// Identify clients by `X-Forwarded-For`; only safe behind a proxy that overwrites it
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub trust_forwarded_headers: bool,
}

impl RateLimitSettings {
    pub fn limits(&self) -> RateLimits {
        RateLimits {
            view: self.view_per_minute,
            submit: self.submit_per_minute,
            confirmation: self.confirmation_per_minute,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

#[derive(Debug, Deserialize)]
pub struct EventSettings {
    /// Comma-separated event labels; empty selects the built-in list
    #[serde(default)]
    pub catalog: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub cache_ttl_seconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub page_cache_ttl_seconds: u64,
}

impl EventSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
    pub fn page_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.page_cache_ttl_seconds)
    }
}

#[derive(Debug, Deserialize)]
pub struct SmsSettings {
    pub account_sid: String,
    pub auth_token: Secret<String>,
    pub from_number: String,
    pub api_base_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub api_timeout_milliseconds: u64,
}

impl SmsSettings {
    /// The SMS REST API timeout duration
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_milliseconds)
    }
    /// The base URL for the SMS REST service
    pub fn api_base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.api_base_url).context("Failed to parse SMS API base URL")
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkerSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub poll_interval_milliseconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub receive_timeout_milliseconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub visibility_timeout_seconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_attempts: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub initial_backoff_seconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_backoff_seconds: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub concurrency: usize,
    /// Pause between sweeps of expired dedupe markers and rate-limit counters
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub housekeeping_interval_seconds: u64,
}

impl WorkerSettings {
    /// Redelivery policy of the task queue
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_secs(self.initial_backoff_seconds),
            max_delay: Duration::from_secs(self.max_backoff_seconds),
        }
    }
    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_interval_seconds)
    }
    /// How long a received job stays hidden from other consumers
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_seconds)
    }
    /// Consumer loop options; SMS calls share the sink's timeout
    pub fn options(&self, send_timeout: Duration) -> WorkerOptions {
        WorkerOptions {
            poll_interval: Duration::from_millis(self.poll_interval_milliseconds),
            receive_timeout: Duration::from_millis(self.receive_timeout_milliseconds),
            send_timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// Default `EnvFilter` directive, overridden by `RUST_LOG`
    pub level: String,
}

impl LogSettings {
    pub fn env_filter(&self) -> String {
        env::var("RUST_LOG").unwrap_or_else(|_| self.level.clone())
    }
}
