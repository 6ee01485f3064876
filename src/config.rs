use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::auth::{AuthConfig, KeySource};
use crate::bus::QueueConfig;
use crate::store::DEFAULT_TABLE;

/// Runtime configuration for the `book-catalog` binary.
///
/// Every value is read once at startup from CLI arguments or environment
/// variables (a `.env` file is honored). Authentication is enabled only when
/// issuer, audience and JWKS URI are all present.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "book-catalog",
    version,
    about = "Book catalog: authenticated lookups plus queued bulk ingestion"
)]
pub struct CliArgs {
    /// Name of the book table.
    ///
    /// Environment variable: `TABLE_NAME`
    #[arg(long, env = "TABLE_NAME", default_value_t = String::from(DEFAULT_TABLE))]
    pub table_name: String,

    /// Provider region, informational for the local adapters.
    ///
    /// Environment variable: `REGION`
    #[arg(long, env = "REGION")]
    pub region: Option<String>,

    /// Expected `iss` claim of bearer tokens.
    ///
    /// Environment variable: `AUTH_ISSUER`
    #[arg(long, env = "AUTH_ISSUER")]
    pub auth_issuer: Option<String>,

    /// Expected `aud` claim of bearer tokens.
    ///
    /// Environment variable: `AUTH_AUDIENCE`
    #[arg(long, env = "AUTH_AUDIENCE")]
    pub auth_audience: Option<String>,

    /// Where token verification keys are published.
    ///
    /// Environment variable: `AUTH_JWKS_URI`
    #[arg(long, env = "AUTH_JWKS_URI")]
    pub auth_jwks_uri: Option<String>,

    /// Seconds a fetched key set is trusted before it is refetched.
    ///
    /// Environment variable: `JWKS_CACHE_TTL_SECS`
    #[arg(long, env = "JWKS_CACHE_TTL_SECS", default_value_t = 300)]
    pub jwks_cache_ttl_secs: u64,

    /// Clock skew tolerated when checking token expiry.
    ///
    /// Environment variable: `AUTH_LEEWAY_SECS`
    #[arg(long, env = "AUTH_LEEWAY_SECS", default_value_t = 60)]
    pub auth_leeway_secs: u64,

    /// Address the lookup API listens on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Root of the local object storage; each bucket is a subdirectory.
    ///
    /// Environment variable: `DATA_DIR`
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Bucket whose files are ingested at startup.
    ///
    /// Environment variable: `DATA_BUCKET`
    #[arg(long, env = "DATA_BUCKET", default_value_t = String::from("data"))]
    pub data_bucket: String,

    /// Seconds a received message stays hidden before redelivery.
    ///
    /// Environment variable: `QUEUE_VISIBILITY_TIMEOUT_SECS`
    #[arg(long, env = "QUEUE_VISIBILITY_TIMEOUT_SECS", default_value_t = 30)]
    pub queue_visibility_timeout_secs: u64,

    /// Deliveries allowed before a failing message is dead-lettered.
    ///
    /// Environment variable: `QUEUE_MAX_RECEIVE_COUNT`
    #[arg(long, env = "QUEUE_MAX_RECEIVE_COUNT", default_value_t = 2)]
    pub queue_max_receive_count: u32,

    /// How long each queue poll waits for a message, in milliseconds.
    ///
    /// Environment variable: `POLL_INTERVAL_MS`
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 100)]
    pub poll_interval_ms: u64,

    /// How often the data bucket is rescanned for new files, in milliseconds.
    ///
    /// Environment variable: `WATCH_INTERVAL_MS`
    #[arg(long, env = "WATCH_INTERVAL_MS", default_value_t = 1000)]
    pub watch_interval_ms: u64,

    /// Bound on outbound adapter calls such as key-set fetches.
    ///
    /// Environment variable: `ADAPTER_TIMEOUT_SECS`
    #[arg(long, env = "ADAPTER_TIMEOUT_SECS", default_value_t = 10)]
    pub adapter_timeout_secs: u64,

    /// Extra store calls spent on items a batch call left unprocessed.
    ///
    /// Environment variable: `MAX_UNPROCESSED_RETRIES`
    #[arg(long, env = "MAX_UNPROCESSED_RETRIES", default_value_t = 3)]
    pub max_unprocessed_retries: usize,

    /// Emit logs as JSON lines instead of human-readable text.
    ///
    /// Environment variable: `LOG_JSON`
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

/// Rejected configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("authentication is partially configured; missing {0}")]
    PartialAuth(&'static str),
    #[error("{0} must be greater than 0")]
    NotPositive(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub table_name: String,
    pub region: Option<String>,
    /// `None` serves lookups without authentication.
    pub auth: Option<AuthConfig>,
    pub server_addr: String,
    pub data_dir: PathBuf,
    pub data_bucket: String,
    pub queue: QueueConfig,
    pub poll_interval: Duration,
    pub watch_interval: Duration,
    pub adapter_timeout: Duration,
    pub max_unprocessed_retries: usize,
    pub log_json: bool,
}

impl TryFrom<CliArgs> for CatalogConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.table_name.trim().is_empty() {
            return Err(ConfigError::Empty("TABLE_NAME"));
        }
        if args.data_bucket.trim().is_empty() {
            return Err(ConfigError::Empty("DATA_BUCKET"));
        }
        if args.queue_max_receive_count == 0 {
            return Err(ConfigError::NotPositive("QUEUE_MAX_RECEIVE_COUNT"));
        }
        if args.queue_visibility_timeout_secs == 0 {
            return Err(ConfigError::NotPositive("QUEUE_VISIBILITY_TIMEOUT_SECS"));
        }
        if args.poll_interval_ms == 0 {
            return Err(ConfigError::NotPositive("POLL_INTERVAL_MS"));
        }
        if args.watch_interval_ms == 0 {
            return Err(ConfigError::NotPositive("WATCH_INTERVAL_MS"));
        }
        if args.adapter_timeout_secs == 0 {
            return Err(ConfigError::NotPositive("ADAPTER_TIMEOUT_SECS"));
        }

        let adapter_timeout = Duration::from_secs(args.adapter_timeout_secs);

        let auth = match (args.auth_issuer, args.auth_audience, args.auth_jwks_uri) {
            (None, None, None) => None,
            (Some(issuer), Some(audience), Some(jwks_uri)) => {
                let mut auth = AuthConfig::new(issuer, audience, KeySource::Jwks(jwks_uri));
                auth.jwks_cache_ttl = Duration::from_secs(args.jwks_cache_ttl_secs);
                auth.leeway = Duration::from_secs(args.auth_leeway_secs);
                auth.http_timeout = adapter_timeout;
                Some(auth)
            }
            (issuer, audience, _) => {
                let missing = if issuer.is_none() {
                    "AUTH_ISSUER"
                } else if audience.is_none() {
                    "AUTH_AUDIENCE"
                } else {
                    "AUTH_JWKS_URI"
                };
                return Err(ConfigError::PartialAuth(missing));
            }
        };

        Ok(Self {
            table_name: args.table_name,
            region: args.region,
            auth,
            server_addr: args.server_addr,
            data_dir: args.data_dir,
            data_bucket: args.data_bucket,
            queue: QueueConfig {
                visibility_timeout: Duration::from_secs(args.queue_visibility_timeout_secs),
                max_receive_count: args.queue_max_receive_count,
            },
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            watch_interval: Duration::from_millis(args.watch_interval_ms),
            adapter_timeout,
            max_unprocessed_retries: args.max_unprocessed_retries,
            log_json: args.log_json,
        })
    }
}
