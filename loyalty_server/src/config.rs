use std::{env, fmt::Display, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use loyalty_common::{helpers::parse_boolean_flag, Secret};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/loyalty_store.db";
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 25;
const DEFAULT_SHADOW_WALLET_TTL_HOURS: i64 = 72;
const DEFAULT_EXPIRATION_INTERVAL_MINUTES: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub max_db_connections: u32,
    /// How long an unregistered customer has to sign up before their shadow balance is forfeited.
    pub shadow_wallet_ttl: Duration,
    /// The period between two expiration sweeps. The first sweep runs at startup.
    pub expiration_interval: StdDuration,
    /// Per-call deadline for outbound identity lookups and for the ingestion and conversion flows.
    pub request_timeout: StdDuration,
    /// If true, pending migrations are applied when the server starts.
    pub auto_migrate: bool,
    pub identity: IdentityConfig,
}

#[derive(Clone, Debug, Default)]
pub struct IdentityConfig {
    /// Base url of the auth provider, e.g. "https://my-project.supabase.co"
    pub url: String,
    pub service_key: Secret<String>,
    /// When true, no lookups are made and every phone number is treated as unregistered.
    pub use_mock: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_db_connections: DEFAULT_MAX_DB_CONNECTIONS,
            shadow_wallet_ttl: Duration::hours(DEFAULT_SHADOW_WALLET_TTL_HOURS),
            expiration_interval: StdDuration::from_secs(DEFAULT_EXPIRATION_INTERVAL_MINUTES * 60),
            request_timeout: StdDuration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            auto_migrate: true,
            identity: IdentityConfig { use_mock: true, ..Default::default() },
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any key-value source. Missing or invalid values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let database_url = lookup("LOYALTY_DATABASE_URL").unwrap_or_else(|| {
            info!("🪛️ LOYALTY_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_db_connections =
            parse_positive(&lookup, "LOYALTY_DB_MAX_CONNECTIONS", DEFAULT_MAX_DB_CONNECTIONS, |v| *v > 0);
        let ttl_hours =
            parse_positive(&lookup, "LOYALTY_SHADOW_WALLET_TTL_HOURS", DEFAULT_SHADOW_WALLET_TTL_HOURS, |v| *v > 0);
        let interval_minutes = parse_positive(
            &lookup,
            "LOYALTY_EXPIRATION_INTERVAL_MINUTES",
            DEFAULT_EXPIRATION_INTERVAL_MINUTES,
            |v| *v > 0,
        );
        let timeout_secs =
            parse_positive(&lookup, "LOYALTY_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS, |v| *v > 0);
        let auto_migrate = parse_boolean_flag(lookup("LOYALTY_AUTO_MIGRATE"), true);
        let identity = IdentityConfig::from_lookup(&lookup);
        Self {
            database_url,
            max_db_connections,
            shadow_wallet_ttl: Duration::hours(ttl_hours),
            expiration_interval: StdDuration::from_secs(interval_minutes * 60),
            request_timeout: StdDuration::from_secs(timeout_secs),
            auto_migrate,
            identity,
        }
    }
}

impl IdentityConfig {
    fn from_lookup<F>(lookup: &F) -> Self
    where F: Fn(&str) -> Option<String> {
        let use_mock = parse_boolean_flag(lookup("LOYALTY_MOCK_IDENTITY"), false);
        let url = lookup("LOYALTY_IDENTITY_URL").unwrap_or_default();
        let service_key = Secret::new(lookup("LOYALTY_IDENTITY_SERVICE_KEY").unwrap_or_default());
        if use_mock {
            warn!(
                "🪛️ LOYALTY_MOCK_IDENTITY is set. Every customer will be treated as unregistered and will earn into a \
                 shadow balance."
            );
            return Self { url, service_key, use_mock };
        }
        if url.trim().is_empty() || service_key.is_empty() {
            warn!(
                "🪛️ LOYALTY_IDENTITY_URL or LOYALTY_IDENTITY_SERVICE_KEY is not set. Identity lookups are disabled and \
                 every customer will be treated as unregistered."
            );
            return Self { url, service_key, use_mock: true };
        }
        Self { url, service_key, use_mock }
    }
}

fn parse_positive<F, T>(lookup: &F, name: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match lookup(name) {
        None => default,
        Some(s) => match s.trim().parse::<T>() {
            Ok(v) if valid(&v) => v,
            Ok(v) => {
                warn!("🪛️ {v} is not a valid value for {name}. It must be positive. Using the default, {default}.");
                default
            },
            Err(e) => {
                warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}.");
                default
            },
        },
    }
}
