//! Configuration loading for the billing operations service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `BILLING_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "BILLING_";
const REDACTED: &str = "[REDACTED]";

/// Application configuration derived from `BILLING_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_secret_key: Option<String>,
    #[serde(default = "default_stripe_api_base")]
    pub stripe_api_base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_api_key: Option<String>,
    #[serde(default = "default_mail_api_base")]
    pub mail_api_base: String,
    #[serde(default = "default_mail_from_address")]
    pub mail_from_address: String,
    #[serde(default = "default_mail_from_name")]
    pub mail_from_name: String,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    #[serde(default)]
    pub price_migration: PriceMigrationConfig,
    #[serde(default)]
    pub consolidation: ConsolidationConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Pacing of the price migration batch steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PriceMigrationConfig {
    /// Pause between two notice emails.
    ///
    /// Environment variable: `BILLING_MIGRATION_EMAIL_DELAY_MS`
    #[serde(default = "default_migration_email_delay_ms")]
    pub email_delay_ms: u64,

    /// Pause between two subscription updates at the payment provider.
    ///
    /// Environment variable: `BILLING_MIGRATION_PROVIDER_DELAY_MS`
    #[serde(default = "default_migration_provider_delay_ms")]
    pub provider_delay_ms: u64,
}

/// Usage consolidation batch parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ConsolidationConfig {
    /// Sessions started more than this many days ago are eligible.
    #[serde(default = "default_consolidation_retention_days")]
    pub retention_days: u32,
    /// Maximum number of sessions handled per run.
    #[serde(default = "default_consolidation_batch_size")]
    pub batch_size: u64,
    /// Sessions with this many unconsolidated rows or fewer are left alone.
    #[serde(default = "default_consolidation_min_rows")]
    pub min_rows: u64,
}

/// Intervals of the background jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_migration_interval_seconds")]
    pub migration_interval_seconds: u64,
    #[serde(default = "default_scheduler_consolidation_interval_seconds")]
    pub consolidation_interval_seconds: u64,
    /// How long a claimed job lease stays valid if its holder never releases it.
    #[serde(default = "default_scheduler_lease_ttl_seconds")]
    pub lease_ttl_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            stripe_secret_key: None,
            stripe_api_base: default_stripe_api_base(),
            mail_api_key: None,
            mail_api_base: default_mail_api_base(),
            mail_from_address: default_mail_from_address(),
            mail_from_name: default_mail_from_name(),
            http_timeout_seconds: default_http_timeout_seconds(),
            price_migration: PriceMigrationConfig::default(),
            consolidation: ConsolidationConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Default for PriceMigrationConfig {
    fn default() -> Self {
        Self {
            email_delay_ms: default_migration_email_delay_ms(),
            provider_delay_ms: default_migration_provider_delay_ms(),
        }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            retention_days: default_consolidation_retention_days(),
            batch_size: default_consolidation_batch_size(),
            min_rows: default_consolidation_min_rows(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            migration_interval_seconds: default_scheduler_migration_interval_seconds(),
            consolidation_interval_seconds: default_scheduler_consolidation_interval_seconds(),
            lease_ttl_seconds: default_scheduler_lease_ttl_seconds(),
        }
    }
}

impl AppConfig {
    /// Whether the profile is a developer profile where external credentials are optional.
    pub fn is_local_profile(&self) -> bool {
        matches!(self.profile.as_str(), "local" | "test")
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.stripe_secret_key.is_some() {
            config.stripe_secret_key = Some(REDACTED.to_string());
        }
        if config.mail_api_key.is_some() {
            config.mail_api_key = Some(REDACTED.to_string());
        }
        config.database_url = redact_url_password(&config.database_url);
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_local_profile() {
            if self.stripe_secret_key.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingStripeSecretKey);
            }
            if self.mail_api_key.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingMailApiKey);
            }
        }

        for (key, value) in [
            ("STRIPE_API_BASE", &self.stripe_api_base),
            ("MAIL_API_BASE", &self.mail_api_base),
        ] {
            url::Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
                key,
                value: value.clone(),
                source,
            })?;
        }

        if self.http_timeout_seconds == 0 || self.http_timeout_seconds > 300 {
            return Err(ConfigError::InvalidHttpTimeout {
                value: self.http_timeout_seconds,
            });
        }

        self.price_migration.validate()?;
        self.consolidation.validate()?;
        self.scheduler.validate()?;

        Ok(())
    }
}

impl PriceMigrationConfig {
    pub fn email_delay(&self) -> Duration {
        Duration::from_millis(self.email_delay_ms)
    }

    pub fn provider_delay(&self) -> Duration {
        Duration::from_millis(self.provider_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("email_delay_ms", self.email_delay_ms),
            ("provider_delay_ms", self.provider_delay_ms),
        ] {
            if value > 60_000 {
                return Err(ConfigError::InvalidMigrationDelay { field, value });
            }
        }
        Ok(())
    }
}

impl ConsolidationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_days == 0 {
            return Err(ConfigError::InvalidRetentionDays {
                value: self.retention_days,
            });
        }
        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidConsolidationBatchSize {
                value: self.batch_size,
            });
        }
        Ok(())
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("migration interval", self.migration_interval_seconds),
            ("consolidation interval", self.consolidation_interval_seconds),
        ] {
            if value < 60 {
                return Err(ConfigError::InvalidSchedulerInterval { field, value });
            }
        }
        if self.lease_ttl_seconds < 60 {
            return Err(ConfigError::InvalidLeaseTtl {
                value: self.lease_ttl_seconds,
            });
        }
        Ok(())
    }
}

fn redact_url_password(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some(REDACTED)).is_ok() {
                parsed.to_string()
            } else {
                raw.to_string()
            }
        }
        _ => raw.to_string(),
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "postgresql://localhost:5432/billing".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_stripe_api_base() -> String {
    crate::billing_provider::stripe::DEFAULT_API_BASE.to_string()
}

fn default_mail_api_base() -> String {
    "https://api.resend.com".to_string()
}

fn default_mail_from_address() -> String {
    "billing@localhost".to_string()
}

fn default_mail_from_name() -> String {
    "Billing".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    30
}

fn default_migration_email_delay_ms() -> u64 {
    100
}

fn default_migration_provider_delay_ms() -> u64 {
    50
}

fn default_consolidation_retention_days() -> u32 {
    60
}

fn default_consolidation_batch_size() -> u64 {
    50
}

fn default_consolidation_min_rows() -> u64 {
    5
}

fn default_scheduler_migration_interval_seconds() -> u64 {
    86_400
}

fn default_scheduler_consolidation_interval_seconds() -> u64 {
    86_400
}

fn default_scheduler_lease_ttl_seconds() -> u64 {
    3_600
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid value '{value}' for BILLING_{key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid URL '{value}' for BILLING_{key}: {source}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("Stripe secret key is missing; set BILLING_STRIPE_SECRET_KEY")]
    MissingStripeSecretKey,
    #[error("mail API key is missing; set BILLING_MAIL_API_KEY")]
    MissingMailApiKey,
    #[error("HTTP timeout must be between 1 and 300 seconds, got {value}")]
    InvalidHttpTimeout { value: u64 },
    #[error("migration {field} must not exceed 60000, got {value}")]
    InvalidMigrationDelay { field: &'static str, value: u64 },
    #[error("consolidation retention must be at least 1 day, got {value}")]
    InvalidRetentionDays { value: u32 },
    #[error("consolidation batch size must be between 1 and 1000, got {value}")]
    InvalidConsolidationBatchSize { value: u64 },
    #[error("scheduler {field} must be at least 60 seconds, got {value}")]
    InvalidSchedulerInterval { field: &'static str, value: u64 },
    #[error("scheduler lease TTL must be at least 60 seconds, got {value}")]
    InvalidLeaseTtl { value: u64 },
}

/// Loads configuration using layered `.env` files and `BILLING_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);

        let config = AppConfig {
            profile,
            log_level: take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level),
            log_format: take_string(&mut layered, "LOG_FORMAT")
                .unwrap_or_else(default_log_format),
            database_url: take_string(&mut layered, "DATABASE_URL")
                .unwrap_or_else(default_database_url),
            db_max_connections: take_parsed(&mut layered, "DB_MAX_CONNECTIONS")?
                .unwrap_or_else(default_db_max_connections),
            db_acquire_timeout_ms: take_parsed(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")?
                .unwrap_or_else(default_db_acquire_timeout_ms),
            stripe_secret_key: take_string(&mut layered, "STRIPE_SECRET_KEY"),
            stripe_api_base: take_string(&mut layered, "STRIPE_API_BASE")
                .unwrap_or_else(default_stripe_api_base),
            mail_api_key: take_string(&mut layered, "MAIL_API_KEY"),
            mail_api_base: take_string(&mut layered, "MAIL_API_BASE")
                .unwrap_or_else(default_mail_api_base),
            mail_from_address: take_string(&mut layered, "MAIL_FROM_ADDRESS")
                .unwrap_or_else(default_mail_from_address),
            mail_from_name: take_string(&mut layered, "MAIL_FROM_NAME")
                .unwrap_or_else(default_mail_from_name),
            http_timeout_seconds: take_parsed(&mut layered, "HTTP_TIMEOUT_SECONDS")?
                .unwrap_or_else(default_http_timeout_seconds),
            price_migration: PriceMigrationConfig {
                email_delay_ms: take_parsed(&mut layered, "MIGRATION_EMAIL_DELAY_MS")?
                    .unwrap_or_else(default_migration_email_delay_ms),
                provider_delay_ms: take_parsed(&mut layered, "MIGRATION_PROVIDER_DELAY_MS")?
                    .unwrap_or_else(default_migration_provider_delay_ms),
            },
            consolidation: ConsolidationConfig {
                retention_days: take_parsed(&mut layered, "CONSOLIDATION_RETENTION_DAYS")?
                    .unwrap_or_else(default_consolidation_retention_days),
                batch_size: take_parsed(&mut layered, "CONSOLIDATION_BATCH_SIZE")?
                    .unwrap_or_else(default_consolidation_batch_size),
                min_rows: take_parsed(&mut layered, "CONSOLIDATION_MIN_ROWS")?
                    .unwrap_or_else(default_consolidation_min_rows),
            },
            scheduler: SchedulerConfig {
                migration_interval_seconds: take_parsed(
                    &mut layered,
                    "SCHEDULER_MIGRATION_INTERVAL_SECONDS",
                )?
                .unwrap_or_else(default_scheduler_migration_interval_seconds),
                consolidation_interval_seconds: take_parsed(
                    &mut layered,
                    "SCHEDULER_CONSOLIDATION_INTERVAL_SECONDS",
                )?
                .unwrap_or_else(default_scheduler_consolidation_interval_seconds),
                lease_ttl_seconds: take_parsed(&mut layered, "SCHEDULER_LEASE_TTL_SECONDS")?
                    .unwrap_or_else(default_scheduler_lease_ttl_seconds),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(self.base_dir.join(format!(".env.{profile}")), &mut values)?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{profile}.local")),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(values: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    values
        .remove(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn take_parsed<T: FromStr>(
    values: &mut BTreeMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match take_string(values, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}
