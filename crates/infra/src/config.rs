//! Configuration loading and representation.
//!
//! Everything comes from environment variables. Parsing goes through
//! [`AppConfig::from_lookup`] so it can be exercised without touching the
//! process environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use shipsync_core::TenantId;
use shipsync_observability::LogFormat;
use shipsync_shipping::{DEFAULT_MAX_ATTEMPTS, SyncPolicy, TenantContext, WeightUnit};

pub const ENV_ENABLED: &str = "SHIPSYNC_ENABLED";
pub const ENV_MAX_ATTEMPTS: &str = "SHIPSYNC_MAX_ATTEMPTS";
pub const ENV_RUN_INTERVAL_SECS: &str = "SHIPSYNC_RUN_INTERVAL_SECS";
pub const ENV_CARRIER_NAME: &str = "SHIPSYNC_CARRIER_NAME";
pub const ENV_CARRIER_API_URL: &str = "SHIPSYNC_CARRIER_API_URL";
pub const ENV_CARRIER_API_KEY: &str = "SHIPSYNC_CARRIER_API_KEY";
pub const ENV_CARRIER_TIMEOUT_SECS: &str = "SHIPSYNC_CARRIER_TIMEOUT_SECS";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_LISTEN_ADDR: &str = "SHIPSYNC_LISTEN_ADDR";
pub const ENV_LOG_FORMAT: &str = "SHIPSYNC_LOG_FORMAT";
pub const ENV_TENANT_ID: &str = "SHIPSYNC_TENANT_ID";
pub const ENV_TENANT_CODE: &str = "SHIPSYNC_TENANT_CODE";
pub const ENV_TENANT_NAME: &str = "SHIPSYNC_TENANT_NAME";
pub const ENV_TENANT_LOCALE: &str = "SHIPSYNC_TENANT_LOCALE";
pub const ENV_TENANT_CURRENCY: &str = "SHIPSYNC_TENANT_CURRENCY";
pub const ENV_TENANT_WEIGHT_UNIT: &str = "SHIPSYNC_TENANT_WEIGHT_UNIT";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Carrier API settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierConfig {
    /// Name shown in order comments and notifications.
    pub name: String,
    /// Base URL; `None` selects the in-memory carrier (dev only).
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            name: "Carrier".to_string(),
            api_url: None,
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// The store provisioned at startup.
///
/// In-memory mode serves exactly this tenant; with Postgres it is upserted
/// into `stores` when `id` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSettings {
    pub id: Option<TenantId>,
    pub code: String,
    pub name: Option<String>,
    pub locale: Option<String>,
    pub currency: Option<String>,
    pub weight_unit: Option<WeightUnit>,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            id: None,
            code: "default".to_string(),
            name: None,
            locale: None,
            currency: None,
            weight_unit: None,
        }
    }
}

impl TenantSettings {
    /// Context for the configured tenant id, if one is set.
    pub fn context(&self) -> Option<TenantContext> {
        self.id.map(|id| self.context_for(id))
    }

    pub fn context_for(&self, tenant_id: TenantId) -> TenantContext {
        let mut ctx = TenantContext::new(tenant_id, self.code.clone());
        if let Some(name) = &self.name {
            ctx = ctx.with_name(name.clone());
        }
        if let Some(locale) = &self.locale {
            ctx = ctx.with_locale(locale.clone());
        }
        if let Some(currency) = &self.currency {
            ctx = ctx.with_currency(currency.to_ascii_uppercase());
        }
        if let Some(unit) = self.weight_unit {
            ctx = ctx.with_weight_unit(unit);
        }
        ctx
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub policy: SyncPolicy,
    pub run_interval: Duration,
    pub carrier: CarrierConfig,
    /// `None` runs with in-memory stores.
    pub database_url: Option<String>,
    pub listen_addr: SocketAddr,
    pub log_format: LogFormat,
    pub tenant: TenantSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            policy: SyncPolicy::default(),
            run_interval: Duration::from_secs(300),
            carrier: CarrierConfig::default(),
            database_url: None,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_format: LogFormat::Json,
            tenant: TenantSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let enabled = match get(ENV_ENABLED) {
            Some(v) => parse_bool(ENV_ENABLED, &v)?,
            None => defaults.policy.enabled,
        };
        let max_attempts = parse_or(get(ENV_MAX_ATTEMPTS), ENV_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS)?;
        let run_interval_secs: u64 = parse_or(get(ENV_RUN_INTERVAL_SECS), ENV_RUN_INTERVAL_SECS, 300)?;
        if run_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_RUN_INTERVAL_SECS,
                value: "0".to_string(),
            });
        }
        let timeout_secs: u64 = parse_or(get(ENV_CARRIER_TIMEOUT_SECS), ENV_CARRIER_TIMEOUT_SECS, 30)?;

        let api_url = get(ENV_CARRIER_API_URL).map(|u| u.trim_end_matches('/').to_string());
        let api_key = get(ENV_CARRIER_API_KEY);
        if api_url.is_some() && api_key.is_none() {
            return Err(ConfigError::Missing(ENV_CARRIER_API_KEY));
        }

        let listen_addr = match get(ENV_LISTEN_ADDR) {
            Some(v) => SocketAddr::from_str(&v).map_err(|_| ConfigError::Invalid {
                key: ENV_LISTEN_ADDR,
                value: v,
            })?,
            None => defaults.listen_addr,
        };

        let log_format = match get(ENV_LOG_FORMAT) {
            Some(v) => LogFormat::parse(&v).ok_or(ConfigError::Invalid {
                key: ENV_LOG_FORMAT,
                value: v,
            })?,
            None => defaults.log_format,
        };

        let tenant_id = match get(ENV_TENANT_ID) {
            Some(v) => Some(TenantId::from_str(&v).map_err(|_| ConfigError::Invalid {
                key: ENV_TENANT_ID,
                value: v,
            })?),
            None => None,
        };
        let weight_unit = match get(ENV_TENANT_WEIGHT_UNIT) {
            Some(v) => Some(WeightUnit::parse(&v).map_err(|_| ConfigError::Invalid {
                key: ENV_TENANT_WEIGHT_UNIT,
                value: v,
            })?),
            None => None,
        };
        let tenant = TenantSettings {
            id: tenant_id,
            code: get(ENV_TENANT_CODE).unwrap_or(defaults.tenant.code),
            name: get(ENV_TENANT_NAME),
            locale: get(ENV_TENANT_LOCALE),
            currency: get(ENV_TENANT_CURRENCY),
            weight_unit,
        };

        Ok(Self {
            policy: SyncPolicy { enabled, max_attempts },
            run_interval: Duration::from_secs(run_interval_secs),
            carrier: CarrierConfig {
                name: get(ENV_CARRIER_NAME).unwrap_or(defaults.carrier.name),
                api_url,
                api_key,
                timeout: Duration::from_secs(timeout_secs),
            },
            database_url: get(ENV_DATABASE_URL),
            listen_addr,
            log_format,
            tenant,
        })
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { key, value: v }),
        None => Ok(default),
    }
}
