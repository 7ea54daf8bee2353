use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::services::behavior_classifier::ClassifierThresholds;
use crate::services::hint_cache::DEFAULT_CACHE_NAMESPACE;

pub const DEFAULT_HINT_API_TIMEOUT_MS: u64 = 8000;

/// Where the durable hint tier lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurableBackend {
    Redis,
    Memory,
}

impl FromStr for DurableBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown durable backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HintSettings {
    pub cache_namespace: String,
    pub durable_backend: DurableBackend,
}

impl Default for HintSettings {
    fn default() -> Self {
        Self {
            cache_namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
            durable_backend: DurableBackend::Redis,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub hint_api_url: String,
    pub hint_api_timeout_ms: u64,
    pub bind_addr: String,
    /// `username:password` guarding `/metrics`.
    pub metrics_auth: String,
    pub hints: HintSettings,
    pub classifier: ClassifierThresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            redis_uri: "redis://127.0.0.1:6379/0".to_string(),
            mongo_database: "mathpractice".to_string(),
            hint_api_url: "http://localhost:8000".to_string(),
            hint_api_timeout_ms: DEFAULT_HINT_API_TIMEOUT_MS,
            bind_addr: "0.0.0.0:8081".to_string(),
            metrics_auth: "admin:changeme".to_string(),
            hints: HintSettings::default(),
            classifier: ClassifierThresholds::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml, then APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or(defaults.mongo_uri);

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or(defaults.redis_uri);

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or(defaults.mongo_database);

        let hint_api_url = settings
            .get_string("hint_api.url")
            .or_else(|_| env::var("HINT_API_URL"))
            .unwrap_or(defaults.hint_api_url);

        let hint_api_timeout_ms = match settings.get_int("hint_api.timeout_ms") {
            Ok(ms) if ms > 0 => ms as u64,
            Ok(ms) => {
                return Err(config::ConfigError::Message(format!(
                    "hint_api.timeout_ms must be positive, got {}",
                    ms
                )))
            }
            Err(_) => defaults.hint_api_timeout_ms,
        };

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or(defaults.bind_addr);

        let metrics_auth = settings
            .get_string("metrics.auth")
            .or_else(|_| env::var("METRICS_AUTH"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    eprintln!("WARNING: METRICS_AUTH not set, using default credentials");
                }
                defaults.metrics_auth
            });

        let cache_namespace = settings
            .get_string("hints.cache_namespace")
            .unwrap_or(defaults.hints.cache_namespace);

        let durable_backend = match settings.get_string("hints.durable_backend") {
            Ok(raw) => raw.parse().map_err(config::ConfigError::Message)?,
            Err(_) => defaults.hints.durable_backend,
        };

        let classifier = match settings.get::<ClassifierThresholds>("classifier") {
            Ok(thresholds) => thresholds,
            Err(config::ConfigError::NotFound(_)) => defaults.classifier,
            Err(e) => return Err(e),
        };

        Ok(Config {
            mongo_uri,
            redis_uri,
            mongo_database,
            hint_api_url,
            hint_api_timeout_ms,
            bind_addr,
            metrics_auth,
            hints: HintSettings {
                cache_namespace,
                durable_backend,
            },
            classifier,
        })
    }
}
