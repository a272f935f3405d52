use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::lifecycle::DEFAULT_MIN_EXTRACTION_CONFIDENCE;
use crate::services::store::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct FinancingConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub store: StoreConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(anyhow::anyhow!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis_url: Secret<String>,
    pub retry_initial_ms: u64,
    pub retry_max_elapsed_ms: u64,
}

impl StoreConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(self.retry_initial_ms),
            max_elapsed: Duration::from_millis(self.retry_max_elapsed_ms),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorBackend {
    /// Deterministic, content-hash driven. No network.
    Simulated,
    /// JSON over HTTP to `endpoint`.
    Remote,
}

impl FromStr for ExtractorBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" => Ok(ExtractorBackend::Simulated),
            "remote" => Ok(ExtractorBackend::Remote),
            other => Err(anyhow::anyhow!("unknown extractor backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub backend: ExtractorBackend,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    /// Drafts below this confidence fall back to manual entry.
    pub min_confidence: f64,
}

impl FinancingConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let backend = get_env("FINANCING_EXTRACTOR_BACKEND", Some("simulated"), is_prod)?;
        let backend = parse("FINANCING_EXTRACTOR_BACKEND", &backend)?;
        let endpoint = match backend {
            ExtractorBackend::Remote => Some(get_env("FINANCING_EXTRACTOR_URL", None, is_prod)?),
            ExtractorBackend::Simulated => env::var("FINANCING_EXTRACTOR_URL").ok(),
        };

        let min_confidence: f64 = parse(
            "FINANCING_EXTRACTION_MIN_CONFIDENCE",
            &get_env(
                "FINANCING_EXTRACTION_MIN_CONFIDENCE",
                Some(&DEFAULT_MIN_EXTRACTION_CONFIDENCE.to_string()),
                is_prod,
            )?,
        )?;
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "FINANCING_EXTRACTION_MIN_CONFIDENCE must be within [0, 1], got {}",
                min_confidence
            )));
        }

        Ok(FinancingConfig {
            common,
            service_name: "financing-service".to_string(),
            store: StoreConfig {
                backend: parse(
                    "FINANCING_STORE_BACKEND",
                    &get_env("FINANCING_STORE_BACKEND", Some("memory"), is_prod)?,
                )?,
                redis_url: Secret::new(get_env(
                    "FINANCING_REDIS_URL",
                    Some("redis://localhost:6379"),
                    is_prod,
                )?),
                retry_initial_ms: parse(
                    "FINANCING_STORE_RETRY_INITIAL_MS",
                    &get_env("FINANCING_STORE_RETRY_INITIAL_MS", Some("50"), is_prod)?,
                )?,
                retry_max_elapsed_ms: parse(
                    "FINANCING_STORE_RETRY_MAX_ELAPSED_MS",
                    &get_env("FINANCING_STORE_RETRY_MAX_ELAPSED_MS", Some("3000"), is_prod)?,
                )?,
            },
            extraction: ExtractionConfig {
                backend,
                endpoint,
                timeout_secs: parse(
                    "FINANCING_EXTRACTOR_TIMEOUT_SECS",
                    &get_env("FINANCING_EXTRACTOR_TIMEOUT_SECS", Some("30"), is_prod)?,
                )?,
                min_confidence,
            },
        })
    }

    /// In-memory store, simulated extractor, ephemeral port.
    pub fn local() -> Self {
        FinancingConfig {
            common: core_config::Config {
                port: 0,
                ..Default::default()
            },
            service_name: "financing-service".to_string(),
            store: StoreConfig {
                backend: StoreBackend::Memory,
                redis_url: Secret::new("redis://localhost:6379".to_string()),
                retry_initial_ms: 50,
                retry_max_elapsed_ms: 3000,
            },
            extraction: ExtractionConfig {
                backend: ExtractorBackend::Simulated,
                endpoint: None,
                timeout_secs: 30,
                min_confidence: DEFAULT_MIN_EXTRACTION_CONFIDENCE,
            },
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(" Redis ".parse::<StoreBackend>().unwrap(), StoreBackend::Redis);
        assert!("mongo".parse::<StoreBackend>().is_err());

        assert_eq!(
            "remote".parse::<ExtractorBackend>().unwrap(),
            ExtractorBackend::Remote
        );
        assert!("ocr".parse::<ExtractorBackend>().is_err());
    }

    #[test]
    fn test_parse_reports_key() {
        let err = parse::<u64>("FINANCING_EXTRACTOR_TIMEOUT_SECS", "soon").unwrap_err();
        assert!(err.to_string().contains("FINANCING_EXTRACTOR_TIMEOUT_SECS"));
        assert_eq!(parse::<u64>("X", " 30 ").unwrap(), 30);
    }

    #[test]
    fn test_get_env_default_outside_prod() {
        let value = get_env("FINANCING_TEST_UNSET_KEY_7F3A", Some("fallback"), false).unwrap();
        assert_eq!(value, "fallback");
        assert!(get_env("FINANCING_TEST_UNSET_KEY_7F3A", None, false).is_err());
        assert!(get_env("FINANCING_TEST_UNSET_KEY_7F3A", Some("fallback"), true).is_err());
    }

    #[test]
    fn test_local_config_retry_policy() {
        let config = FinancingConfig::local();
        assert_eq!(config.common.port, 0);
        let policy = config.store.retry_policy();
        assert_eq!(policy.initial_interval, Duration::from_millis(50));
        assert_eq!(policy.max_elapsed, Duration::from_secs(3));
    }
}
