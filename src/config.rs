use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,
    pub db_max_connections: u32,
    pub api_prefix: String,

    // Presentation
    pub app_name: String,
    pub currency: String,
    pub responsive_inject: bool,

    // Rate limiting
    pub rate_form_per_min: u32,
    pub rate_api_per_min: u32,

    // Attrition model
    pub attrition_epochs: usize,
    pub attrition_learning_rate: f64,
    pub attrition_seed: u64,
    pub prediction_cache_ttl: u64,

    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

        Ok(Self {
            database_url,
            server_addr: lookup("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),

            app_name: lookup("APP_NAME").unwrap_or_else(|| "HR Portal".to_string()),
            currency: lookup("CURRENCY").unwrap_or_else(|| "USD".to_string()),
            responsive_inject: parse_or(&lookup, "RESPONSIVE_INJECT", true)?,

            rate_form_per_min: parse_or(&lookup, "RATE_FORM_PER_MIN", 120)?,
            rate_api_per_min: parse_or(&lookup, "RATE_API_PER_MIN", 600)?,

            attrition_epochs: parse_or(&lookup, "ATTRITION_EPOCHS", 150)?,
            attrition_learning_rate: parse_or(&lookup, "ATTRITION_LEARNING_RATE", 0.05)?,
            attrition_seed: parse_or(&lookup, "ATTRITION_SEED", 42)?,
            prediction_cache_ttl: parse_or(&lookup, "PREDICTION_CACHE_TTL", 600)?,

            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("mysql://hr:hr@127.0.0.1:3306/hr_test".to_string()),
        _ => None,
    })
    .expect("test config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "mysql://x")])).unwrap();
        assert_eq!(config.server_addr, "127.0.0.1:8080");
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.db_max_connections, 10);
        assert!(config.responsive_inject);
        assert_eq!(config.attrition_epochs, 150);
        assert_eq!(config.attrition_seed, 42);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://x"),
            ("RESPONSIVE_INJECT", "false"),
            ("ATTRITION_LEARNING_RATE", "0.1"),
            ("CURRENCY", "EUR"),
        ]))
        .unwrap();
        assert!(!config.responsive_inject);
        assert_eq!(config.attrition_learning_rate, 0.1);
        assert_eq!(config.currency, "EUR");
    }

    #[test]
    fn malformed_number_names_the_variable() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://x"),
            ("RATE_FORM_PER_MIN", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("RATE_FORM_PER_MIN"));
    }
}
