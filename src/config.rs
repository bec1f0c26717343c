use std::env;
use std::time::Duration;

use log::warn;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_PINECONE_CONTROLLER_URL: &str = "https://api.pinecone.io";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub environment: String,
    pub index: String,
    /// Data plane host; looked up through the controller when absent.
    pub index_host: Option<String>,
    pub controller_url: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub completion_model: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Validated process configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub pinecone: PineconeConfig,
    pub openai: OpenAiConfig,
    pub top_k: usize,
    pub max_duration: Duration,
    pub bind_address: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let pinecone = PineconeConfig {
            api_key: required("PINECONE_API_KEY")?,
            environment: required("PINECONE_ENVIRONMENT")?,
            index: required("PINECONE_INDEX")?,
            index_host: lookup("PINECONE_INDEX_HOST").filter(|h| !h.trim().is_empty()),
            controller_url: lookup("PINECONE_CONTROLLER_URL")
                .unwrap_or_else(|| DEFAULT_PINECONE_CONTROLLER_URL.to_string()),
        };

        let openai = OpenAiConfig {
            api_key: required("OPENAI_API_KEY")?,
            base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            embedding_model: lookup("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            completion_model: lookup("COMPLETION_MODEL")
                .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
            temperature: parse_or(&lookup, "TEMPERATURE", 0.7),
            max_tokens: parse_or(&lookup, "MAX_TOKENS", 256),
        };

        Ok(Self {
            pinecone,
            openai,
            top_k: parse_or(&lookup, "RETRIEVAL_TOP_K", 4),
            max_duration: Duration::from_secs(parse_or(&lookup, "MAX_DURATION_SECS", 60)),
            bind_address: lookup("BIND_ADDRESS")
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
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

    const REQUIRED: &[(&str, &str)] = &[
        ("PINECONE_API_KEY", "pc-key"),
        ("PINECONE_ENVIRONMENT", "us-east-1"),
        ("PINECONE_INDEX", "musicians"),
        ("OPENAI_API_KEY", "sk-test"),
    ];

    #[test]
    fn defaults_apply_when_only_required_values_are_set() {
        let config = Config::from_lookup(lookup_from(REQUIRED)).unwrap();

        assert_eq!(config.pinecone.index, "musicians");
        assert_eq!(config.pinecone.index_host, None);
        assert_eq!(config.pinecone.controller_url, "https://api.pinecone.io");
        assert_eq!(config.openai.embedding_model, "text-embedding-3-small");
        assert_eq!(config.openai.completion_model, "gpt-3.5-turbo-instruct");
        assert_eq!(config.top_k, 4);
        assert_eq!(config.max_duration, Duration::from_secs(60));
        assert_eq!(config.bind_address, "127.0.0.1:8080");
    }

    #[test]
    fn each_missing_required_variable_is_fatal() {
        for (missing, _) in REQUIRED {
            let pairs: Vec<_> = REQUIRED
                .iter()
                .copied()
                .filter(|(k, _)| k != missing)
                .collect();
            let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
            assert_eq!(err, ConfigError::Missing(*missing));
        }
    }

    #[test]
    fn blank_required_variable_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[2] = ("PINECONE_INDEX", "   ");
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert_eq!(err.to_string(), "PINECONE_INDEX must be set");
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RETRIEVAL_TOP_K", "lots"));
        pairs.push(("TEMPERATURE", "0.2"));
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.top_k, 4);
        assert!((config.openai.temperature - 0.2).abs() < f32::EPSILON);
    }
}
