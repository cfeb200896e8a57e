//! Configuration management for the Verification API
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use attest_common::{countries, DisclosureField, DisclosurePreferences};
use std::env;

/// Where disclosure preferences are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// One policy for every user, taken from configuration
    Static,
    /// Process-local map, lost on restart
    Memory,
    /// Redis at the given URL
    Redis(String),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Name shown to the user in the companion app
    pub app_name: String,

    /// Scope the proofs are bound to
    pub scope: String,

    /// Public base URL of this service
    pub endpoint: String,

    /// Accept proofs generated from mock passports
    pub mock_passport: bool,

    /// Base URL of the proof verifier
    pub verifier_url: String,

    /// Preference storage backend
    pub store: StoreBackend,

    /// Policy applied when no per-user preferences are stored
    pub default_preferences: DisclosurePreferences,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());
        let store = match var("PREFERENCE_STORE", "").to_lowercase().as_str() {
            "" => match redis_url {
                Some(url) => StoreBackend::Redis(url),
                None => StoreBackend::Static,
            },
            "static" => StoreBackend::Static,
            "memory" => StoreBackend::Memory,
            "redis" => StoreBackend::Redis(
                redis_url.unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            ),
            other => anyhow::bail!("Unknown PREFERENCE_STORE: {}", other),
        };

        let minimum_age = match lookup("MINIMUM_AGE") {
            Some(age) if age.trim().is_empty() => None,
            Some(age) => Some(age.trim().parse::<u32>().context("Invalid MINIMUM_AGE")?),
            None => Some(15),
        };

        let mut default_preferences = DisclosurePreferences {
            minimum_age,
            ofac: parse_bool(&var("OFAC_CHECK", "false")).context("Invalid OFAC_CHECK")?,
            excluded_countries: split_list(&var("EXCLUDED_COUNTRIES", "North Korea"))
                .map(|country| {
                    countries::canonical_name(country)
                        .map(str::to_string)
                        .unwrap_or_else(|| country.to_string())
                })
                .collect(),
            ..Default::default()
        };

        for field in split_list(&var("DISCLOSE_FIELDS", "")) {
            let field: DisclosureField = field.parse().context("Invalid DISCLOSE_FIELDS")?;
            default_preferences.set_disclosure(field, true);
        }

        let config = Config {
            api_host: var("API_HOST", "0.0.0.0"),

            api_port: var("API_PORT", "3000")
                .parse()
                .context("Invalid API_PORT")?,

            app_name: var("SELF_APP_NAME", "Self Workshop"),

            scope: var("SELF_SCOPE", "self-workshop"),

            endpoint: var("SELF_ENDPOINT", "http://localhost:3000"),

            mock_passport: parse_bool(&var("SELF_ENABLE_MOCK_PASSPORT", "false"))
                .context("Invalid SELF_ENABLE_MOCK_PASSPORT")?,

            verifier_url: var("VERIFIER_URL", "http://127.0.0.1:8090"),

            store,

            default_preferences,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.scope.trim().is_empty() {
            anyhow::bail!("SELF_SCOPE must not be empty");
        }

        if !self.verifier_url.starts_with("http://") && !self.verifier_url.starts_with("https://")
        {
            anyhow::bail!("VERIFIER_URL must be an http(s) URL");
        }

        if let Some(age) = self.default_preferences.minimum_age {
            if age > 150 {
                anyhow::bail!("MINIMUM_AGE must be at most 150");
            }
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// URL the companion app posts proofs to
    pub fn verify_endpoint(&self) -> String {
        format!("{}/api/verify", self.endpoint.trim_end_matches('/'))
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {:?}", other),
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}
