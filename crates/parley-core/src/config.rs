use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ParleyError, Result};

/// Default chat-completion temperature used when a provider entry doesn't
/// override it.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Top-level config (parley.toml + PARLEY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub jokes: JokeGeneratorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for ParleyConfig {
    fn default() -> Self {
        Self {
            providers: ProvidersConfig::default(),
            memory: MemoryConfig::default(),
            jokes: JokeGeneratorConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// One API-key-and-model slot. Shared shape for every backend named in
/// `GeneralParams::ai_backend` (gemini_flash, grok, gemma, codex) plus the
/// dedicated Anthropic slot used for the router's own tier-1/tier-2 calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSlotConfig {
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_base_url() -> Option<String> {
    None
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl ProviderSlotConfig {
    fn validate(&self, field: &str) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ParleyError::Config(format!(
                "{field}.temperature must be in [0.0, 2.0], got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub anthropic: Option<ProviderSlotConfig>,
    pub gemini_flash: Option<ProviderSlotConfig>,
    pub grok: Option<ProviderSlotConfig>,
    pub gemma: Option<ProviderSlotConfig>,
    pub codex: Option<ProviderSlotConfig>,
}

impl ProvidersConfig {
    fn validate(&self) -> Result<()> {
        let slots: [(&str, &Option<ProviderSlotConfig>); 5] = [
            ("providers.anthropic", &self.anthropic),
            ("providers.gemini_flash", &self.gemini_flash),
            ("providers.grok", &self.grok),
            ("providers.gemma", &self.gemma),
            ("providers.codex", &self.codex),
        ];
        for (field, slot) in slots {
            if let Some(slot) = slot {
                slot.validate(field)?;
            }
        }
        Ok(())
    }
}

/// Distributed cache + durable storage connection settings (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_sqlite_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.parley/parley.db")
}

/// Configuration for the sample-joke pool used by routes described only to
/// dispatch depth (see the glossary's JOKE_ROUTE entry) — carried here even
/// though the generator itself lives outside this crate's implemented
/// surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JokeGeneratorConfig {
    #[serde(default = "default_joke_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_joke_sample_exponent")]
    pub sample_exponent: f64,
}

impl Default for JokeGeneratorConfig {
    fn default() -> Self {
        Self {
            pool_size: default_joke_pool_size(),
            sample_exponent: default_joke_sample_exponent(),
        }
    }
}

fn default_joke_pool_size() -> usize {
    64
}

fn default_joke_sample_exponent() -> f64 {
    1.0
}

/// Ambient observability shape. The actual exporter is plain `tracing`
/// spans; these fields exist so a future OTLP exporter has somewhere to
/// read `service_name`/`endpoint` from without a config migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    pub endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            endpoint: None,
        }
    }
}

fn default_service_name() -> String {
    "parley".to_string()
}

impl ParleyConfig {
    /// Load config from a TOML file with PARLEY_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.parley/parley.toml
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ParleyConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PARLEY_").split("_"))
            .extract()
            .map_err(|e| ParleyError::Config(e.to_string()))?;

        config.providers.validate()?;
        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.parley/parley.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_temperature() {
        let slot = ProviderSlotConfig {
            api_key: "k".into(),
            model: "m".into(),
            base_url: None,
            temperature: 2.5,
        };
        assert!(slot.validate("providers.anthropic").is_err());
    }

    #[test]
    fn accepts_boundary_temperatures() {
        for t in [0.0, 2.0] {
            let slot = ProviderSlotConfig {
                api_key: "k".into(),
                model: "m".into(),
                base_url: None,
                temperature: t,
            };
            assert!(slot.validate("providers.anthropic").is_ok());
        }
    }
}
