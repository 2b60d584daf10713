//! Configuration for the `woqu` tool.
//!
//! ```toml
//! default_provider = "deepseek"
//!
//! [providers.deepseek]
//! api_key = "sk-..."
//! api_url = "https://api.deepseek.com/chat/completions"
//! model = "deepseek-chat"
//! temperature = 0.0
//! ```

use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, WoquError};
use crate::executor::DEFAULT_TIMEOUT;
use crate::pipeline::RetryPolicy;
use crate::providers::{ProviderConfig, ProviderName};

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV: &str = "WOQU_CONFIG";

/// One `[providers.<name>]` table
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ProviderSection {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
}

/// Limits for commands this tool runs
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    pub timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Completion retry behavior
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            backoff_ms: policy.backoff.as_millis() as u64,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub default_provider: Option<String>,
    /// Keyed by provider name; unknown names are ignored with a warning
    pub providers: BTreeMap<String, ProviderSection>,
    pub execution: ExecutionConfig,
    pub retry: RetryConfig,
}

impl Config {
    /// Get the default config file path (~/.config/woqu/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("woqu").join("config.toml"))
    }

    /// Load config from `explicit`, `$WOQU_CONFIG` or the default path.
    ///
    /// A missing default file yields the default config so that API keys can
    /// come from the environment alone. A missing file that was asked for by
    /// name is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let requested = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        match requested {
            Some(path) => {
                if !path.exists() {
                    return Err(WoquError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Self::load_from_path(&path)
            }
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_from_path(&path),
                _ => {
                    debug!("no config file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Load config from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)
            .map_err(|e| WoquError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Provider tables whose names this tool knows
    pub fn known_providers(&self) -> BTreeMap<ProviderName, &ProviderSection> {
        let mut known = BTreeMap::new();
        for (key, section) in &self.providers {
            match key.parse::<ProviderName>() {
                Ok(name) => {
                    known.insert(name, section);
                }
                Err(_) => warn!(provider = %key, "ignoring unknown provider in config"),
            }
        }
        known
    }

    /// Resolve the provider to use.
    ///
    /// A requested provider that is not configured falls back to
    /// `default_provider`; if that is not configured either the result is
    /// [`WoquError::InvalidProvider`]. A provider counts as configured when it
    /// has a table or its API key variable is set.
    pub fn provider(
        &self,
        requested: Option<ProviderName>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ProviderConfig> {
        let known = self.known_providers();
        let is_configured = |name: ProviderName| {
            known.contains_key(&name) || non_empty(env(name.api_key_env_var())).is_some()
        };

        if let Some(name) = requested {
            if is_configured(name) {
                return self.resolve(name, known.get(&name).copied(), &env);
            }
        }

        let Some(default) = self.default_provider.as_deref() else {
            return Err(WoquError::InvalidProvider(match requested {
                Some(name) => format!("{name} is not configured and no default_provider is set"),
                None => "no default_provider is set".to_string(),
            }));
        };
        let default_name = default
            .parse::<ProviderName>()
            .map_err(|_| WoquError::InvalidProvider(default.to_string()))?;

        if let Some(name) = requested {
            warn!(requested = %name, default = %default_name, "provider not found in config, using default provider");
        }
        if !is_configured(default_name) {
            return Err(WoquError::InvalidProvider(default_name.to_string()));
        }
        self.resolve(default_name, known.get(&default_name).copied(), &env)
    }

    fn resolve(
        &self,
        name: ProviderName,
        section: Option<&ProviderSection>,
        env: &impl Fn(&str) -> Option<String>,
    ) -> Result<ProviderConfig> {
        let empty = ProviderSection::default();
        let section = section.unwrap_or(&empty);

        let api_key = non_empty(env(name.api_key_env_var()))
            .or_else(|| non_empty(section.api_key.clone()))
            .ok_or_else(|| {
                WoquError::Config(format!(
                    "no API key for {name}: set {} or providers.{name}.api_key",
                    name.api_key_env_var()
                ))
            })?;

        let raw_url = section
            .api_url
            .as_deref()
            .unwrap_or_else(|| name.default_api_url());
        let api_url = Url::parse(raw_url)
            .map_err(|e| WoquError::Config(format!("invalid api_url {raw_url:?}: {e}")))?;

        Ok(ProviderConfig {
            name,
            api_url,
            api_key,
            model: section
                .model
                .clone()
                .unwrap_or_else(|| name.default_model().to_string()),
            temperature: section.temperature.unwrap_or(0.0),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.execution.timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts.max(1),
            backoff: Duration::from_millis(self.retry.backoff_ms),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Generate default config as TOML string
pub fn generate_default_config() -> String {
    let mut out = String::from(
        r#"# woqu configuration
# Place this file at ~/.config/woqu/config.toml (or point WOQU_CONFIG at it)

# Provider used when --provider is not given or is not configured below
default_provider = "deepseek"

"#,
    );

    for name in ProviderName::ALL {
        let enabled = name == ProviderName::DeepSeek;
        let prefix = if enabled { "" } else { "# " };
        out.push_str(&format!("{prefix}[providers.{name}]\n"));
        out.push_str(&format!(
            "{prefix}api_key = \"\"  # or set {}\n",
            name.api_key_env_var()
        ));
        out.push_str(&format!("{prefix}api_url = \"{}\"\n", name.default_api_url()));
        out.push_str(&format!("{prefix}model = \"{}\"\n", name.default_model()));
        out.push_str(&format!("{prefix}temperature = 0.0\n\n"));
    }

    out.push_str(
        r#"[execution]
# Seconds a re-run or confirmed command may take before it is terminated
timeout_secs = 30

[retry]
# Completion attempts before giving up, and the pause between them
max_attempts = 3
backoff_ms = 1000
"#,
    );
    out
}

/// Print the default config to stdout
pub fn print_default_config() {
    print!("{}", generate_default_config());
}
