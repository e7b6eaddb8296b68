use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, ErrorDetails};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_DEADLINE_SECS: u64 = 60;

/// Gateway configuration, loaded from a TOML file or defaulted entirely.
///
/// Secrets (the upstream API key, the activation code allow-list) are
/// read from the environment, never from the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Socket address to bind. Defaults to 0.0.0.0:3000 when unset.
    pub bind_address: Option<SocketAddr>,
    /// When true, raw upstream request/response payloads are included in
    /// error logs.
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: Url,
    /// Deadline for a single upstream generation call, in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base: default_api_base(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_base() -> Url {
    #[expect(clippy::expect_used)]
    let api_base = Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL");
    api_base
}

fn default_deadline_secs() -> u64 {
    DEFAULT_DEADLINE_SECS
}

impl Config {
    pub fn load_from_path(path: &Path) -> Result<Config, Error> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to read config file `{}`: {e}", path.display()),
            })
        })?;
        toml::from_str(&raw).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("Failed to parse config file `{}`: {e}", path.display()),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.gateway.bind_address.is_none());
        assert!(!config.gateway.debug);
        assert_eq!(config.generation.model, DEFAULT_MODEL);
        assert_eq!(config.generation.api_base.as_str(), DEFAULT_API_BASE);
        assert_eq!(config.generation.deadline(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [gateway]
            bind_address = "127.0.0.1:8080"
            debug = true

            [generation]
            model = "gemini-1.5-pro"
            api_base = "http://localhost:9090/v1beta/"
            deadline_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(
            config.gateway.bind_address,
            Some("127.0.0.1:8080".parse().unwrap())
        );
        assert!(config.gateway.debug);
        assert_eq!(config.generation.model, "gemini-1.5-pro");
        assert_eq!(
            config.generation.api_base.as_str(),
            "http://localhost:9090/v1beta/"
        );
        assert_eq!(config.generation.deadline(), Duration::from_secs(10));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [gateway]
            bind_adress = "127.0.0.1:8080"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[generation]\nmodel = \"gemini-2.0-flash\"").unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.generation.model, "gemini-2.0-flash");
        // Everything else falls back to defaults
        assert_eq!(config.generation.deadline_secs, DEFAULT_DEADLINE_SECS);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let error = Config::load_from_path(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(error.to_string().contains("Failed to read config file"));
    }
}
