use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub http: HttpSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpSettings {
    pub bind_address: SocketAddr,
    #[serde(default)]
    pub cors: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub models_dir: String,
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Reads `<path>.toml`; `MODELPANEL__<SECTION>__<KEY>` variables override it.
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder =
            Config::builder()
                .add_source(File::with_name(path).required(true))
                .add_source(Environment::with_prefix("MODELPANEL").try_parsing(true).separator("__"));
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_bundled_settings() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/settings");
        let config = AppConfig::new(path).unwrap();
        assert_eq!(config.http.bind_address.port(), 3000);
        assert_eq!(config.storage.models_dir, "models");
        assert_eq!(config.storage.data_dir, "data");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AppConfig::new("config/does-not-exist").is_err());
    }
}
