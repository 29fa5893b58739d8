//! Typed configuration from environment variables or a TOML file.
//!
//! Loads once at startup and fails fast on missing or invalid values.
//! The broker credential is wrapped in `SecretString` so it never shows
//! up in logs or `Debug` output.

pub mod secrets;

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::distributor::DistributorSettings;
use crate::error::{Error, Result};
use crate::model::ProgramBundle;
use secrets::SecretString;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9933;
pub const DEFAULT_NAME: &str = "slowsquare";
pub const DEFAULT_APP_MD5: &str = "8e892921ccf4ab68af29d65b82a9f60e";
pub const DEFAULT_APP_URL: &str = "http://dl.dropbox.com/s/sylt8mzjp2vlzui/slowsquare-20120515.app";
pub const DEFAULT_APP_NAME: &str = "slowsquare.app";
pub const DEFAULT_UPLOAD: &str = "data:";
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub credential: SecretString,
    /// Distributor name: sent in `HELLO` and used as the workunit id prefix.
    pub name: String,
    pub bundle: ProgramBundle,
    pub upload: String,
    pub send_timeout: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("DISTSERVER_PORT") {
            Ok(p) => p
                .parse()
                .map_err(|_| Error::Config(format!("DISTSERVER_PORT is not a port: {p:?}")))?,
            Err(_) => DEFAULT_PORT,
        };
        let send_timeout_secs = match std::env::var("SEND_TIMEOUT_SECS") {
            Ok(s) => s
                .parse()
                .map_err(|_| Error::Config(format!("SEND_TIMEOUT_SECS is not a number: {s:?}")))?,
            Err(_) => DEFAULT_SEND_TIMEOUT_SECS,
        };

        let config = Self {
            host: var_or("DISTSERVER_HOST", DEFAULT_HOST),
            port,
            credential: SecretString::from(required_var("DISTSERVER_KEY")?),
            name: var_or("DISTRIBUTOR_NAME", DEFAULT_NAME),
            bundle: ProgramBundle {
                fingerprint: var_or("APP_MD5", DEFAULT_APP_MD5),
                address: var_or("APP_URL", DEFAULT_APP_URL),
                file_name: var_or("APP_NAME", DEFAULT_APP_NAME),
            },
            upload: var_or("UPLOAD_SCHEME", DEFAULT_UPLOAD),
            send_timeout: Duration::from_secs(send_timeout_secs),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: var_or("LOG_LEVEL", "info"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// ```toml
    /// [server]
    /// host = "localhost"
    /// port = 9933
    /// key = "..."
    ///
    /// [distributor]
    /// name = "slowsquare"
    ///
    /// [app]
    /// md5 = "..."
    /// url = "http://..."
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| Error::Config(format!("bad config: {e}")))?;

        let config = Self {
            host: file.server.host,
            port: file.server.port,
            credential: SecretString::from(file.server.key),
            name: file.distributor.name,
            bundle: ProgramBundle {
                fingerprint: file.app.md5,
                address: file.app.url,
                file_name: file.app.name,
            },
            upload: file.distributor.upload,
            send_timeout: Duration::from_secs(file.server.send_timeout_secs),
            otel_endpoint: file.telemetry.endpoint,
            log_level: file.telemetry.log_level,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("broker host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("broker port must be non-zero".to_string()));
        }
        if self.name.is_empty() || self.name.contains(char::is_whitespace) {
            return Err(Error::Config(format!(
                "distributor name must be a single non-empty word: {:?}",
                self.name
            )));
        }
        Ok(())
    }

    /// The identity the state machine presents to the broker.
    pub fn distributor_settings(&self) -> DistributorSettings {
        DistributorSettings {
            name: self.name.clone(),
            credential: self.credential.clone(),
            bundle: self.bundle.clone(),
            upload: self.upload.clone(),
        }
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

// ---------------------------------------------------------------------------
// TOML layout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ConfigFile {
    server: ServerSection,
    #[serde(default)]
    distributor: DistributorSection,
    #[serde(default)]
    app: AppSection,
    #[serde(default)]
    telemetry: TelemetrySection,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    key: String,
    #[serde(default = "default_send_timeout")]
    send_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DistributorSection {
    name: String,
    upload: String,
}

impl Default for DistributorSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            upload: DEFAULT_UPLOAD.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AppSection {
    md5: String,
    url: String,
    name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            md5: DEFAULT_APP_MD5.to_string(),
            url: DEFAULT_APP_URL.to_string(),
            name: DEFAULT_APP_NAME.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct TelemetrySection {
    endpoint: Option<String>,
    log_level: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_send_timeout() -> u64 {
    DEFAULT_SEND_TIMEOUT_SECS
}
