//! # Configuration Management
//!
//! Centralized configuration for the multiplexer.
//!
//! A configuration is an immutable snapshot consumed once when a multiplexer
//! (or outbound client) is dialed. Changing it requires a close/dial cycle;
//! [`MuxConfig`]'s equality tells a bootstrap layer whether that is needed.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - TOML strings via `from_toml()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! ## Example
//! ```toml
//! [mux]
//! addresses = ["127.0.0.1:4242"]
//! packet_size = 1024
//! middlewares = ["lz4"]
//! server_protocol = "udp"
//! ```

use crate::core::middleware;
use crate::error::{MuxError, Result};
use crate::transport::TransportKind;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Max allowed payload size (e.g. 16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Default maximum packet size in bytes
pub const DEFAULT_PACKET_SIZE: usize = 1024;

/// Default zstd compression level
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 1;

/// Main configuration document with one namespace per service
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Multiplexer configuration
    #[serde(default)]
    pub mux: MuxConfig,

    /// Outbound-only client configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| MuxError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| MuxError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| MuxError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    ///
    /// Malformed values are reported rather than silently ignored.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addresses) = std::env::var("PACKET_MUX_ADDRESSES") {
            config.mux.addresses = split_list(&addresses);
        }

        if let Ok(size) = std::env::var("PACKET_MUX_PACKET_SIZE") {
            let size = size.parse::<usize>().map_err(|_| {
                MuxError::ConfigError(format!("PACKET_MUX_PACKET_SIZE invalid: '{size}'"))
            })?;
            config.mux.packet_size = size;
            config.client.packet_size = size;
        }

        if let Ok(middlewares) = std::env::var("PACKET_MUX_MIDDLEWARES") {
            config.mux.middlewares = split_list(&middlewares);
            config.client.middlewares = config.mux.middlewares.clone();
        }

        if let Ok(protocol) = std::env::var("PACKET_MUX_SERVER_PROTOCOL") {
            config.mux.server_protocol = protocol.parse()?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MuxError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| MuxError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.mux.validate());
        errors.extend(self.client.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        into_result(self.validate())
    }
}

/// Multiplexer configuration
///
/// `addresses`, `packet_size` and `middlewares` are required when parsed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MuxConfig {
    /// Local bind targets (e.g., "127.0.0.1:4242")
    pub addresses: Vec<String>,

    /// Maximum payload size in bytes, both directions
    pub packet_size: usize,

    /// Ordered codec names
    pub middlewares: Vec<String>,

    /// Transport kind ("udp" or "tcp")
    #[serde(default)]
    pub server_protocol: TransportKind,

    /// Zstd compression level (when the zstd middleware is enabled)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    /// Send from a random bound local socket instead of a pooled one (udp only)
    #[serde(default)]
    pub spread_outbound: bool,

    /// Upper bound on concurrently processed packets; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            addresses: vec![String::from("127.0.0.1:4242")],
            packet_size: DEFAULT_PACKET_SIZE,
            middlewares: Vec::new(),
            server_protocol: TransportKind::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            spread_outbound: false,
            max_in_flight: None,
        }
    }
}

/// Two configurations are equal when addresses, middlewares (both in order)
/// and packet size match.
impl PartialEq for MuxConfig {
    fn eq(&self, rhs: &Self) -> bool {
        self.addresses == rhs.addresses
            && self.middlewares == rhs.middlewares
            && self.packet_size == rhs.packet_size
    }
}

impl MuxConfig {
    /// Validate multiplexer configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.addresses.is_empty() {
            errors.push("At least one address is required".to_string());
        }
        for address in &self.addresses {
            if let Some(error) = validate_address(address) {
                errors.push(error);
            }
        }

        errors.extend(validate_packet_size(self.packet_size));
        errors.extend(validate_middlewares(
            &self.middlewares,
            self.compression_level,
        ));

        if self.spread_outbound && self.server_protocol != TransportKind::Udp {
            errors.push("spread_outbound requires server_protocol 'udp'".to_string());
        }

        if self.max_in_flight == Some(0) {
            errors.push("max_in_flight must be greater than 0 when set".to_string());
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        into_result(self.validate())
    }
}

/// Outbound-only client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Ordered codec names
    pub middlewares: Vec<String>,

    /// Maximum payload size in bytes
    pub packet_size: usize,

    /// Transport used to dial destinations ("udp" or "tcp")
    #[serde(default)]
    pub client_protocol: TransportKind,

    /// Zstd compression level (when the zstd middleware is enabled)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            middlewares: Vec::new(),
            packet_size: DEFAULT_PACKET_SIZE,
            client_protocol: TransportKind::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl PartialEq for ClientConfig {
    fn eq(&self, rhs: &Self) -> bool {
        self.middlewares == rhs.middlewares && self.packet_size == rhs.packet_size
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(validate_packet_size(self.packet_size));
        errors.extend(validate_middlewares(
            &self.middlewares,
            self.compression_level,
        ));
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        into_result(self.validate())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("packet-mux"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

fn default_compression_level() -> i32 {
    DEFAULT_COMPRESSION_LEVEL
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn into_result(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(MuxError::ConfigError(format!(
            "Configuration validation failed:\n  - {}",
            errors.join("\n  - ")
        )))
    }
}

/// Accepts `host:port` and `[v6]:port`; host names are resolved at bind time.
fn validate_address(address: &str) -> Option<String> {
    if address.is_empty() {
        return Some("Address cannot be empty".to_string());
    }
    if address.parse::<std::net::SocketAddr>().is_ok() {
        return None;
    }
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => None,
        _ => Some(format!(
            "Invalid address format: '{address}' (expected format: '127.0.0.1:4242')"
        )),
    }
}

fn validate_packet_size(packet_size: usize) -> Vec<String> {
    let mut errors = Vec::new();
    if packet_size == 0 {
        errors.push("Packet size cannot be 0".to_string());
    } else if packet_size > MAX_PAYLOAD_SIZE {
        errors.push(format!(
            "Packet size too large: {packet_size} bytes (maximum: {MAX_PAYLOAD_SIZE})"
        ));
    }
    errors
}

fn validate_middlewares(middlewares: &[String], compression_level: i32) -> Vec<String> {
    let mut errors = Vec::new();
    for name in middlewares {
        if !middleware::is_known(name) {
            errors.push(format!(
                "Unknown middleware: '{name}' (known: {})",
                middleware::known_names().collect::<Vec<_>>().join(", ")
            ));
        }
    }
    if middlewares.iter().any(|name| name == "zstd") && !(1..=22).contains(&compression_level) {
        errors.push(format!(
            "Invalid compression level: {compression_level} (valid range: 1-22)"
        ));
    }
    errors
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
