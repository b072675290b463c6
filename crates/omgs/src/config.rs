//! Configuration management for the OMGS server.
//!
//! This module handles loading, validation, and conversion of server configuration
//! from TOML files and command-line arguments.

use game_server::{ServerConfig, WorkerSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Default for max_connections
fn default_max_connections() -> usize {
    1000
}

/// Default for outbound_queue_capacity
fn default_outbound_queue_capacity() -> usize {
    256
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64KB
}

fn default_max_json_depth() -> usize {
    32
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_workers() -> Vec<WorkerSettings> {
    vec![
        WorkerSettings {
            script: "echo".to_string(),
            address: "/echo".to_string(),
        },
        WorkerSettings {
            script: "chat".to_string(),
            address: "/chat".to_string(),
        },
    ]
}

/// Application configuration loaded from TOML file.
///
/// This is the main configuration structure that encompasses all server settings
/// including networking, event buses, logging, and the script workers to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    pub server: ServerSettings,
    /// Event bus and handler queue settings
    #[serde(default)]
    pub bus: BusSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
    /// Script workers started at boot, one `[[workers]]` table each
    #[serde(default = "default_workers")]
    pub workers: Vec<WorkerSettings>,
}

/// Server-specific configuration settings.
///
/// Controls network binding, connection limits and per-message limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Frames buffered per connection before outbound messages are dropped
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    /// Largest accepted message in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Deepest accepted nesting of arrays and objects in a message
    #[serde(default = "default_max_json_depth")]
    pub max_json_depth: usize,
}

/// Queue capacities of the event buses and handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSettings {
    /// Queue capacity of each plain runtime-bus subscription (external consumers)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Mailbox capacity of each handler
    #[serde(default = "default_queue_capacity")]
    pub mailbox_capacity: usize,
}

/// Logging system configuration.
///
/// Controls log output format and level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

/// A script worker bound to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Built-in script name (`echo` or `chat`)
    pub script: String,
    /// Address clients connect to, e.g. `/chat`
    pub address: String,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            mailbox_capacity: default_queue_capacity(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:8080".to_string(),
                max_connections: default_max_connections(),
                outbound_queue_capacity: default_outbound_queue_capacity(),
                max_message_size: default_max_message_size(),
                max_json_depth: default_max_json_depth(),
            },
            bus: BusSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
            workers: default_workers(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the specified path
    /// and returns the default configuration.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config file
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a game server configuration.
    ///
    /// # Errors
    ///
    /// Fails if the bind address does not parse.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            bus_queue_capacity: self.bus.queue_capacity,
            handler_mailbox_capacity: self.bus.mailbox_capacity,
            outbound_queue_capacity: self.server.outbound_queue_capacity,
            codec: game_server::messaging::CodecLimits {
                max_message_size: self.server.max_message_size,
                max_json_depth: self.server.max_json_depth,
            },
            workers: self
                .workers
                .iter()
                .map(|worker| WorkerSpec::new(&worker.script, &worker.address))
                .collect(),
        })
    }

    /// Validates the configuration, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        // Validate bind address
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        let capacities = [
            ("server.max_connections", self.server.max_connections),
            ("server.outbound_queue_capacity", self.server.outbound_queue_capacity),
            ("server.max_message_size", self.server.max_message_size),
            ("server.max_json_depth", self.server.max_json_depth),
            ("bus.queue_capacity", self.bus.queue_capacity),
            ("bus.mailbox_capacity", self.bus.mailbox_capacity),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(format!("{name} must be greater than 0"));
            }
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        let mut addresses = HashSet::new();
        for worker in &self.workers {
            if worker.script.trim().is_empty() {
                return Err(format!("Worker on {} has no script", worker.address));
            }
            if !worker.address.starts_with('/') {
                return Err(format!("Worker address must start with '/': {}", worker.address));
            }
            if !addresses.insert(worker.address.as_str()) {
                return Err(format!("Duplicate worker address: {}", worker.address));
            }
        }

        Ok(())
    }
}
