//! # OMGS - Main Entry Point
//!
//! Script-driven multiplayer game server. This entry point handles CLI
//! parsing, configuration loading, and application lifecycle management.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! omgs
//!
//! # Specify custom configuration
//! omgs --config production.toml
//!
//! # Override specific settings
//! omgs --bind 0.0.0.0:8080 --log-level debug
//!
//! # JSON logging for production
//! omgs --json-logs
//! ```
//!
//! ## Configuration
//!
//! The server loads configuration from a TOML file (default: `config.toml`).
//! If the file doesn't exist, a default configuration will be created:
//!
//! ```toml
//! [server]
//! bind_address = "127.0.0.1:8080"
//! max_connections = 1000
//!
//! [bus]
//! queue_capacity = 10000     # external bus subscriptions
//! mailbox_capacity = 10000   # gateway and runtime handler mailboxes
//!
//! [logging]
//! level = "info"
//! json_format = false
//!
//! [[workers]]
//! script = "chat"
//! address = "/chat"
//! ```
//!
//! ## Signal Handling
//!
//! The server handles graceful shutdown on:
//! - SIGINT (Ctrl+C)
//! - SIGTERM (Unix systems)

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;

/// Main entry point for the server.
///
/// Handles the complete application lifecycle including:
/// 1. Command-line argument parsing
/// 2. Configuration loading and validation
/// 3. Logging system initialization
/// 4. Application creation and execution
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
///
/// Called from `main` inside the tokio runtime.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Load configuration to get logging settings
    let mut logging_settings = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default()
        .logging;
    if let Some(level) = &args.log_level {
        logging_settings.level = level.clone();
    }

    // Setup logging before anything else
    if let Err(e) = logging::setup_logging(&logging_settings, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

// Re-export main types for potential library usage
pub use config::{AppConfig, BusSettings, LoggingSettings, ServerSettings, WorkerSettings};
