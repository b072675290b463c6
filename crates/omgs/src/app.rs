//! Main application logic and lifecycle management.
//!
//! This module contains the core `Application` struct that orchestrates
//! server startup, monitoring, and shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{wait_for_shutdown, wait_for_signal, ShutdownCause},
};
use event_bus::ShutdownState;
use game_server::{GameServer, ServerStats};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// How often the monitoring task reports.
const MONITORING_INTERVAL: Duration = Duration::from_secs(60);

/// How long the server gets to drain its handlers after shutdown starts.
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Main application struct.
///
/// The `Application` struct manages the complete lifecycle of the server,
/// including configuration loading, server initialization, health monitoring,
/// and graceful shutdown handling.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Game server instance
    server: Arc<GameServer>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Initialize game server with configuration
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let server = GameServer::new(config.to_server_config()?);
        Ok(Self {
            config,
            server: Arc::new(server),
        })
    }

    /// The configuration after CLI overrides.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runs the server until a termination signal or a fatal internal error.
    ///
    /// # Shutdown Phases
    ///
    /// 1. Stop monitoring
    /// 2. Let the server stop accepting, drain its handlers and close its buses
    /// 3. Report final statistics
    ///
    /// A second signal during shutdown exits the process immediately.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting OMGS server application");
        self.log_configuration_summary();

        let shutdown_state = ShutdownState::new();

        let server_handle = {
            let server = Arc::clone(&self.server);
            let shutdown_state = shutdown_state.clone();
            tokio::spawn(async move {
                let result = server.start_with_shutdown_state(shutdown_state.clone()).await;
                if let Err(e) = &result {
                    error!("❌ Server error: {}", e);
                    // Wake the main task, which is waiting on the same state.
                    shutdown_state.initiate_shutdown();
                }
                result
            })
        };

        let monitoring_handle = {
            let server = Arc::clone(&self.server);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(MONITORING_INTERVAL);
                let mut last = server.stats();

                loop {
                    interval.tick().await;
                    let stats = server.stats();
                    log_health(&last, &stats);
                    last = stats;
                }
            })
        };

        info!("✅ OMGS is now running!");
        info!("🎮 Ready to accept connections on {}", self.config.server.bind_address);
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        let cause = wait_for_shutdown(&shutdown_state).await?;

        // merciless shutdown
        tokio::spawn(async move {
            if let Err(e) = wait_for_signal().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        info!("📡 Phase 1: Stopping monitoring...");
        monitoring_handle.abort();

        info!("⏳ Phase 2: Draining handlers and closing buses...");
        let server_result = match tokio::time::timeout(SERVER_DRAIN_TIMEOUT, server_handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                error!("❌ Server task failed: {}", join_error);
                Ok(())
            }
            Err(_) => {
                warn!("⏰ Server did not finish within {:?}, proceeding with shutdown", SERVER_DRAIN_TIMEOUT);
                Ok(())
            }
        };
        shutdown_state.complete_shutdown();

        info!("📊 Phase 3: Final statistics");
        log_final_statistics(&self.server.stats());

        server_result?;
        if cause == ShutdownCause::Internal {
            return Err("server stopped after an internal failure".into());
        }

        info!("✅ OMGS shutdown complete");
        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!(
            "  📦 Subscription queue: {} | Handler mailbox: {}",
            self.config.bus.queue_capacity, self.config.bus.mailbox_capacity
        );
        for worker in &self.config.workers {
            info!("  📜 Worker '{}' on {}", worker.script, worker.address);
        }
    }
}

fn log_health(last: &ServerStats, stats: &ServerStats) {
    let transport = stats.transport.events_published - last.transport.events_published;
    let runtime = stats.runtime.events_published - last.runtime.events_published;
    info!(
        "📊 System Health - {} clients | {} transport events/min | {} runtime events/min",
        stats.connected_clients, transport, runtime
    );

    let saturations = stats.transport.saturations + stats.runtime.saturations;
    if saturations > last.transport.saturations + last.runtime.saturations {
        warn!("🔥 {} queue saturation(s) recorded so far", saturations);
    }
}

fn log_final_statistics(stats: &ServerStats) {
    for bus in [&stats.transport, &stats.runtime] {
        info!(
            "  - Bus '{}': {} events, {} deliveries, {} saturations",
            bus.name, bus.events_published, bus.deliveries, bus.saturations
        );
    }
    info!("  - Clients still registered: {}", stats.connected_clients);
}
