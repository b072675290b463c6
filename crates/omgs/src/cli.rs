//! Command-line interface handling for the OMGS server.
//!
//! This module provides command-line argument parsing and CLI interface management
//! using the `clap` crate for robust argument handling.

use clap::{Arg, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
///
/// This structure holds all the command-line options that can be used to
/// override configuration file settings.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for bind address
    pub bind_address: Option<String>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

impl CliArgs {
    /// Parses the process arguments.
    ///
    /// Exits with a usage message on invalid input, as clap does.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list; the first item is the binary name.
    pub fn parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            bind_address: matches.get_one::<String>("bind").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}

const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn command() -> Command {
    Command::new("OMGS")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Script-driven multiplayer game server")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDRESS")
                .help("Bind address (e.g., 127.0.0.1:8080)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
}
