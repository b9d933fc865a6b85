//! Error types for the hydraping crate.
//!
//! This module provides specialized error types for different parts of the
//! crate:
//! - [`ConfigError`] - errors loading or validating the config file
//! - [`TerminalError`] - errors taking over or restoring the terminal
//! - [`RunError`] - errors specific to the runtime loop
//!
//! Probe adapters deliberately do not get an error type here: a failed probe
//! becomes a [`crate::model::CheckResult`] with a failing
//! [`crate::model::Status`], never an `Err` bubbled out of the scheduler.

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
///
/// These carry enough context (entry index, offending key) that the CLI can
/// point the user at the exact TOML location without re-parsing the file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read from disk.
    #[error("could not read config file at {path}: {source}")]
    Io {
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML.
    #[error("could not parse config file as TOML: {source}")]
    Parse {
        /// Underlying error
        #[from]
        source: toml::de::Error,
    },
    /// Re-serializing a config failed.
    #[error("could not serialize config: {source}")]
    Serialize {
        /// Underlying error
        #[from]
        source: toml::ser::Error,
    },
    /// No endpoints were configured.
    #[error("the endpoint list is empty, nothing to monitor")]
    EmptyTargetList,
    /// Entry `index` could not be parsed into an endpoint.
    #[error("endpoint #{index} ('{raw}') has a malformed entry: {reason}")]
    MalformedTarget { index: usize, raw: String, reason: String },
    /// Entry `index` has a `protocol` field that is not `tcp` or `udp`.
    #[error("endpoint #{index} ('{raw}') has an unknown protocol '{protocol}'")]
    UnknownProtocol { index: usize, raw: String, protocol: String },
    /// Entry `index` sets `primary_check_type` to a check it doesn't run.
    #[error(
        "endpoint #{index} ('{raw}') sets primary_check_type '{check}', which is not one of its applicable checks {applicable:?}"
    )]
    IncompatiblePrimaryCheck {
        index: usize,
        raw: String,
        check: String,
        applicable: Vec<String>,
    },
    /// A numeric config field is below its documented minimum.
    #[error("config key '{key}' has value {value}, below the minimum of {min}")]
    BelowMinimum { key: &'static str, value: f64, min: f64 },
    /// `timeout_seconds` exceeds `interval_seconds`, which would let ticks overlap.
    #[error("timeout_seconds ({timeout}) must not exceed interval_seconds ({interval})")]
    TimeoutExceedsInterval { timeout: f64, interval: f64 },
    /// Could not determine a config directory for the default config path.
    #[error("could not determine the default config directory")]
    NoConfigDir,
    /// `init` was run without `--force` against an existing config file.
    #[error("config file already exists at {path}, use --force to overwrite")]
    AlreadyExists { path: String },
}

/// Errors that can occur while taking over or restoring the terminal.
#[derive(Error, Debug)]
pub enum TerminalError {
    /// An I/O error occurred while drawing or restoring the terminal.
    #[error("terminal I/O error: {source}")]
    Io {
        /// Underlying error
        #[from]
        source: std::io::Error,
    },
}

/// Errors specific to running the main dashboard loop.
#[derive(Error, Debug)]
pub enum RunError {
    /// Something went wrong loading configuration.
    #[error("{source}")]
    Config {
        /// Underlying error
        #[from]
        source: ConfigError,
    },
    /// Something went wrong setting up the terminal.
    #[error("{source}")]
    Terminal {
        /// Underlying error
        #[from]
        source: TerminalError,
    },
    /// An I/O error occurred during the run loop.
    #[error("IO Error: {source}")]
    Io {
        /// Underlying error
        #[from]
        source: std::io::Error,
    },
}

impl RunError {
    /// Process exit code for this failure, per the documented exit code table.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Terminal { .. } | Self::Io { .. } => 3,
        }
    }
}
