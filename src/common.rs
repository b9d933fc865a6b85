//! Shared startup utilities: logging setup and the panic handler.
//!
//! Grounded closely on the reference monitor's `common.rs` for
//! `setup_panic_handler` (kept almost verbatim); `init_logging` is adapted
//! from an stdout `FmtSubscriber` to a rolling file sink via
//! `tracing-appender`, since stdout is the dashboard's canvas once the
//! terminal is taken over (SPEC_FULL §A.1).

use std::path::PathBuf;
use std::str::FromStr;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::FmtSubscriber;

/// Environment variable name for configuring log level.
pub const ENV_LOG_LEVEL: &str = "HYDRAPING_LOG";

/// Initializes file-backed logging at `level` (overridable via
/// [`ENV_LOG_LEVEL`]). The returned [`WorkerGuard`] must be held for the
/// lifetime of the process — dropping it flushes and closes the
/// non-blocking writer.
///
/// # Exits
///
/// Exits with status code 1 if an invalid log level is given via the
/// environment variable.
pub fn init_logging(level: tracing::Level) -> WorkerGuard {
    let level: tracing::Level = match std::env::var(ENV_LOG_LEVEL) {
        Err(_) => level,
        Ok(raw) => match tracing::Level::from_str(&raw) {
            Err(e) => {
                eprintln!("Bad log level was given with the environment variable '{ENV_LOG_LEVEL}': '{raw}', must be one of 'TRACE', 'DEBUG', 'INFO', 'WARN', 'ERROR'");
                eprintln!("{e}");
                std::process::exit(1)
            }
            Ok(ll) => ll,
        },
    };

    let log_dir = log_directory();
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::never(&log_dir, "hydraping.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = FmtSubscriber::builder().with_max_level(level).with_writer(non_blocking).with_ansi(false).finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
    tracing::trace!("logging initialized with level {level}, writing to {}", log_dir.display());
    guard
}

/// `$XDG_STATE_HOME/hydraping`, falling back to the system temp directory
/// when no state directory can be determined.
fn log_directory() -> PathBuf {
    dirs::state_dir().unwrap_or_else(std::env::temp_dir).join("hydraping")
}

/// Sets up a custom panic handler for user-friendly error reporting.
///
/// Should be called early in program startup, before the terminal is taken
/// over. In debug builds the default panic handler is used for detailed
/// output; release builds get a short, reportable summary instead.
pub fn setup_panic_handler() {
    if !cfg!(debug_assertions) {
        std::panic::set_hook(Box::new(|panic_info| {
            let mut message = String::new();
            message.push_str("\nWell, this is embarrassing.\n\n");
            message.push_str(&format!(
                "{} had a problem and crashed. This is a bug and should be reported!\n\n",
                env!("CARGO_PKG_NAME")
            ));

            message.push_str("Technical details:\n");
            message.push_str(&format!("Version:     {}\n", env!("CARGO_PKG_VERSION")));

            #[cfg(target_os = "linux")]
            let os = "linux";
            #[cfg(target_os = "macos")]
            let os = "macos";
            #[cfg(target_os = "windows")]
            let os = "windows";

            message.push_str(&format!("OS:          {} {}\n", os, std::env::consts::ARCH));

            let args: Vec<_> = std::env::args().collect();
            message.push_str(&format!("Command:     {}\n", args.join(" ")));

            if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
                message.push_str(&format!("Error:       {}\n", msg));
            } else if let Some(msg) = panic_info.payload().downcast_ref::<String>() {
                message.push_str(&format!("Error:       {}\n", msg));
            }

            if let Some(location) = panic_info.location() {
                message.push_str(&format!("Location:    {}:{}\n", location.file(), location.line()));
            }

            message.push_str("\nPlease create a new issue at https://github.com/hydraping/hydraping/issues\n");
            message.push_str("with the above technical details and what you were doing when this happened.\n");

            eprintln!("{}", message);
        }));
    }
}
