//! Flag parsing and subcommand dispatch (spec §6, SPEC_FULL §A.4).
//!
//! Subcommands are dispatched by inspecting `args[1]` before the flag
//! parser ever sees them, the same way the reference monitor's binaries
//! each hard-code one mode and choose between actions with `opt_present`
//! checks — here there's just one binary, so the first positional word
//! picks the mode instead of the binary name.

use getopts::Options;

use crate::runtime::Overrides;

/// What `main` should do, decided from `args[1..]` without touching the
/// filesystem or the terminal.
pub enum Command {
    /// Run the dashboard, optionally against a non-default config path.
    Run { config_path: Option<String>, overrides: Overrides },
    /// Write a default config file.
    Init { config_path: Option<String>, force: bool },
    /// Print the version and exit.
    Version,
    /// `--help` was given, or parsing failed; `usage` is ready to print.
    Help { usage: String },
}

fn base_opts() -> Options {
    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt("c", "config", "path to the config file", "PATH");
    opts
}

fn usage_for(program: &str, opts: &Options) -> String {
    let brief = format!(
        "Usage: {program} [options]\n       {program} init [--force] [options]\n       {program} version"
    );
    opts.usage(&brief)
}

/// Parses `args` (including `args[0]`, the program name) into a [`Command`].
pub fn parse(args: &[String]) -> Command {
    let program = args.first().map(String::as_str).unwrap_or("hydraping");

    match args.get(1).map(String::as_str) {
        Some("init") => parse_init(program, &args[2..]),
        Some("version") => Command::Version,
        _ => parse_run(program, &args[1..]),
    }
}

fn parse_run(program: &str, rest: &[String]) -> Command {
    let mut opts = base_opts();
    opts.optopt("", "interval", "seconds between ticks", "SECONDS");
    opts.optopt("", "timeout", "seconds before a probe is given up on", "SECONDS");
    opts.optflag("", "no-dns", "disable DNS checks for this run");
    opts.optflag("", "no-icmp", "disable ICMP checks for this run");

    let matches = match opts.parse(rest) {
        Ok(m) => m,
        Err(f) => {
            eprintln!("{f}");
            return Command::Help { usage: usage_for(program, &opts) };
        }
    };

    if matches.opt_present("help") {
        return Command::Help { usage: usage_for(program, &opts) };
    }

    let overrides = Overrides {
        interval_seconds: matches.opt_str("interval").and_then(|s| s.parse().ok()),
        timeout_seconds: matches.opt_str("timeout").and_then(|s| s.parse().ok()),
        no_dns: matches.opt_present("no-dns"),
        no_icmp: matches.opt_present("no-icmp"),
    };

    Command::Run { config_path: matches.opt_str("config"), overrides }
}

fn parse_init(program: &str, rest: &[String]) -> Command {
    let mut opts = base_opts();
    opts.optflag("", "force", "overwrite an existing config file");

    let matches = match opts.parse(rest) {
        Ok(m) => m,
        Err(f) => {
            eprintln!("{f}");
            return Command::Help { usage: usage_for(program, &opts) };
        }
    };

    if matches.opt_present("help") {
        return Command::Help { usage: usage_for(program, &opts) };
    }

    Command::Init { config_path: matches.opt_str("config"), force: matches.opt_present("force") }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        std::iter::once("hydraping".to_string()).chain(s.split_whitespace().map(String::from)).collect()
    }

    #[test]
    fn no_subcommand_runs_with_defaults() {
        match parse(&args("")) {
            Command::Run { config_path, overrides } => {
                assert!(config_path.is_none());
                assert!(!overrides.no_dns);
                assert!(!overrides.no_icmp);
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn run_flags_populate_overrides() {
        match parse(&args("--interval 2.5 --no-icmp --config /tmp/c.toml")) {
            Command::Run { config_path, overrides } => {
                assert_eq!(config_path.as_deref(), Some("/tmp/c.toml"));
                assert_eq!(overrides.interval_seconds, Some(2.5));
                assert!(overrides.no_icmp);
                assert!(!overrides.no_dns);
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn init_subcommand_parses_force() {
        match parse(&args("init --force")) {
            Command::Init { force, .. } => assert!(force),
            _ => panic!("expected Init"),
        }
    }

    #[test]
    fn version_subcommand_is_recognized() {
        assert!(matches!(parse(&args("version")), Command::Version));
    }
}
