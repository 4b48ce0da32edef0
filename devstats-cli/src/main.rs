//! devstats: sync every project listed in the projects manifest.
//!
//! # Usage
//!
//! ```text
//! devstats [--manifest <path>] [--pid-file <path>] [sync]
//! devstats config
//! ```
//!
//! All behaviour knobs come from `GHA2DB_*`, `PG_*` and `IDB_*` environment
//! variables; see `devstats config` for the resolved values.

mod commands;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use commands::{config::ConfigArgs, sync::SyncArgs};
use devstats_core::{coerce, Configuration, EnvReader, ProcessEnv};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "devstats",
    version,
    about = "Sync GitHub archive data for every configured project",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    sync: SyncArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Refresh repositories, then run `gha2db_sync` for each enabled project (default).
    Sync,

    /// Print the configuration resolved from the environment as JSON.
    Config(ConfigArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&LogSettings::from_env(&ProcessEnv))?;
    let config = Configuration::resolve(&ProcessEnv);

    match cli.command {
        Some(Commands::Config(args)) => args.run(&config),
        Some(Commands::Sync) | None => cli.sync.run(&config),
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// The logging knobs, read ahead of [`Configuration::resolve`] so that its
/// warnings reach the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LogSettings {
    /// `GHA2DB_DEBUG > 0`.
    debug: bool,
    /// Cleared by `GHA2DB_SKIPTIME`.
    timestamps: bool,
}

impl LogSettings {
    fn from_env(env: &impl EnvReader) -> Self {
        let var = |key: &str| env.var(key).filter(|v| !v.is_empty());
        Self {
            debug: var("GHA2DB_DEBUG")
                .and_then(|raw| coerce::parse_int::<i32>(&raw))
                .is_some_and(|level| level > 0),
            timestamps: !var("GHA2DB_SKIPTIME").is_some_and(|raw| coerce::parse_bool(&raw)),
        }
    }
}

/// Logs go to stderr so stdout stays machine readable. `RUST_LOG` wins over
/// the debug knob.
fn init_tracing(settings: &LogSettings) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if settings.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let installed = if settings.timestamps {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };
    installed.map_err(|err| anyhow!("cannot install log subscriber: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn log_settings_agree_with_resolved_configuration() {
        let cases = [
            env(&[]),
            env(&[("GHA2DB_DEBUG", "2")]),
            env(&[("GHA2DB_DEBUG", "0")]),
            env(&[("GHA2DB_DEBUG", "-1")]),
            env(&[("GHA2DB_DEBUG", "loud")]),
            env(&[("GHA2DB_SKIPTIME", "1")]),
            env(&[("GHA2DB_SKIPTIME", "no")]),
            env(&[("GHA2DB_DEBUG", "1"), ("GHA2DB_SKIPTIME", "Y")]),
        ];
        for case in &cases {
            let config = Configuration::resolve(case);
            let expected = LogSettings {
                debug: config.debug > 0,
                timestamps: config.log_time,
            };
            assert_eq!(LogSettings::from_env(case), expected, "env={case:?}");
        }
    }
}
