//! `devstats config`: show the resolved configuration.

use anyhow::{Context, Result};
use clap::Args;
use devstats_core::Configuration;

/// Arguments for `devstats config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Single-line JSON instead of pretty-printed.
    #[arg(long)]
    pub compact: bool,
}

impl ConfigArgs {
    pub fn run(self, config: &Configuration) -> Result<()> {
        println!("{}", render(config, self.compact)?);
        Ok(())
    }
}

pub(crate) fn render(config: &Configuration, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(config)
    } else {
        serde_json::to_string_pretty(config)
    };
    json.context("failed to render configuration JSON")
}
