//! # OpenAPI Subcommand
//!
//! Prints the demo API's OpenAPI document, YAML by default.

use std::io::Write;

use anyhow::Context;
use clap::Args;
use contour_api::Config;

use crate::demo::{build_api, ItemStore};

/// Arguments for `contour openapi`.
#[derive(Args, Debug)]
pub struct OpenapiArgs {
    /// Emit JSON instead of YAML.
    #[arg(long)]
    pub json: bool,
}

/// Render the document to `out`.
pub fn run_openapi(args: &OpenapiArgs, config: Config, out: &mut impl Write) -> anyhow::Result<()> {
    let api = build_api(config, ItemStore::default()).context("failed to assemble the demo API")?;
    let doc = api.openapi();
    let text = if args.json {
        serde_json::to_string_pretty(&doc).context("failed to encode OpenAPI JSON")?
    } else {
        serde_yaml::to_string(&doc).context("failed to encode OpenAPI YAML")?
    };
    writeln!(out, "{}", text.trim_end()).context("failed to write OpenAPI document")?;
    Ok(())
}
