//! # contour-cli — Demo Server and Document Tool
//!
//! Provides the `contour` command-line interface around a demo API built
//! with `contour-api`.
//!
//! ## Subcommands
//!
//! - `contour serve` — run the demo API (`--host`, `--port`, or
//!   `CONTOUR_HOST` / `CONTOUR_PORT`).
//! - `contour openapi` — print the OpenAPI document (`--json` for JSON).
//!
//! ```bash
//! contour serve --port 3001
//! contour openapi --json > openapi.json
//! ```

pub mod demo;
pub mod document;
pub mod serve;

use contour_api::Config;

/// Title and version of the demo API document.
pub fn demo_config() -> Config {
    Config::new("Contour Demo API", env!("CARGO_PKG_VERSION"))
}
