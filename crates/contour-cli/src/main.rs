//! # contour CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use contour_cli::document::{run_openapi, OpenapiArgs};
use contour_cli::serve::{run_serve, ServeArgs};

/// Contour — declarative REST operations with generated schemas,
/// validation and PATCH support.
#[derive(Parser, Debug)]
#[command(name = "contour", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the demo API server.
    Serve(ServeArgs),

    /// Print the demo API's OpenAPI document.
    Openapi(OpenapiArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    // Logs go to stderr so `contour openapi` output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = contour_cli::demo_config();
    let result = match cli.command {
        Commands::Serve(args) => run_serve(&args, config).await,
        Commands::Openapi(args) => run_openapi(&args, config, &mut std::io::stdout().lock()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["contour", "serve"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 3001);
    }

    #[test]
    fn cli_parse_serve_flags_and_verbosity() {
        let cli = Cli::try_parse_from(["contour", "-vv", "serve", "--host", "0.0.0.0", "--port", "9000"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.port, 9000);
    }

    #[test]
    fn cli_parse_openapi_json() {
        let cli = Cli::try_parse_from(["contour", "openapi", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Openapi(OpenapiArgs { json: true })));
    }

    #[test]
    fn cli_rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["contour", "deploy"]).is_err());
    }
}
