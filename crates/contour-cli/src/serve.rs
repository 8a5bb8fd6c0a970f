//! # Serve Subcommand
//!
//! Runs the demo API on axum until interrupted.

use std::net::SocketAddr;

use anyhow::Context;
use clap::Args;
use contour_api::Config;

use crate::demo::{build_api, ItemStore};

/// Arguments for `contour serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Interface to bind.
    #[arg(long, env = "CONTOUR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, short, env = "CONTOUR_PORT", default_value_t = 3001)]
    pub port: u16,
}

impl ServeArgs {
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

/// Serve the demo API.
pub async fn run_serve(args: &ServeArgs, config: Config) -> anyhow::Result<()> {
    let addr = args.addr()?;
    let api = build_api(config, ItemStore::seeded()).context("failed to assemble the demo API")?;
    let app = api.into_router();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("contour listening on http://{addr}");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("contour stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_parses_host_and_port() {
        let args = ServeArgs {
            host: "0.0.0.0".into(),
            port: 8080,
        };
        assert_eq!(args.addr().unwrap().port(), 8080);
    }

    #[test]
    fn bad_host_is_an_error() {
        let args = ServeArgs {
            host: "not a host".into(),
            port: 1,
        };
        assert!(args.addr().is_err());
    }
}
