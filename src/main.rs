//! Bearer-token authenticating reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ auth gate ──▶ proxy engine ──▶ connection manager ──▶ Upstream
//!                     (request id,    (token →      (rewrite,        (pooled keep-alive
//!                      body limit)     principal)    credential,      transport per origin)
//!                                                    retry loop)
//!     Client Response
//!     ◀────────────── relay (status, headers, streamed or buffered body) ◀──────────────────
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use bearer_proxy::config;
use bearer_proxy::lifecycle::startup;
use bearer_proxy::observability::init_logging;

#[derive(Parser)]
#[command(name = "bearer-proxy")]
#[command(about = "Authenticating reverse proxy with bearer-token gating", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults plus PROXY_* environment variables
    /// are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("bearer-proxy: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.check {
        println!("configuration OK");
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("bearer-proxy: failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "bearer-proxy starting");

    match startup::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}
