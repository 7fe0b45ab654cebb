//! `mcp-dev` entry point.

use clap::Parser;

use mcp_dev::banner;
use mcp_dev::cli::DevArgs;
use mcp_dev::orchestrator::{self, OrchestratorConfig};

#[tokio::main]
async fn main() {
    let args = DevArgs::parse();
    init_tracing(args.verbose);

    let result = match OrchestratorConfig::from_args(&args) {
        Ok(config) => orchestrator::run(config).await,
        Err(e) => Err(e),
    };

    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            banner::failed(&e);
            1
        }
    };

    std::process::exit(code);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tracing Init
// ─────────────────────────────────────────────────────────────────────────────

/// Initialise tracing to stderr.
///
/// `--verbose` forces `debug`; otherwise `RUST_LOG` applies, defaulting to
/// `warn`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
