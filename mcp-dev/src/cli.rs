//! CLI arguments for `mcp-dev`.
//!
//! Defined apart from `main.rs` so integration tests can parse them directly.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use clap::Parser;
use mcp_dev_core::{InspectorCommand, Platform};

/// Launch the MCP Inspector behind a proxy that pre-fills its connection
/// settings for this project's `dev:mcp` server.
#[derive(Parser, Debug)]
#[command(name = "mcp-dev", version)]
pub struct DevArgs {
    /// Port the proxy listens on.
    #[arg(long, env = "PORT")]
    pub port: u16,

    /// Address the proxy binds to.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Project directory the MCP server is started from (default: current
    /// directory).
    #[arg(long)]
    pub project_dir: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long)]
    pub verbose: bool,

    /// Inspector command and arguments (after `--`). Defaults to
    /// `mcp-inspector`, or `npx @modelcontextprotocol/inspector` on Windows.
    #[arg(trailing_var_arg = true)]
    pub inspector: Vec<String>,
}

impl DevArgs {
    /// The command used to start the inspector sidecar.
    pub fn inspector_command(&self) -> InspectorCommand {
        match self.inspector.split_first() {
            Some((program, args)) => InspectorCommand {
                program: program.clone(),
                args: args.to_vec(),
            },
            None => InspectorCommand::for_platform(Platform::current()),
        }
    }
}
