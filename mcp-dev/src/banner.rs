//! Operator-facing console output.
//!
//! Structured diagnostics go through `tracing` to stderr; these are the
//! human-readable status lines printed regardless of the log filter.

use colored::Colorize;
use mcp_dev_core::{InspectorCommand, LaunchConfig, LaunchError, Platform};

pub fn starting(platform: Platform, command: &InspectorCommand) {
    println!("{}", "🔧 Starting MCP Inspector...".bold());
    println!("   Platform: {}", platform_name(platform));
    println!("   Command: {command}");
}

pub fn ready() {
    println!("{}", "✅ MCP Inspector is ready!".green().bold());
}

/// Printed once the forwarder accepts connections.
pub fn running(config: &LaunchConfig, platform: Platform) {
    println!();
    println!(
        "{} {}",
        "🐨 Proxy server running:".bold(),
        format!("http://localhost:{}", config.external_port).cyan()
    );
    println!("   - Client port: {}", config.client_port);
    println!("   - Server port: {}", config.server_port);
    println!("   - Session token: {}", config.session_token.as_str());

    if platform == Platform::Windows {
        println!();
        println!(
            "{}",
            "💡 Windows users: If you experience issues, try opening as administrator".yellow()
        );
    }
}

/// Printed before the launcher exits with a failure.
pub fn failed(error: &LaunchError) {
    let headline = match error {
        LaunchError::Spawn { .. } => "❌ MCP Inspector failed to start:",
        LaunchError::SidecarStopped { .. } => "❌",
        _ => "❌ Failed to start MCP Inspector:",
    };
    eprintln!("{} {error}", headline.red().bold());

    let hints = error.remediation_hints();
    if !hints.is_empty() {
        eprintln!();
        eprintln!("{}", "💡 Windows troubleshooting tips:".yellow());
        for (i, hint) in hints.iter().enumerate() {
            eprintln!("   {}. {hint}", i + 1);
        }
    }
}

fn platform_name(platform: Platform) -> &'static str {
    match platform {
        Platform::Windows => "win32",
        Platform::Unix => std::env::consts::OS,
    }
}
