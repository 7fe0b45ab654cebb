//! Launch-parameter rewriting for the inspector's root page.
//!
//! The inspector UI reads its connection settings from the query string of
//! `/`. A request for the root gets the launch parameters merged into its
//! query; when that changes anything, the client is redirected to the
//! canonical URL so the browser's address bar carries the settings.

use std::path::Path;

use mcp_dev_core::LaunchConfig;
use mcp_dev_core::config::{REQUEST_MAX_TOTAL_TIMEOUT_MS, SERVER_REQUEST_TIMEOUT_MS};
use url::form_urlencoded;

pub const PARAM_TRANSPORT: &str = "transport";
pub const PARAM_SERVER_COMMAND: &str = "serverCommand";
pub const PARAM_SERVER_ARGS: &str = "serverArgs";
pub const PARAM_AUTH_TOKEN: &str = "MCP_PROXY_AUTH_TOKEN";
pub const PARAM_FULL_ADDRESS: &str = "MCP_PROXY_FULL_ADDRESS";
pub const PARAM_MAX_TOTAL_TIMEOUT: &str = "MCP_REQUEST_MAX_TOTAL_TIMEOUT";
pub const PARAM_SERVER_REQUEST_TIMEOUT: &str = "MCP_SERVER_REQUEST_TIMEOUT";

/// The inspector talks to the project's MCP server over stdio.
const TRANSPORT_STDIO: &str = "stdio";

/// The project's MCP server is started through its `dev:mcp` npm script.
const SERVER_COMMAND: &str = "npm";

/// Query parameters injected into every root request, in injection order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    pairs: Vec<(&'static str, String)>,
}

impl LaunchParams {
    /// Build the parameters for `config`, running the MCP server from
    /// `project_dir`.
    pub fn new(config: &LaunchConfig, project_dir: &Path) -> Self {
        let server_args = format!(
            "--silent --prefix \"{}\" run dev:mcp",
            project_dir.display()
        );

        Self {
            pairs: vec![
                (PARAM_TRANSPORT, TRANSPORT_STDIO.to_string()),
                (PARAM_SERVER_COMMAND, SERVER_COMMAND.to_string()),
                (PARAM_SERVER_ARGS, server_args),
                (PARAM_AUTH_TOKEN, config.session_token.as_str().to_string()),
                (PARAM_FULL_ADDRESS, config.proxy_full_address()),
                (
                    PARAM_MAX_TOTAL_TIMEOUT,
                    REQUEST_MAX_TOTAL_TIMEOUT_MS.to_string(),
                ),
                (
                    PARAM_SERVER_REQUEST_TIMEOUT,
                    SERVER_REQUEST_TIMEOUT_MS.to_string(),
                ),
            ],
        }
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Whether a request's path and query address the root page.
///
/// Only `/` itself qualifies, with or without a query string.
pub fn is_root_request(path_and_query: &str) -> bool {
    path_and_query == "/" || path_and_query.starts_with("/?")
}

/// Set `key` to `value`, replacing the first occurrence in place and dropping
/// any later duplicates. Appends when the key is absent.
pub fn set_query_param(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    let mut seen = false;
    pairs.retain_mut(|(k, v)| {
        if k != key {
            return true;
        }
        if seen {
            return false;
        }
        seen = true;
        *v = value.to_string();
        true
    });
    if !seen {
        pairs.push((key.to_string(), value.to_string()));
    }
}

/// Compute the redirect target for a root request.
///
/// Returns `Some(location)` when merging the launch parameters into the query
/// changes the request URL, `None` when it is already canonical or the
/// request is not for the root.
pub fn rewrite_root(path_and_query: &str, params: &LaunchParams) -> Option<String> {
    if !is_root_request(path_and_query) {
        return None;
    }

    let query = path_and_query
        .split_once('?')
        .map(|(_, query)| query)
        .unwrap_or("");

    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    for (key, value) in params.pairs() {
        set_query_param(&mut pairs, key, value);
    }

    let serialized = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&pairs)
        .finish();
    let rewritten = format!("/?{serialized}");

    (rewritten != path_and_query).then_some(rewritten)
}
