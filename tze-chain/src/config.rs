//! Explorer configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ChainError, Result};

/// Default node RPC endpoint (testnet port).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:18232";
/// Default index-service GraphQL endpoint.
pub const DEFAULT_INDEX_URL: &str = "http://127.0.0.1:3000/graphql";
/// Proof records requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;
/// Per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// How to authenticate against the node RPC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RpcAuth {
    None,
    Basic { username: String, password: String },
    /// Cookie file written by the node, `__cookie__:<token>`.
    Cookie { path: PathBuf },
}

/// Endpoint and pagination settings.
#[derive(Clone, Debug)]
pub struct ExplorerConfig {
    pub rpc_url: String,
    pub rpc_auth: RpcAuth,
    pub index_url: String,
    pub page_size: usize,
    pub request_timeout: Duration,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            rpc_auth: RpcAuth::None,
            index_url: DEFAULT_INDEX_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ExplorerConfig {
    /// Load configuration from environment variables.
    ///
    /// - `TZE_RPC_URL`
    /// - `TZE_RPC_COOKIE_PATH`, or `TZE_RPC_USER` and `TZE_RPC_PASSWORD`
    /// - `TZE_INDEX_URL`
    /// - `TZE_PAGE_SIZE`
    /// - `TZE_REQUEST_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let rpc_url = lookup("TZE_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let index_url =
            lookup("TZE_INDEX_URL").unwrap_or_else(|| DEFAULT_INDEX_URL.to_string());

        let rpc_auth = match (
            lookup("TZE_RPC_COOKIE_PATH"),
            lookup("TZE_RPC_USER"),
            lookup("TZE_RPC_PASSWORD"),
        ) {
            (Some(path), _, _) => RpcAuth::Cookie { path: path.into() },
            (None, Some(username), password) => RpcAuth::Basic {
                username,
                password: password.unwrap_or_default(),
            },
            (None, None, Some(_)) => {
                return Err(ChainError::Config(
                    "TZE_RPC_PASSWORD is set without TZE_RPC_USER".into(),
                ))
            }
            (None, None, None) => RpcAuth::None,
        };

        let page_size = parse_or(&lookup, "TZE_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ChainError::Config("TZE_PAGE_SIZE must be positive".into()));
        }
        let timeout_secs = parse_or(
            &lookup,
            "TZE_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;

        Ok(Self {
            rpc_url,
            rpc_auth,
            index_url,
            page_size,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ChainError::Config(format!("{key} is not a valid number: {raw}"))),
        None => Ok(default),
    }
}
