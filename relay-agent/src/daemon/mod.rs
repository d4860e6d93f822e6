//! Daemon RPC contract and HTTP implementation

mod client;
mod error;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub use client::DaemonClient;
pub use error::DaemonError;

/// Address of the upstream daemon, used for connecting and for log context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonEndpoint {
    pub host: String,
    pub port: u16,
}

impl DaemonEndpoint {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for DaemonEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A well-formed daemon answer
///
/// Always a JSON object carrying a string `status`. The whole object is what
/// gets replied to the requester.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RpcResult(Value);

impl RpcResult {
    /// Wraps a daemon response body
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::InvalidResponse` if `value` is not an object with
    /// a string `status` field.
    pub fn from_value(value: Value) -> Result<Self, DaemonError> {
        match value.get("status") {
            Some(Value::String(_)) => Ok(Self(value)),
            _ => Err(DaemonError::InvalidResponse(format!(
                "missing status in {value}"
            ))),
        }
    }

    /// The raw status string
    #[must_use]
    pub fn status(&self) -> &str {
        self.0.get("status").and_then(Value::as_str).unwrap_or_default()
    }

    /// Whether the status normalizes to `OK`
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status().trim().eq_ignore_ascii_case("OK")
    }

    /// The daemon's error description, if it gave one
    #[must_use]
    pub fn error(&self) -> Option<String> {
        match self.0.get("error")? {
            Value::Null => None,
            Value::String(message) => Some(message.clone()),
            Value::Object(object) => object
                .get("message")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .or_else(|| Some(Value::Object(object.clone()).to_string())),
            other => Some(other.to_string()),
        }
    }

    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }
}

/// The four calls the relay forwards to the daemon
///
/// Implementations must be safe to share between workers. Every call may fail
/// with a transport error, in which case the request is returned to the queue.
#[async_trait]
pub trait DaemonRpc: Send + Sync {
    /// Relays a hex-encoded transaction
    async fn send_raw_transaction(&self, raw_transaction: &str) -> Result<RpcResult, DaemonError>;

    /// Submits a mined block blob
    async fn submit_block(&self, block_blob: &str) -> Result<RpcResult, DaemonError>;

    /// Fetches a block template paying out to `wallet_address`
    async fn block_template(
        &self,
        wallet_address: &str,
        reserve_size: u64,
    ) -> Result<RpcResult, DaemonError>;

    /// Fetches `mixin` random outputs for each amount
    async fn random_outputs(&self, amounts: &[u64], mixin: u64) -> Result<RpcResult, DaemonError>;

    /// Where the daemon lives
    fn endpoint(&self) -> &DaemonEndpoint;
}
