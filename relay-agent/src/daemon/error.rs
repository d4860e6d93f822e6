use std::time::Duration;

use thiserror::Error;

/// Transport-level failures talking to the daemon
///
/// A well-formed answer with a non-OK status is not an error, see
/// [`super::RpcResult::is_ok`].
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The call did not complete within the configured timeout
    #[error("daemon did not respond within {0:?}")]
    Timeout(Duration),

    /// Network error when communicating with the daemon
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The daemon answered with a non-success HTTP status
    #[error("daemon returned HTTP {0}")]
    Status(reqwest::StatusCode),

    /// The daemon answered a JSON-RPC call with an error object
    #[error("daemon rejected call ({code}): {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// JSON-RPC error message
        message: String,
    },

    /// The response could not be interpreted
    #[error("invalid daemon response: {0}")]
    InvalidResponse(String),
}
