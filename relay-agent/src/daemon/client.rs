use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{DaemonEndpoint, DaemonError, DaemonRpc, RpcResult};

/// Maximum number of idle connections to keep to the daemon
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 10;

/// HTTP client for a `CryptoNote` daemon
///
/// Transactions and random outputs go through the daemon's plain JSON
/// endpoints, blocks and block templates through `/json_rpc`.
pub struct DaemonClient {
    endpoint: DaemonEndpoint,
    base_url: String,
    timeout: Duration,
    http_client: Client,
    next_id: AtomicU64,
}

impl DaemonClient {
    /// Creates a client for the daemon at `endpoint`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(endpoint: DaemonEndpoint, timeout: Duration) -> Result<Self, DaemonError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS_PER_HOST)
            .user_agent(format!("relay-agent/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: format!("http://{endpoint}"),
            endpoint,
            timeout,
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> DaemonError {
        if error.is_timeout() {
            DaemonError::Timeout(self.timeout)
        } else {
            DaemonError::Network(error)
        }
    }

    async fn post<T>(&self, path: &str, body: &T) -> Result<Value, DaemonError>
    where
        T: Serialize + Sync,
    {
        let url = format!("{}/{path}", self.base_url);
        debug!("Sending POST request to: {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(DaemonError::Status(response.status()));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                DaemonError::Timeout(self.timeout)
            } else {
                DaemonError::InvalidResponse(e.to_string())
            }
        })
    }

    async fn json_rpc(&self, method: &str, params: Value) -> Result<RpcResult, DaemonError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let mut response = self.post("json_rpc", &request).await?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(DaemonError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| error.to_string(), ToString::to_string),
            });
        }

        match response.get_mut("result").map(Value::take) {
            Some(result) => RpcResult::from_value(result),
            None => Err(DaemonError::InvalidResponse(format!(
                "{method} response has no result"
            ))),
        }
    }
}

#[async_trait]
impl DaemonRpc for DaemonClient {
    async fn send_raw_transaction(&self, raw_transaction: &str) -> Result<RpcResult, DaemonError> {
        let response = self
            .post("sendrawtransaction", &json!({ "tx_as_hex": raw_transaction }))
            .await?;
        RpcResult::from_value(response)
    }

    async fn submit_block(&self, block_blob: &str) -> Result<RpcResult, DaemonError> {
        self.json_rpc("submitblock", json!([block_blob])).await
    }

    async fn block_template(
        &self,
        wallet_address: &str,
        reserve_size: u64,
    ) -> Result<RpcResult, DaemonError> {
        self.json_rpc(
            "getblocktemplate",
            json!({
                "wallet_address": wallet_address,
                "reserve_size": reserve_size,
            }),
        )
        .await
    }

    async fn random_outputs(&self, amounts: &[u64], mixin: u64) -> Result<RpcResult, DaemonError> {
        let response = self
            .post(
                "getrandom_outs",
                &json!({
                    "amounts": amounts,
                    "outs_count": mixin,
                }),
            )
            .await?;
        RpcResult::from_value(response)
    }

    fn endpoint(&self) -> &DaemonEndpoint {
        &self.endpoint
    }
}
