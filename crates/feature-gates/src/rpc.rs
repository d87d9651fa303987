//! Cluster JSON-RPC client
//!
//! Only the two calls the prober needs: `getAccountInfo` and
//! `getEpochSchedule`.

use crate::epoch::EpochSchedule;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Failure talking to a cluster
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },
    #[error("RPC error {code} from {endpoint}: {message}")]
    Rpc {
        endpoint: String,
        code: i64,
        message: String,
    },
    #[error("malformed response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

/// Read access to one cluster's state
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Raw account data, `None` when the account does not exist
    async fn account(&self, address: &str) -> Result<Option<Vec<u8>>, RpcError>;

    /// The cluster's epoch schedule
    async fn epoch_schedule(&self) -> Result<EpochSchedule, RpcError>;
}

/// [`ChainClient`] over HTTP JSON-RPC
#[derive(Clone)]
pub struct RpcClient {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct AccountInfoResult {
    value: Option<AccountInfo>,
}

#[derive(Deserialize)]
struct AccountInfo {
    /// `[<payload>, <encoding>]`
    data: (String, String),
}

impl RpcClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| RpcError::Transport {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        let parsed: RpcResponse<T> =
            serde_json::from_slice(&bytes).map_err(|e| self.decode_error(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(RpcError::Rpc {
                endpoint: self.endpoint.clone(),
                code: err.code,
                message: err.message,
            });
        }
        parsed
            .result
            .ok_or_else(|| self.decode_error(format!("{method} returned no result")))
    }

    fn decode_error(&self, reason: String) -> RpcError {
        RpcError::Decode {
            endpoint: self.endpoint.clone(),
            reason,
        }
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn account(&self, address: &str) -> Result<Option<Vec<u8>>, RpcError> {
        let result: AccountInfoResult = self
            .call(
                "getAccountInfo",
                serde_json::json!([address, { "encoding": "base64" }]),
            )
            .await?;

        let Some(info) = result.value else {
            return Ok(None);
        };
        let (payload, encoding) = info.data;
        if encoding != "base64" {
            return Err(self.decode_error(format!("unexpected account encoding {encoding}")));
        }
        BASE64
            .decode(payload)
            .map(Some)
            .map_err(|e| self.decode_error(format!("invalid base64 account data: {e}")))
    }

    async fn epoch_schedule(&self) -> Result<EpochSchedule, RpcError> {
        self.call("getEpochSchedule", serde_json::json!([])).await
    }
}
