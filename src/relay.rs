use async_trait::async_trait;
use ethers::types::{Address, U256};
use eyre::{eyre, Result, WrapErr};
use serde_json::Value;

use crate::types::UserOperation;

/// The relay's RPC surface as this tool uses it: a fee-price query and a
/// batch submission. Behind a trait so the pipeline can be driven by a mock
/// in tests.
#[async_trait]
pub trait Relay {
    /// Current base fee in wei (`eth_gasPrice`).
    async fn gas_price(&self) -> Result<U256>;

    /// Submits the ordered batch under the given entrypoint. The relay
    /// accepts or rejects the batch as a whole and returns an opaque receipt.
    async fn send_bundle(&self, ops: &[UserOperation], entrypoint: Address) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct RelayClient {
    url: String,
    http: reqwest::Client,
}

impl RelayClient {
    pub fn new(url: String) -> Self {
        Self {
            url,
            http: reqwest::Client::new(),
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let req = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .wrap_err_with(|| format!("POST {} failed", self.url))?;

        let status = resp.status();
        let body: Value = resp.json().await.wrap_err("failed to decode JSON")?;

        if !status.is_success() {
            return Err(eyre!("HTTP {}: {}", status, body));
        }

        if let Some(err) = body.get("error") {
            return Err(eyre!("RPC error: {}", err));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| eyre!("missing result field"))
    }
}

#[async_trait]
impl Relay for RelayClient {
    async fn gas_price(&self) -> Result<U256> {
        let res = self
            .rpc("eth_gasPrice", serde_json::json!([]))
            .await
            .wrap_err("eth_gasPrice failed")?;
        parse_quantity(&res)
    }

    async fn send_bundle(&self, ops: &[UserOperation], entrypoint: Address) -> Result<String> {
        let params = serde_json::json!([ops, entrypoint]);
        let res = self
            .rpc("eth_sendUserOperationBatch", params)
            .await
            .wrap_err("eth_sendUserOperationBatch failed")?;
        parse_receipt(&res)
    }
}

fn parse_quantity(v: &Value) -> Result<U256> {
    let s = v
        .as_str()
        .ok_or_else(|| eyre!("expected a hex quantity string, got: {v}"))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(digits, 16).map_err(|e| eyre!("invalid hex quantity {s}: {e}"))
}

fn parse_receipt(res: &Value) -> Result<String> {
    // Most relays return the receipt directly as a JSON string; some wrap it
    // in an object. Accept both shapes.
    if let Some(s) = res.as_str() {
        return Ok(s.to_string());
    }
    if let Some(s) = res.get("result").and_then(|v| v.as_str()) {
        return Ok(s.to_string());
    }
    if let Some(s) = res.get("bundleHash").and_then(|v| v.as_str()) {
        return Ok(s.to_string());
    }
    Err(eyre!(
        "unexpected eth_sendUserOperationBatch result shape (expected string or {{bundleHash: ...}}): {}",
        res
    ))
}
