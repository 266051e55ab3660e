use std::fmt;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};

use crate::types::{parse_quantity, Address, TransactionReceipt, TransactionRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    Transport(String),
    Node(String),
    Parsing(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Transport(message) => write!(f, "transport error: {}", message),
            RpcError::Node(message) => write!(f, "node error: {}", message),
            RpcError::Parsing(message) => write!(f, "response parsing error: {}", message),
        }
    }
}

pub struct EvmRpc {
    pub url: String,
    pub client: Client,
}

#[derive(Deserialize, Debug)]
struct JsonRpcResponse {
    result: Option<JsonValue>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize, Debug)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

impl EvmRpc {
    pub fn new(url: &str) -> EvmRpc {
        EvmRpc {
            url: url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn call<T>(&self, method: &str, params: JsonValue) -> Result<T, RpcError>
    where
        T: DeserializeOwned,
    {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let res = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        if !res.status().is_success() {
            return Err(RpcError::Transport(format!(
                "node responded with HTTP {}",
                res.status()
            )));
        }
        let response: JsonRpcResponse = res
            .json()
            .map_err(|e| RpcError::Parsing(e.to_string()))?;
        if let Some(error) = response.error {
            return Err(RpcError::Node(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }
        let result = response
            .result
            .ok_or_else(|| RpcError::Parsing("missing result field".to_string()))?;
        serde_json::from_value(result).map_err(|e| RpcError::Parsing(e.to_string()))
    }

    fn call_quantity(&self, method: &str, params: JsonValue) -> Result<u64, RpcError> {
        let encoded: String = self.call(method, params)?;
        parse_quantity(&encoded).map_err(RpcError::Parsing)
    }

    pub fn get_client_version(&self) -> Result<String, RpcError> {
        self.call("web3_clientVersion", json!([]))
    }

    pub fn get_chain_id(&self) -> Result<u64, RpcError> {
        self.call_quantity("eth_chainId", json!([]))
    }

    pub fn get_block_number(&self) -> Result<u64, RpcError> {
        self.call_quantity("eth_blockNumber", json!([]))
    }

    /// Sender sequence number, pending transactions included.
    pub fn get_transaction_count(&self, address: &Address) -> Result<u64, RpcError> {
        self.call_quantity(
            "eth_getTransactionCount",
            json!([address.to_string(), "pending"]),
        )
    }

    pub fn send_transaction(&self, transaction: &TransactionRequest) -> Result<String, RpcError> {
        self.call("eth_sendTransaction", json!([transaction]))
    }

    pub fn get_transaction_receipt(
        &self,
        transaction_hash: &str,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        let value: JsonValue =
            self.call("eth_getTransactionReceipt", json!([transaction_hash]))?;
        if value.is_null() {
            return Ok(None);
        }
        let receipt = serde_json::from_value(value).map_err(|e| RpcError::Parsing(e.to_string()))?;
        Ok(Some(receipt))
    }
}
