//! Island Quest Chain Collaborators
//!
//! The backend treats the blockchain as an opaque RPC endpoint with five
//! capabilities: read a transaction by hash, read account/contract code,
//! send a value transfer, call a contract method, and recover the signer of
//! a signed message. [`ChainClient`] captures exactly that contract; the
//! production implementation speaks JSON-RPC to the configured node and
//! [`mock::MockChain`] scripts it for tests.
//!
//! [`ContentStore`] is the second collaborator: a content-addressed metadata
//! host (NFT metadata upload, gateway URL resolution).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub mod mock;
pub mod rpc;

pub use mock::{MockChain, Submission};
pub use rpc::JsonRpcChainClient;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("chain rpc error: {0}")]
    Rpc(String),

    #[error("malformed chain response: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("content upload failed: {0}")]
    Upload(String),

    #[error("content serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A confirmed transaction as read back from the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxRecord {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value_wei: u128,
}

/// Receipt for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxSubmission {
    pub tx_hash: String,
}

/// Gas settings for a value transfer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasParams {
    pub gas: u64,
    pub gas_price_gwei: u64,
}

/// Submission settings for a contract method call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendOptions {
    pub from: String,
    pub gas: u64,
    pub gas_price_gwei: u64,
}

/// Opaque RPC contract with the chain node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Look up a transaction by hash. `None` means the chain has no record.
    async fn get_transaction(&self, hash: &str) -> Result<Option<TxRecord>, ChainError>;

    /// Bytecode at an address, hex-encoded. Empty accounts report `"0x"`.
    async fn get_code(&self, address: &str) -> Result<String, ChainError>;

    /// Submit a native-token transfer. Cannot be rolled back once accepted.
    async fn send_value_transfer(
        &self,
        from: &str,
        to: &str,
        value_wei: u128,
        gas: GasParams,
    ) -> Result<TxSubmission, ChainError>;

    /// Submit a contract method call. Cannot be rolled back once accepted.
    async fn call_contract_method(
        &self,
        contract: &str,
        method: &str,
        args: Vec<Value>,
        opts: SendOptions,
    ) -> Result<TxSubmission, ChainError>;

    /// Recover the address that signed `message`.
    async fn recover_signer(&self, message: &str, signature: &str) -> Result<String, ChainError>;
}

/// Content-addressed metadata host.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Upload a JSON payload, returning its content URI.
    async fn upload(&self, payload: &Value) -> Result<String, ContentError>;

    /// Resolve a content URI to a fetchable gateway URL.
    fn resolve_url(&self, uri: &str) -> String;
}

/// Convert a whole-token amount to wei (18 decimals). Non-finite or negative
/// amounts clamp to zero.
pub fn to_wei(amount: f64) -> u128 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    (amount * 1e18).round() as u128
}

/// Case-insensitive address comparison.
pub fn address_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Whether a `get_code` response represents deployed bytecode.
pub fn has_code(bytecode: &str) -> bool {
    !bytecode.is_empty() && bytecode != "0x" && bytecode != "0X"
}

/// In-memory content store: payloads are addressed by the SHA-256 of their
/// canonical JSON encoding, mirroring how a pinning service would address
/// them. Used for development and tests; pinning backends share the trait.
pub struct MemoryContentStore {
    gateway_base: String,
    stored: std::sync::Mutex<std::collections::HashMap<String, Value>>,
}

impl MemoryContentStore {
    pub fn new(gateway_base: impl Into<String>) -> Self {
        MemoryContentStore {
            gateway_base: gateway_base.into(),
            stored: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.stored.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn upload(&self, payload: &Value) -> Result<String, ContentError> {
        let canonical = serde_json::to_string(payload)?;
        let digest = Sha256::digest(canonical.as_bytes());
        let uri = format!("ipfs://{}", hex::encode(digest));
        self.stored
            .lock()
            .map_err(|_| ContentError::Upload("content store lock poisoned".to_string()))?
            .insert(uri.clone(), payload.clone());
        Ok(uri)
    }

    fn resolve_url(&self, uri: &str) -> String {
        format!(
            "{}/{}",
            self.gateway_base.trim_end_matches('/'),
            uri.trim_start_matches("ipfs://")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wei_conversion() {
        assert_eq!(to_wei(1.0), 1_000_000_000_000_000_000);
        assert_eq!(to_wei(0.01), 10_000_000_000_000_000);
        assert_eq!(to_wei(-3.0), 0);
        assert_eq!(to_wei(f64::NAN), 0);
    }

    #[test]
    fn address_comparison_ignores_case() {
        assert!(address_eq("0xAbC", "0xaBc"));
        assert!(!address_eq("0xabc", "0xabd"));
    }

    #[test]
    fn code_detection() {
        assert!(!has_code(""));
        assert!(!has_code("0x"));
        assert!(has_code("0x6080"));
    }

    #[tokio::test]
    async fn content_store_is_content_addressed() {
        let store = MemoryContentStore::new("https://gateway.example/ipfs");
        let a = store.upload(&json!({"name": "badge1"})).await.unwrap();
        let b = store.upload(&json!({"name": "badge1"})).await.unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("ipfs://"));
        assert!(store
            .resolve_url(&a)
            .starts_with("https://gateway.example/ipfs/"));
    }
}
