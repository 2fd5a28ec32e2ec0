//! Scriptable chain mock for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::{ChainClient, ChainError, GasParams, SendOptions, TxRecord, TxSubmission};

/// A transaction the mock accepted for submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    ValueTransfer {
        from: String,
        to: String,
        value_wei: u128,
        tx_hash: String,
    },
    ContractCall {
        contract: String,
        method: String,
        args: Vec<Value>,
        from: String,
        tx_hash: String,
    },
}

#[derive(Default)]
pub struct MockChain {
    transactions: Mutex<HashMap<String, TxRecord>>,
    code: Mutex<HashMap<String, String>>,
    signers: Mutex<HashMap<(String, String), String>>,
    submissions: Mutex<Vec<Submission>>,
    fail_submissions: AtomicBool,
    next_hash: AtomicU64,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a confirmed transaction for `get_transaction`.
    pub fn insert_transaction(&self, record: TxRecord) {
        if let Ok(mut map) = self.transactions.lock() {
            map.insert(record.hash.clone(), record);
        }
    }

    /// Script deployed bytecode for `get_code`.
    pub fn set_code(&self, address: &str, bytecode: &str) {
        if let Ok(mut map) = self.code.lock() {
            map.insert(address.to_lowercase(), bytecode.to_string());
        }
    }

    /// Script a signature recovery result.
    pub fn set_signer(&self, message: &str, signature: &str, address: &str) {
        if let Ok(mut map) = self.signers.lock() {
            map.insert(
                (message.to_string(), signature.to_string()),
                address.to_string(),
            );
        }
    }

    /// Make subsequent submissions fail with an RPC error.
    pub fn fail_submissions(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::SeqCst);
    }

    /// Everything submitted so far, in order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn allocate_hash(&self) -> String {
        let n = self.next_hash.fetch_add(1, Ordering::SeqCst);
        format!("0xmock{:08x}", n)
    }

    fn record(&self, submission: Submission) {
        if let Ok(mut list) = self.submissions.lock() {
            list.push(submission);
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_transaction(&self, hash: &str) -> Result<Option<TxRecord>, ChainError> {
        Ok(self
            .transactions
            .lock()
            .map_err(|_| ChainError::Rpc("mock lock poisoned".to_string()))?
            .get(hash)
            .cloned())
    }

    async fn get_code(&self, address: &str) -> Result<String, ChainError> {
        Ok(self
            .code
            .lock()
            .map_err(|_| ChainError::Rpc("mock lock poisoned".to_string()))?
            .get(&address.to_lowercase())
            .cloned()
            .unwrap_or_else(|| "0x".to_string()))
    }

    async fn send_value_transfer(
        &self,
        from: &str,
        to: &str,
        value_wei: u128,
        _gas: GasParams,
    ) -> Result<TxSubmission, ChainError> {
        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc("mock submission failure".to_string()));
        }
        let tx_hash = self.allocate_hash();
        self.record(Submission::ValueTransfer {
            from: from.to_string(),
            to: to.to_string(),
            value_wei,
            tx_hash: tx_hash.clone(),
        });
        Ok(TxSubmission { tx_hash })
    }

    async fn call_contract_method(
        &self,
        contract: &str,
        method: &str,
        args: Vec<Value>,
        opts: SendOptions,
    ) -> Result<TxSubmission, ChainError> {
        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc("mock submission failure".to_string()));
        }
        let tx_hash = self.allocate_hash();
        self.record(Submission::ContractCall {
            contract: contract.to_string(),
            method: method.to_string(),
            args,
            from: opts.from,
            tx_hash: tx_hash.clone(),
        });
        Ok(TxSubmission { tx_hash })
    }

    async fn recover_signer(&self, message: &str, signature: &str) -> Result<String, ChainError> {
        self.signers
            .lock()
            .map_err(|_| ChainError::Rpc("mock lock poisoned".to_string()))?
            .get(&(message.to_string(), signature.to_string()))
            .cloned()
            .ok_or_else(|| ChainError::Rpc("unable to recover signer".to_string()))
    }
}
