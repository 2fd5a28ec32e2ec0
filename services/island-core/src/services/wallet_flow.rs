//! Two-phase mobile wallet flows.
//!
//! Deep-linked wallet interactions (install detection, connect, sign) hand
//! control to another app and resume out-of-band. Each flow is initiated
//! under a correlation token and later resolved by a completion callback
//! carrying that token. A flow that nobody completes within the timeout
//! reads as declined / not installed, which is an answer, not an error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowStatus {
    Pending,
    Completed { result: Value },
    /// Timed out without a completion callback.
    Expired,
    /// Token was never issued or has been pruned.
    Unknown,
}

struct PendingFlow {
    #[allow(dead_code)]
    kind: String,
    created_at: Instant,
    result: Option<Value>,
}

pub struct WalletFlowService {
    pending: Mutex<HashMap<String, PendingFlow>>,
    sequence: AtomicU64,
    timeout: Duration,
}

impl WalletFlowService {
    pub fn new(timeout: Duration) -> Self {
        WalletFlowService {
            pending: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            timeout,
        }
    }

    fn expired(&self, flow: &PendingFlow) -> bool {
        flow.result.is_none() && flow.created_at.elapsed() > self.timeout
    }

    /// Start a flow and hand back its correlation token.
    pub fn initiate(&self, kind: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(seq.to_be_bytes());
        hasher.update(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
                .to_be_bytes(),
        );
        hasher.update(kind.as_bytes());
        let token = hex::encode(&hasher.finalize()[..16]);

        if let Ok(mut pending) = self.pending.lock() {
            // Drop long-expired flows so the map does not grow unbounded.
            let horizon = self.timeout * 10;
            pending.retain(|_, flow| {
                flow.result.is_some() || flow.created_at.elapsed() < horizon
            });
            pending.insert(
                token.clone(),
                PendingFlow {
                    kind: kind.to_string(),
                    created_at: Instant::now(),
                    result: None,
                },
            );
        }
        token
    }

    /// Out-of-band completion callback. Returns whether the token matched a
    /// live pending flow.
    pub fn complete(&self, token: &str, result: Value) -> bool {
        let mut pending = match self.pending.lock() {
            Ok(pending) => pending,
            Err(_) => return false,
        };
        match pending.get_mut(token) {
            Some(flow) if flow.result.is_none() && flow.created_at.elapsed() <= self.timeout => {
                flow.result = Some(result);
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, token: &str) -> FlowStatus {
        let pending = match self.pending.lock() {
            Ok(pending) => pending,
            Err(_) => return FlowStatus::Unknown,
        };
        match pending.get(token) {
            None => FlowStatus::Unknown,
            Some(flow) => match &flow.result {
                Some(result) => FlowStatus::Completed {
                    result: result.clone(),
                },
                None if self.expired(flow) => FlowStatus::Expired,
                None => FlowStatus::Pending,
            },
        }
    }

    /// Number of flows still awaiting completion.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .map(|p| p.values().filter(|f| f.result.is_none() && !self.expired(f)).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flow_completes_by_token() {
        let service = WalletFlowService::new(Duration::from_secs(5));
        let token = service.initiate("connect");
        assert_eq!(service.status(&token), FlowStatus::Pending);

        assert!(service.complete(&token, json!({"walletAddress": "0xabc"})));
        assert_eq!(
            service.status(&token),
            FlowStatus::Completed {
                result: json!({"walletAddress": "0xabc"})
            }
        );
        // A second completion for the same token is rejected.
        assert!(!service.complete(&token, json!({})));
    }

    #[test]
    fn flow_expires_into_declined() {
        let service = WalletFlowService::new(Duration::from_millis(0));
        let token = service.initiate("install_check");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(service.status(&token), FlowStatus::Expired);
        assert!(!service.complete(&token, json!(true)));
    }

    #[test]
    fn unknown_token() {
        let service = WalletFlowService::new(Duration::from_secs(1));
        assert_eq!(service.status("nope"), FlowStatus::Unknown);
    }

    #[test]
    fn tokens_are_unique() {
        let service = WalletFlowService::new(Duration::from_secs(1));
        let a = service.initiate("connect");
        let b = service.initiate("connect");
        assert_ne!(a, b);
    }
}
