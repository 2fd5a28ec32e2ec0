//! Monotonic NFT token-id allocation.
//!
//! One counter document, advanced under a serializable read-modify-write, so
//! concurrent allocations never observe the same prior value. Conflicted
//! transactions are retried a bounded number of times. The wall-clock
//! fallback of the original deployment survives only behind the
//! `allocator.clock_fallback` config switch; the default is a hard failure.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use log::warn;
use serde_json::{json, Value};

use island_storage::{DocumentStore, StorageError};

use crate::error::{ServiceError, ServiceResult};
use crate::services::COUNTERS;

const NFT_COUNTER_KEY: &str = "nft_token_id";
const MAX_ALLOC_RETRIES: usize = 5;

pub struct TokenIdService {
    store: Arc<dyn DocumentStore>,
    clock_fallback: bool,
}

impl TokenIdService {
    pub fn new(store: Arc<dyn DocumentStore>, clock_fallback: bool) -> Self {
        TokenIdService {
            store,
            clock_fallback,
        }
    }

    /// Allocate the next token id, strictly greater than every id allocated
    /// before it.
    pub fn next_token_id(&self) -> ServiceResult<u64> {
        for attempt in 0..MAX_ALLOC_RETRIES {
            let result = self
                .store
                .transact(COUNTERS, NFT_COUNTER_KEY, &mut |current| {
                    let prev = current
                        .as_ref()
                        .and_then(|v| v.get("value"))
                        .and_then(Value::as_u64)
                        .unwrap_or(0);
                    Ok(Some(json!({ "value": prev + 1 })))
                });

            match result {
                Ok(Some(committed)) => {
                    return committed
                        .get("value")
                        .and_then(Value::as_u64)
                        .ok_or_else(|| {
                            ServiceError::Internal(anyhow!("counter committed without a value"))
                        });
                }
                Ok(None) => {
                    return Err(ServiceError::Internal(anyhow!(
                        "counter transaction committed nothing"
                    )))
                }
                Err(StorageError::Conflict { .. }) => {
                    warn!(
                        "token id allocation conflict, retry {}/{}",
                        attempt + 1,
                        MAX_ALLOC_RETRIES
                    );
                    continue;
                }
                Err(err) => return self.fall_back(err),
            }
        }
        self.fall_back(StorageError::Backend(
            "token id allocation exhausted retries".to_string(),
        ))
    }

    fn fall_back(&self, err: StorageError) -> ServiceResult<u64> {
        if self.clock_fallback {
            // Collision-prone under failure storms; opt-in only.
            warn!(
                "token id allocation failed ({}), falling back to wall-clock seconds",
                err
            );
            Ok(Utc::now().timestamp().max(0) as u64)
        } else {
            Err(err.into())
        }
    }
}
