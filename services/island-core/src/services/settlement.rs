//! Reward settlement.
//!
//! Disburses exactly one reward unit per (user, mission). The whole claim —
//! guard check, disbursement, ledger append, guard set — runs under a
//! per-(user, mission) mutex, which closes the check-then-act race on the
//! `reward_claimed` flag. On-chain submissions go through a single-writer
//! lock for the custodial account so its transactions never race each other.
//!
//! If a submission fails the claim fails and the guard stays unset, so the
//! user may retry. A submission that landed on-chain but whose
//! acknowledgement was lost can therefore be disbursed twice; the chain
//! offers no rollback, and this remains a documented reliability gap.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use island_chain::{to_wei, ChainClient, ContentStore, GasParams, SendOptions};
use island_core_types::{
    ClaimOutcome, Mission, MissionCatalog, NftItem, RewardKind, RewardLedgerEntry, RewardSpec,
    UserKey, UserRecord,
};
use island_storage::DocumentStore;

use crate::config::ChainConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::services::{load_user, update_user, LeaderboardService, TokenIdService, TRANSACTIONS};

/// Receipt for a direct native-token disbursement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardReceipt {
    pub success: bool,
    pub tx_hash: String,
}

/// Receipt for a direct NFT mint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub success: bool,
    pub tx_hash: String,
    pub token_id: u64,
    pub contract_address: String,
}

pub struct RewardService {
    store: Arc<dyn DocumentStore>,
    chain: Arc<dyn ChainClient>,
    content: Arc<dyn ContentStore>,
    catalog: Arc<MissionCatalog>,
    token_ids: Arc<TokenIdService>,
    leaderboard: Arc<LeaderboardService>,
    chain_config: ChainConfig,
    /// One mutex per (user, mission) pair, held across the whole claim.
    claim_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Single writer for the custodial account's on-chain submissions.
    submission_lock: Mutex<()>,
}

impl RewardService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        chain: Arc<dyn ChainClient>,
        content: Arc<dyn ContentStore>,
        catalog: Arc<MissionCatalog>,
        token_ids: Arc<TokenIdService>,
        leaderboard: Arc<LeaderboardService>,
        chain_config: ChainConfig,
    ) -> Self {
        RewardService {
            store,
            chain,
            content,
            catalog,
            token_ids,
            leaderboard,
            chain_config,
            claim_locks: Mutex::new(HashMap::new()),
            submission_lock: Mutex::new(()),
        }
    }

    async fn claim_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.claim_locks.lock().await;
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Drop the map entry once nobody else holds the lock, so the map stays
    /// bounded by the number of in-flight claims.
    async fn release_claim_lock(&self, key: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.claim_locks.lock().await;
        // Two owners left means the map's entry and our clone only.
        if Arc::strong_count(lock) == 2 {
            locks.remove(key);
        }
    }

    /// Settle the reward for a completed mission, at most once.
    pub async fn claim_reward(
        &self,
        user_key: &UserKey,
        mission_id: &str,
    ) -> ServiceResult<ClaimOutcome> {
        let mission = self
            .catalog
            .get(mission_id)
            .ok_or_else(|| ServiceError::not_found(format!("mission {}", mission_id)))?;
        let reward = match &mission.reward {
            Some(reward) => reward.clone(),
            None => return Ok(ClaimOutcome::no_reward()),
        };

        let key = format!("{}:{}", user_key, mission_id);
        let lock = self.claim_lock(&key).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.settle(user_key, mission_id, mission, &reward).await
        };
        self.release_claim_lock(&key, &lock).await;
        outcome
    }

    /// The guarded section of a claim. Caller holds the per-(user, mission)
    /// lock for the whole call.
    async fn settle(
        &self,
        user_key: &UserKey,
        mission_id: &str,
        mission: &Mission,
        reward: &RewardSpec,
    ) -> ServiceResult<ClaimOutcome> {
        let user = load_user(self.store.as_ref(), user_key)?;
        let progress = user.progress(mission_id);
        if !progress.completed {
            return Ok(ClaimOutcome::rejected("mission is not completed"));
        }
        if progress.reward_claimed {
            return Ok(ClaimOutcome::rejected("reward already claimed"));
        }

        let reason = if mission.title.is_empty() {
            format!("mission complete: {}", mission.id)
        } else {
            format!("mission complete: {}", mission.title)
        };

        let outcome = match reward {
            RewardSpec::NativeToken { amount } => {
                self.disburse_native(&user, *amount, &reason).await?
            }
            RewardSpec::Nft { nft_id } => self.disburse_nft(&user, nft_id, &reason).await?,
            RewardSpec::Points { amount } => self.disburse_points(&user, *amount, &reason)?,
        };

        // Only reached when disbursement succeeded.
        let now = Utc::now();
        let mission_id = mission_id.to_string();
        update_user(self.store.as_ref(), user_key, &mut |record| {
            let progress = record.missions.entry(mission_id.clone()).or_default();
            progress.reward_claimed = true;
            progress.claimed_at = Some(now);
        })?;

        info!(
            "reward for mission {} settled for {}",
            mission_id, user_key
        );
        Ok(outcome)
    }

    /// Submit a native-token transfer from the custodial account. Exposed as
    /// its own operation and reused by claim settlement.
    pub async fn send_native(
        &self,
        wallet_address: &str,
        amount: f64,
        reason: &str,
    ) -> ServiceResult<RewardReceipt> {
        if wallet_address.is_empty() {
            return Err(ServiceError::invalid_argument("wallet address required"));
        }
        if !(amount > 0.0) {
            return Err(ServiceError::invalid_argument(
                "amount must be greater than zero",
            ));
        }

        let submission = {
            let _writer = self.submission_lock.lock().await;
            self.chain
                .send_value_transfer(
                    &self.chain_config.custodial_address,
                    wallet_address,
                    to_wei(amount),
                    GasParams {
                        gas: self.chain_config.transfer_gas,
                        gas_price_gwei: self.chain_config.gas_price_gwei,
                    },
                )
                .await
                .map_err(|err| {
                    error!("native transfer to {} failed: {}", wallet_address, err);
                    ServiceError::Internal(anyhow!("reward transfer failed"))
                })?
        };

        self.log_transaction(
            &submission.tx_hash,
            json!({
                "type": "NATIVE_REWARD",
                "walletAddress": wallet_address,
                "amount": amount,
                "reason": reason,
                "txHash": submission.tx_hash,
                "timestamp": Utc::now(),
            }),
        )?;

        Ok(RewardReceipt {
            success: true,
            tx_hash: submission.tx_hash,
        })
    }

    /// Allocate a token id, upload metadata, and submit a mint call. Exposed
    /// as its own operation and reused by claim settlement.
    pub async fn mint_nft(
        &self,
        wallet_address: &str,
        nft_id: &str,
        metadata_override: Option<Value>,
    ) -> ServiceResult<MintReceipt> {
        if wallet_address.is_empty() {
            return Err(ServiceError::invalid_argument("wallet address required"));
        }
        let metadata = match metadata_override {
            Some(metadata) => metadata,
            None => {
                let def = self
                    .catalog
                    .nft(nft_id)
                    .ok_or_else(|| ServiceError::not_found(format!("nft {}", nft_id)))?;
                if def.metadata.is_null() {
                    json!({ "name": def.name, "image": def.image })
                } else {
                    def.metadata.clone()
                }
            }
        };

        let token_id = self.token_ids.next_token_id()?;
        let uri = self.content.upload(&metadata).await.map_err(|err| {
            error!("metadata upload for nft {} failed: {}", nft_id, err);
            ServiceError::Internal(anyhow!("metadata upload failed"))
        })?;

        let submission = {
            let _writer = self.submission_lock.lock().await;
            self.chain
                .call_contract_method(
                    &self.chain_config.nft_contract_address,
                    "mint",
                    vec![json!(wallet_address), json!(token_id), json!(uri)],
                    SendOptions {
                        from: self.chain_config.custodial_address.clone(),
                        gas: self.chain_config.mint_gas,
                        gas_price_gwei: self.chain_config.gas_price_gwei,
                    },
                )
                .await
                .map_err(|err| {
                    error!("mint of nft {} to {} failed: {}", nft_id, wallet_address, err);
                    ServiceError::Internal(anyhow!("nft mint failed"))
                })?
        };

        self.log_transaction(
            &submission.tx_hash,
            json!({
                "type": "NFT_MINT",
                "walletAddress": wallet_address,
                "nftId": nft_id,
                "tokenId": token_id,
                "metadataUri": uri,
                "txHash": submission.tx_hash,
                "timestamp": Utc::now(),
            }),
        )?;

        Ok(MintReceipt {
            success: true,
            tx_hash: submission.tx_hash,
            token_id,
            contract_address: self.chain_config.nft_contract_address.clone(),
        })
    }

    async fn disburse_native(
        &self,
        user: &UserRecord,
        amount: f64,
        reason: &str,
    ) -> ServiceResult<ClaimOutcome> {
        let receipt = self.send_native(&user.wallet_address, amount, reason).await?;

        let entry = RewardLedgerEntry {
            kind: RewardKind::NativeToken,
            amount: Some(amount),
            nft_id: None,
            reason: reason.to_string(),
            timestamp: Utc::now(),
            tx_hash: Some(receipt.tx_hash.clone()),
        };
        update_user(self.store.as_ref(), &user.user_key, &mut |record| {
            record.rewards.native_total += amount;
            record.rewards.history.push(entry.clone());
        })?;

        Ok(ClaimOutcome {
            success: true,
            message: "native token reward sent".to_string(),
            reward_kind: Some(RewardKind::NativeToken),
            tx_hash: Some(receipt.tx_hash),
            token_id: None,
            points: None,
        })
    }

    async fn disburse_nft(
        &self,
        user: &UserRecord,
        nft_id: &str,
        reason: &str,
    ) -> ServiceResult<ClaimOutcome> {
        let (name, image) = match self.catalog.nft(nft_id) {
            Some(def) => (def.name.clone(), def.image.clone()),
            None => return Err(ServiceError::not_found(format!("nft {}", nft_id))),
        };
        let receipt = self.mint_nft(&user.wallet_address, nft_id, None).await?;

        let now = Utc::now();
        let item = NftItem {
            nft_id: nft_id.to_string(),
            name,
            image,
            token_id: receipt.token_id,
            contract_address: receipt.contract_address.clone(),
            tx_hash: receipt.tx_hash.clone(),
            received_at: now,
        };
        let entry = RewardLedgerEntry {
            kind: RewardKind::Nft,
            amount: None,
            nft_id: Some(nft_id.to_string()),
            reason: reason.to_string(),
            timestamp: now,
            tx_hash: Some(receipt.tx_hash.clone()),
        };
        update_user(self.store.as_ref(), &user.user_key, &mut |record| {
            record.rewards.nfts.push(item.clone());
            record.rewards.history.push(entry.clone());
        })?;

        Ok(ClaimOutcome {
            success: true,
            message: "nft reward minted".to_string(),
            reward_kind: Some(RewardKind::Nft),
            tx_hash: Some(receipt.tx_hash),
            token_id: Some(receipt.token_id),
            points: None,
        })
    }

    fn disburse_points(
        &self,
        user: &UserRecord,
        amount: u64,
        reason: &str,
    ) -> ServiceResult<ClaimOutcome> {
        let entry = RewardLedgerEntry {
            kind: RewardKind::Points,
            amount: Some(amount as f64),
            nft_id: None,
            reason: reason.to_string(),
            timestamp: Utc::now(),
            tx_hash: None,
        };
        let updated = update_user(self.store.as_ref(), &user.user_key, &mut |record| {
            record.points += amount;
            record.rewards.history.push(entry.clone());
        })?;

        let period = self.leaderboard.current_period();
        self.leaderboard.record_points(&period, &updated)?;

        Ok(ClaimOutcome {
            success: true,
            message: format!("{} points awarded", amount),
            reward_kind: Some(RewardKind::Points),
            tx_hash: None,
            token_id: None,
            points: Some(updated.points),
        })
    }

    fn log_transaction(&self, tx_hash: &str, record: Value) -> ServiceResult<()> {
        self.store.set(TRANSACTIONS, tx_hash, record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use island_chain::{MemoryContentStore, MockChain};
    use island_core_types::{MissionRequirement, PlatformUser};
    use island_storage::{DocumentStoreExt, MemoryStore};

    use crate::config::ChainConfig;
    use crate::services::{LeaderboardService, TokenIdService, USERS};

    fn service_with_points_mission(store: Arc<MemoryStore>) -> RewardService {
        let catalog = MissionCatalog::new(
            vec![Mission {
                id: "m1".to_string(),
                title: String::new(),
                description: String::new(),
                order: 1,
                requirement: MissionRequirement::Install,
                prerequisites: vec![],
                reward: Some(RewardSpec::Points { amount: 10 }),
            }],
            vec![],
        )
        .unwrap();
        RewardService::new(
            store.clone(),
            Arc::new(MockChain::new()),
            Arc::new(MemoryContentStore::new("https://gateway.test/ipfs")),
            Arc::new(catalog),
            Arc::new(TokenIdService::new(store.clone(), false)),
            Arc::new(LeaderboardService::new(store)),
            ChainConfig {
                rpc_endpoint: String::new(),
                custodial_address: String::new(),
                custodial_private_key: String::new(),
                gas_price_gwei: 10,
                transfer_gas: 21_000,
                mint_gas: 500_000,
                nft_contract_address: String::new(),
            },
        )
    }

    #[tokio::test]
    async fn claim_locks_drain_once_claims_finish() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with_points_mission(store.clone());

        let platform = PlatformUser {
            id: 1,
            first_name: "Ada".to_string(),
            last_name: String::new(),
            username: String::new(),
        };
        let mut user = UserRecord::new(&platform, "0xabc", chrono::Utc::now());
        user.missions.entry("m1".to_string()).or_default().completed = true;
        store.set_as(USERS, user.user_key.as_str(), &user).unwrap();

        let outcome = service.claim_reward(&user.user_key, "m1").await.unwrap();
        assert!(outcome.success);
        assert!(service.claim_locks.lock().await.is_empty());

        // Rejected claims leave no entry behind either.
        let rejected = service.claim_reward(&user.user_key, "m1").await.unwrap();
        assert!(!rejected.success);
        assert!(service.claim_locks.lock().await.is_empty());
    }
}
