//! High-level service facade wired from the per-concern services.
//!
//! Every state-mutating operation is gated on the caller's auth payload: the
//! signed login string is the credential and is re-verified per call. A user
//! key may only be acted on by the platform identity embedded in it.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use island_chain::{ChainClient, ContentStore};
use island_core_types::{
    ClaimOutcome, LeaderboardEntry, Mission, MissionCatalog, RankInfo, RewardLedger, UserKey,
    UserRecord, VerificationOutcome,
};
use island_storage::DocumentStore;

use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::services::{
    FlowStatus, IdentityService, LeaderboardService, LoginVerification, MintReceipt,
    MissionProgressView, MissionService, RewardReceipt, RewardService, TokenIdService,
    VerificationData, WalletFlowService,
};

#[derive(Clone)]
pub struct IslandService {
    identity: Arc<IdentityService>,
    missions: Arc<MissionService>,
    rewards: Arc<RewardService>,
    leaderboard: Arc<LeaderboardService>,
    wallet_flow: Arc<WalletFlowService>,
    catalog: Arc<MissionCatalog>,
}

impl IslandService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        chain: Arc<dyn ChainClient>,
        content: Arc<dyn ContentStore>,
        catalog: Arc<MissionCatalog>,
        config: Config,
    ) -> Self {
        let identity = Arc::new(IdentityService::new(
            config.platform.bot_secret.clone(),
            chain.clone(),
            store.clone(),
        ));
        let missions = Arc::new(MissionService::new(
            catalog.clone(),
            store.clone(),
            chain.clone(),
        ));
        let token_ids = Arc::new(TokenIdService::new(
            store.clone(),
            config.allocator.clock_fallback,
        ));
        let leaderboard = Arc::new(LeaderboardService::new(store.clone()));
        let rewards = Arc::new(RewardService::new(
            store,
            chain,
            content,
            catalog.clone(),
            token_ids,
            leaderboard.clone(),
            config.chain.clone(),
        ));
        let wallet_flow = Arc::new(WalletFlowService::new(Duration::from_millis(
            config.wallet_flow.timeout_ms,
        )));

        IslandService {
            identity,
            missions,
            rewards,
            leaderboard,
            wallet_flow,
            catalog,
        }
    }

    /// Authenticate and check the user key belongs to the caller.
    fn authorize(&self, auth: &str, user_key: &str) -> ServiceResult<UserKey> {
        let platform = self.identity.authenticate(auth)?;
        let key = UserKey::parse(user_key)
            .ok_or_else(|| ServiceError::invalid_argument("malformed user key"))?;
        if key.platform_id() != platform.id {
            return Err(ServiceError::unauthenticated(
                "user key does not belong to the caller",
            ));
        }
        Ok(key)
    }

    // ---- identity ----------------------------------------------------------

    pub fn verify_platform_login(&self, raw_payload: &str) -> LoginVerification {
        self.identity.verify_platform_login(raw_payload)
    }

    pub async fn verify_wallet_signature(
        &self,
        address: &str,
        message: &str,
        signature: &str,
    ) -> bool {
        self.identity
            .verify_wallet_ownership(message, signature, address)
            .await
    }

    /// First wallet-connect handshake: verified login plus a wallet
    /// ownership proof create (or return) the user record.
    pub async fn connect_wallet(
        &self,
        auth: &str,
        wallet_address: &str,
        message: &str,
        signature: &str,
    ) -> ServiceResult<UserRecord> {
        let platform = self.identity.authenticate(auth)?;
        if wallet_address.is_empty() {
            return Err(ServiceError::invalid_argument("wallet address required"));
        }
        if !self
            .identity
            .verify_wallet_ownership(message, signature, wallet_address)
            .await
        {
            return Err(ServiceError::unauthenticated(
                "wallet ownership proof rejected",
            ));
        }
        self.identity.ensure_user(&platform, wallet_address)
    }

    // ---- missions ----------------------------------------------------------

    pub fn missions(&self) -> &[Mission] {
        self.catalog.all()
    }

    pub async fn verify_mission(
        &self,
        auth: &str,
        user_key: &str,
        mission_id: &str,
        data: &VerificationData,
    ) -> ServiceResult<VerificationOutcome> {
        let key = self.authorize(auth, user_key)?;
        self.missions.verify(&key, mission_id, data).await
    }

    pub fn mission_progress(
        &self,
        auth: &str,
        user_key: &str,
    ) -> ServiceResult<Vec<MissionProgressView>> {
        let key = self.authorize(auth, user_key)?;
        self.missions.progress_for(&key)
    }

    // ---- rewards -----------------------------------------------------------

    pub async fn claim_reward(
        &self,
        auth: &str,
        user_key: &str,
        mission_id: &str,
    ) -> ServiceResult<ClaimOutcome> {
        let key = self.authorize(auth, user_key)?;
        self.rewards.claim_reward(&key, mission_id).await
    }

    pub async fn send_native_reward(
        &self,
        auth: &str,
        wallet_address: &str,
        amount: f64,
        reason: &str,
    ) -> ServiceResult<RewardReceipt> {
        self.identity.authenticate(auth)?;
        self.rewards.send_native(wallet_address, amount, reason).await
    }

    pub async fn mint_nft_reward(
        &self,
        auth: &str,
        wallet_address: &str,
        nft_id: &str,
        metadata: Option<Value>,
    ) -> ServiceResult<MintReceipt> {
        self.identity.authenticate(auth)?;
        self.rewards.mint_nft(wallet_address, nft_id, metadata).await
    }

    pub fn user_rewards(&self, auth: &str, user_key: &str) -> ServiceResult<RewardLedger> {
        let key = self.authorize(auth, user_key)?;
        Ok(self.identity.get_user(&key)?.rewards)
    }

    // ---- leaderboard -------------------------------------------------------

    pub fn leaderboard_top(&self, limit: usize) -> ServiceResult<(String, Vec<LeaderboardEntry>)> {
        let period = self.leaderboard.current_period();
        let entries = self.leaderboard.top_n(&period, limit)?;
        Ok((period, entries))
    }

    pub fn leaderboard_rank(&self, user_key: &str) -> ServiceResult<RankInfo> {
        let key = UserKey::parse(user_key)
            .ok_or_else(|| ServiceError::invalid_argument("malformed user key"))?;
        let period = self.leaderboard.current_period();
        self.leaderboard.rank_of(&period, &key)
    }

    // ---- wallet flows ------------------------------------------------------

    pub fn wallet_flow_initiate(&self, kind: &str) -> String {
        self.wallet_flow.initiate(kind)
    }

    pub fn wallet_flow_complete(&self, token: &str, result: Value) -> bool {
        self.wallet_flow.complete(token, result)
    }

    pub fn wallet_flow_status(&self, token: &str) -> FlowStatus {
        self.wallet_flow.status(token)
    }

    // ---- health ------------------------------------------------------------

    pub fn health_check(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            current_period: self.leaderboard.current_period(),
            missions: self.catalog.all().len(),
            pending_wallet_flows: self.wallet_flow.pending_count(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthStatus {
    pub status: String,
    pub current_period: String,
    pub missions: usize,
    pub pending_wallet_flows: usize,
}
