use anyhow::Result;
use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::ServerBuilder;
use jsonrpsee::types::error::{ErrorCode, ErrorObject};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;

use island_core_types::{ClaimOutcome, Mission, RankInfo, RewardLedger, UserRecord, VerificationOutcome};

use crate::error::ServiceError;
use crate::service::{HealthStatus, IslandService};
use crate::services::{
    FlowStatus, LoginVerification, MintReceipt, MissionProgressView, RewardReceipt,
    VerificationData,
};

const UNAUTHENTICATED_CODE: i32 = -32001;
const NOT_FOUND_CODE: i32 = -32004;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignatureCheck {
    pub is_valid: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConnectWalletRequest {
    pub auth: String,
    pub wallet_address: String,
    pub message: String,
    pub signature: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerifyMissionRequest {
    pub auth: String,
    pub user_key: String,
    pub mission_id: String,
    #[serde(default)]
    pub verification_data: VerificationData,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRewardRequest {
    pub auth: String,
    pub user_key: String,
    pub mission_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SendNativeRewardRequest {
    pub auth: String,
    pub wallet_address: String,
    pub amount: f64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MintNftRewardRequest {
    pub auth: String,
    pub wallet_address: String,
    pub nft_id: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserScopedRequest {
    pub auth: String,
    pub user_key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LeaderboardView {
    pub period: String,
    pub entries: Vec<island_core_types::LeaderboardEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FlowToken {
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FlowAck {
    pub accepted: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VersionInfo {
    pub version: String,
}

/// JSON-RPC API trait definition
#[rpc(server)]
pub trait IslandJsonRpcApi {
    /// Validate a signed platform login payload. This is the auth step, so
    /// it requires none itself.
    #[method(name = "verifyPlatformLogin")]
    async fn verify_platform_login(
        &self,
        payload: String,
    ) -> Result<LoginVerification, ErrorObject<'static>>;

    /// Check a wallet-ownership signature
    #[method(name = "verifyWalletSignature")]
    async fn verify_wallet_signature(
        &self,
        address: String,
        message: String,
        signature: String,
    ) -> Result<SignatureCheck, ErrorObject<'static>>;

    /// Wallet-connect handshake; creates the user on first success
    #[method(name = "connectWallet")]
    async fn connect_wallet(
        &self,
        request: ConnectWalletRequest,
    ) -> Result<UserRecord, ErrorObject<'static>>;

    /// The mission catalog, in display order
    #[method(name = "getMissions")]
    async fn get_missions(&self) -> Result<Vec<Mission>, ErrorObject<'static>>;

    /// Verify a mission with user-submitted evidence
    #[method(name = "verifyMission")]
    async fn verify_mission(
        &self,
        request: VerifyMissionRequest,
    ) -> Result<VerificationOutcome, ErrorObject<'static>>;

    /// Catalog joined with the caller's progress
    #[method(name = "getMissionProgress")]
    async fn get_mission_progress(
        &self,
        request: UserScopedRequest,
    ) -> Result<Vec<MissionProgressView>, ErrorObject<'static>>;

    /// Settle the reward for a completed mission
    #[method(name = "claimReward")]
    async fn claim_reward(
        &self,
        request: ClaimRewardRequest,
    ) -> Result<ClaimOutcome, ErrorObject<'static>>;

    /// Direct native-token disbursement from the custodial account
    #[method(name = "sendNativeReward")]
    async fn send_native_reward(
        &self,
        request: SendNativeRewardRequest,
    ) -> Result<RewardReceipt, ErrorObject<'static>>;

    /// Direct NFT mint to a wallet
    #[method(name = "mintNftReward")]
    async fn mint_nft_reward(
        &self,
        request: MintNftRewardRequest,
    ) -> Result<MintReceipt, ErrorObject<'static>>;

    /// The caller's reward ledger
    #[method(name = "getRewards")]
    async fn get_rewards(
        &self,
        request: UserScopedRequest,
    ) -> Result<RewardLedger, ErrorObject<'static>>;

    /// Top entries for the current period
    #[method(name = "getLeaderboard")]
    async fn get_leaderboard(
        &self,
        limit: Option<usize>,
    ) -> Result<LeaderboardView, ErrorObject<'static>>;

    /// A user's rank in the current period
    #[method(name = "getLeaderboardRank")]
    async fn get_leaderboard_rank(
        &self,
        user_key: String,
    ) -> Result<RankInfo, ErrorObject<'static>>;

    /// Start a two-phase wallet flow
    #[method(name = "walletFlowInitiate")]
    async fn wallet_flow_initiate(&self, kind: String) -> Result<FlowToken, ErrorObject<'static>>;

    /// Out-of-band completion callback for a wallet flow
    #[method(name = "walletFlowComplete")]
    async fn wallet_flow_complete(
        &self,
        token: String,
        result: Value,
    ) -> Result<FlowAck, ErrorObject<'static>>;

    /// Poll a wallet flow
    #[method(name = "walletFlowStatus")]
    async fn wallet_flow_status(&self, token: String) -> Result<FlowStatus, ErrorObject<'static>>;

    /// Health check
    #[method(name = "health")]
    async fn health(&self) -> Result<HealthStatus, ErrorObject<'static>>;

    /// Get version
    #[method(name = "version")]
    async fn version(&self) -> Result<VersionInfo, ErrorObject<'static>>;
}

/// JSON-RPC server implementation
#[derive(Clone)]
pub struct JsonRpcServerImpl {
    service: IslandService,
}

impl JsonRpcServerImpl {
    pub fn new(service: IslandService) -> Self {
        Self { service }
    }

    pub async fn start(&self, addr: SocketAddr) -> Result<impl std::future::Future<Output = ()>> {
        let server = ServerBuilder::default().build(addr).await?;

        let handle = server.start(self.clone().into_rpc());

        Ok(async move { handle.stopped().await })
    }

    /// Caller-input problems keep their stable kind and message; provider
    /// and storage failures collapse to a generic internal error so nothing
    /// from the backend leaks to clients.
    fn map_service_error(err: ServiceError) -> ErrorObject<'static> {
        match err {
            ServiceError::Unauthenticated { message } => ErrorObject::owned(
                UNAUTHENTICATED_CODE,
                format!("unauthenticated: {}", message),
                None::<()>,
            ),
            ServiceError::InvalidArgument { message } => ErrorObject::owned(
                ErrorCode::InvalidParams.code(),
                format!("invalid argument: {}", message),
                None::<()>,
            ),
            ServiceError::NotFound { what } => ErrorObject::owned(
                NOT_FOUND_CODE,
                format!("not found: {}", what),
                None::<()>,
            ),
            other => {
                error!("internal error: {}", other);
                ErrorObject::owned(
                    ErrorCode::InternalError.code(),
                    "internal error",
                    None::<()>,
                )
            }
        }
    }
}

#[async_trait]
impl IslandJsonRpcApiServer for JsonRpcServerImpl {
    async fn verify_platform_login(
        &self,
        payload: String,
    ) -> Result<LoginVerification, ErrorObject<'static>> {
        Ok(self.service.verify_platform_login(&payload))
    }

    async fn verify_wallet_signature(
        &self,
        address: String,
        message: String,
        signature: String,
    ) -> Result<SignatureCheck, ErrorObject<'static>> {
        let is_valid = self
            .service
            .verify_wallet_signature(&address, &message, &signature)
            .await;
        Ok(SignatureCheck { is_valid })
    }

    async fn connect_wallet(
        &self,
        request: ConnectWalletRequest,
    ) -> Result<UserRecord, ErrorObject<'static>> {
        self.service
            .connect_wallet(
                &request.auth,
                &request.wallet_address,
                &request.message,
                &request.signature,
            )
            .await
            .map_err(Self::map_service_error)
    }

    async fn get_missions(&self) -> Result<Vec<Mission>, ErrorObject<'static>> {
        Ok(self.service.missions().to_vec())
    }

    async fn verify_mission(
        &self,
        request: VerifyMissionRequest,
    ) -> Result<VerificationOutcome, ErrorObject<'static>> {
        self.service
            .verify_mission(
                &request.auth,
                &request.user_key,
                &request.mission_id,
                &request.verification_data,
            )
            .await
            .map_err(Self::map_service_error)
    }

    async fn get_mission_progress(
        &self,
        request: UserScopedRequest,
    ) -> Result<Vec<MissionProgressView>, ErrorObject<'static>> {
        self.service
            .mission_progress(&request.auth, &request.user_key)
            .map_err(Self::map_service_error)
    }

    async fn claim_reward(
        &self,
        request: ClaimRewardRequest,
    ) -> Result<ClaimOutcome, ErrorObject<'static>> {
        self.service
            .claim_reward(&request.auth, &request.user_key, &request.mission_id)
            .await
            .map_err(Self::map_service_error)
    }

    async fn send_native_reward(
        &self,
        request: SendNativeRewardRequest,
    ) -> Result<RewardReceipt, ErrorObject<'static>> {
        self.service
            .send_native_reward(
                &request.auth,
                &request.wallet_address,
                request.amount,
                &request.reason,
            )
            .await
            .map_err(Self::map_service_error)
    }

    async fn mint_nft_reward(
        &self,
        request: MintNftRewardRequest,
    ) -> Result<MintReceipt, ErrorObject<'static>> {
        self.service
            .mint_nft_reward(
                &request.auth,
                &request.wallet_address,
                &request.nft_id,
                request.metadata,
            )
            .await
            .map_err(Self::map_service_error)
    }

    async fn get_rewards(
        &self,
        request: UserScopedRequest,
    ) -> Result<RewardLedger, ErrorObject<'static>> {
        self.service
            .user_rewards(&request.auth, &request.user_key)
            .map_err(Self::map_service_error)
    }

    async fn get_leaderboard(
        &self,
        limit: Option<usize>,
    ) -> Result<LeaderboardView, ErrorObject<'static>> {
        let (period, entries) = self
            .service
            .leaderboard_top(limit.unwrap_or(10))
            .map_err(Self::map_service_error)?;
        Ok(LeaderboardView { period, entries })
    }

    async fn get_leaderboard_rank(
        &self,
        user_key: String,
    ) -> Result<RankInfo, ErrorObject<'static>> {
        self.service
            .leaderboard_rank(&user_key)
            .map_err(Self::map_service_error)
    }

    async fn wallet_flow_initiate(
        &self,
        kind: String,
    ) -> Result<FlowToken, ErrorObject<'static>> {
        Ok(FlowToken {
            token: self.service.wallet_flow_initiate(&kind),
        })
    }

    async fn wallet_flow_complete(
        &self,
        token: String,
        result: Value,
    ) -> Result<FlowAck, ErrorObject<'static>> {
        Ok(FlowAck {
            accepted: self.service.wallet_flow_complete(&token, result),
        })
    }

    async fn wallet_flow_status(
        &self,
        token: String,
    ) -> Result<FlowStatus, ErrorObject<'static>> {
        Ok(self.service.wallet_flow_status(&token))
    }

    async fn health(&self) -> Result<HealthStatus, ErrorObject<'static>> {
        Ok(self.service.health_check())
    }

    async fn version(&self) -> Result<VersionInfo, ErrorObject<'static>> {
        Ok(VersionInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}
