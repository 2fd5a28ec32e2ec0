use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a mission pays out, as authored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardSpec {
    /// On-chain transfer of the chain's native token, in whole token units.
    NativeToken { amount: f64 },
    /// Mint of a catalog-defined NFT to the user's wallet.
    Nft { nft_id: String },
    /// Leaderboard points.
    Points { amount: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardKind {
    NativeToken,
    Nft,
    Points,
}

/// One minted NFT in a user's collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftItem {
    pub nft_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub token_id: u64,
    pub contract_address: String,
    pub tx_hash: String,
    pub received_at: DateTime<Utc>,
}

/// Immutable, append-only reward history record. Once appended it is never
/// mutated or removed; display layers may re-sort by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardLedgerEntry {
    pub kind: RewardKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nft_id: Option<String>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// Result of a reward-claim attempt. "Already claimed" and "mission not
/// completed" are negative results here, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_kind: Option<RewardKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<u64>,
}

impl ClaimOutcome {
    pub fn rejected(message: impl Into<String>) -> Self {
        ClaimOutcome {
            success: false,
            message: message.into(),
            reward_kind: None,
            tx_hash: None,
            token_id: None,
            points: None,
        }
    }

    pub fn no_reward() -> Self {
        ClaimOutcome {
            success: true,
            message: "this mission has no reward".to_string(),
            reward_kind: None,
            tx_hash: None,
            token_id: None,
            points: None,
        }
    }
}
