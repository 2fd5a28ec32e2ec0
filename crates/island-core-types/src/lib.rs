//! Island Quest Core Types
//!
//! This crate provides the domain type definitions shared by the Island Quest
//! backend: user records and reward ledgers, the mission catalog with its
//! verification requirements, and leaderboard entries. It carries no I/O;
//! persistence and chain access live in their own crates.

pub mod leaderboard;
pub mod mission;
pub mod reward;
pub mod user;

// Re-export commonly used types
pub use leaderboard::{LeaderboardEntry, RankInfo};
pub use mission::{
    CatalogError, Mission, MissionCatalog, MissionRequirement, NftDefinition, VerificationOutcome,
};
pub use reward::{ClaimOutcome, NftItem, RewardKind, RewardLedgerEntry, RewardSpec};
pub use user::{MissionProgress, PlatformUser, RewardLedger, UserKey, UserRecord};
