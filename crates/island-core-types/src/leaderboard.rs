use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::UserKey;

/// One user's standing within a single leaderboard period. At most one entry
/// exists per (period, user); `points` holds the cumulative total for the
/// period, not a delta, and never decreases within it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub period: String,
    pub user_key: UserKey,
    pub display_name: String,
    pub wallet_address: String,
    pub points: u64,
    pub updated_at: DateTime<Utc>,
}

/// Answer to a rank-of-user query. A user with no entry in the period is
/// unranked (`rank == None`), which is an answer, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankInfo {
    pub rank: Option<u64>,
    pub total_participants: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<u64>,
}
