//! Per-concern services composed by [`crate::service::IslandService`].

pub mod identity;
pub mod leaderboard;
pub mod settlement;
pub mod token_ids;
pub mod verification;
pub mod wallet_flow;

pub use identity::{IdentityService, LoginVerification};
pub use leaderboard::LeaderboardService;
pub use settlement::{MintReceipt, RewardReceipt, RewardService};
pub use token_ids::TokenIdService;
pub use verification::{MissionProgressView, MissionService, VerificationData};
pub use wallet_flow::{FlowStatus, WalletFlowService};

use island_core_types::{UserKey, UserRecord};
use island_storage::{DocumentStore, DocumentStoreExt};

use crate::error::{ServiceError, ServiceResult};

pub(crate) const USERS: &str = "users";
pub(crate) const STATS: &str = "stats";
pub(crate) const COUNTERS: &str = "counters";
pub(crate) const LEADERBOARD: &str = "leaderboard";
pub(crate) const TRANSACTIONS: &str = "transactions";

pub(crate) fn load_user(
    store: &dyn DocumentStore,
    user_key: &UserKey,
) -> ServiceResult<UserRecord> {
    store
        .get_as::<UserRecord>(USERS, user_key.as_str())?
        .ok_or_else(|| ServiceError::not_found(format!("user {}", user_key)))
}

/// Atomic read-modify-write on one user document. The mutation runs inside
/// the store transaction, so no other update interleaves with it.
pub(crate) fn update_user(
    store: &dyn DocumentStore,
    user_key: &UserKey,
    mutate: &mut dyn FnMut(&mut UserRecord),
) -> ServiceResult<UserRecord> {
    let committed = store.transact(USERS, user_key.as_str(), &mut |current| match current {
        Some(value) => {
            let mut record: UserRecord = serde_json::from_value(value)?;
            mutate(&mut record);
            Ok(Some(serde_json::to_value(&record)?))
        }
        None => Ok(None),
    })?;

    match committed {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Err(ServiceError::not_found(format!("user {}", user_key))),
    }
}
