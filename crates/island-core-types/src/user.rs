use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reward::{NftItem, RewardLedgerEntry};

/// Canonical user identity: platform identity paired with a wallet address.
///
/// The key is derived once, on the first successful wallet-connect handshake,
/// and is stable for the lifetime of that pairing. The wallet portion is
/// lower-cased so the same wallet never produces two keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserKey(String);

impl UserKey {
    pub fn derive(platform_id: i64, wallet_address: &str) -> Self {
        UserKey(format!("tg{}:{}", platform_id, wallet_address.to_lowercase()))
    }

    /// Parses an existing key without re-deriving it. Returns `None` for
    /// strings that could not have been produced by [`UserKey::derive`].
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix("tg")?;
        let (id, wallet) = rest.split_once(':')?;
        if id.parse::<i64>().is_err() || wallet.is_empty() {
            return None;
        }
        Some(UserKey(raw.to_lowercase()))
    }

    /// The platform identity embedded in the key.
    pub fn platform_id(&self) -> i64 {
        self.0
            .strip_prefix("tg")
            .and_then(|rest| rest.split_once(':'))
            .and_then(|(id, _)| id.parse().ok())
            .unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity fields extracted from a verified platform login payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
}

impl PlatformUser {
    pub fn display_name(&self) -> String {
        if !self.username.is_empty() {
            self.username.clone()
        } else if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

/// Per-mission completion state. Both flags are monotonic: they only ever go
/// from `false` to `true`, and `reward_claimed` implies `completed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionProgress {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reward_claimed: bool,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
}

/// Accumulated rewards for one user. `history` is append-only; entries are
/// never mutated or removed once written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardLedger {
    /// Running total of native-token rewards, in whole token units.
    #[serde(default)]
    pub native_total: f64,
    #[serde(default)]
    pub nfts: Vec<NftItem>,
    #[serde(default)]
    pub history: Vec<RewardLedgerEntry>,
}

/// The persisted user document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_key: UserKey,
    pub platform_id: i64,
    pub wallet_address: String,
    pub display_name: String,
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub rewards: RewardLedger,
    #[serde(default)]
    pub missions: HashMap<String, MissionProgress>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(platform: &PlatformUser, wallet_address: &str, now: DateTime<Utc>) -> Self {
        let wallet_address = wallet_address.to_lowercase();
        UserRecord {
            user_key: UserKey::derive(platform.id, &wallet_address),
            platform_id: platform.id,
            wallet_address,
            display_name: platform.display_name(),
            points: 0,
            rewards: RewardLedger::default(),
            missions: HashMap::new(),
            created_at: now,
        }
    }

    pub fn progress(&self, mission_id: &str) -> MissionProgress {
        self.missions.get(mission_id).cloned().unwrap_or_default()
    }

    /// Mission ids this user has completed.
    pub fn completed_missions(&self) -> Vec<String> {
        self.missions
            .iter()
            .filter(|(_, p)| p.completed)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_key_is_lowercased_and_stable() {
        let a = UserKey::derive(42, "0xAbCdEf");
        let b = UserKey::derive(42, "0xabcdef");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "tg42:0xabcdef");
        assert_eq!(a.platform_id(), 42);
    }

    #[test]
    fn user_key_parse_rejects_garbage() {
        assert!(UserKey::parse("tg42:0xabc").is_some());
        assert!(UserKey::parse("42:0xabc").is_none());
        assert!(UserKey::parse("tgnope:0xabc").is_none());
        assert!(UserKey::parse("tg42:").is_none());
    }

    #[test]
    fn display_name_prefers_username() {
        let user = PlatformUser {
            id: 1,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            username: "ada".into(),
        };
        assert_eq!(user.display_name(), "ada");

        let no_username = PlatformUser {
            username: String::new(),
            ..user
        };
        assert_eq!(no_username.display_name(), "Ada Lovelace");
    }
}
