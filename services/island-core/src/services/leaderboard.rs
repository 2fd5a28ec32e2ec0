//! Weekly leaderboard index.
//!
//! A denormalized projection of user points, keyed `(period, user)`. It is
//! rebuilt incrementally on every points-affecting settlement and is never
//! the system of record for whether a reward was granted; that remains the
//! user's mission progress.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde_json::json;

use island_core_types::{LeaderboardEntry, RankInfo, UserKey, UserRecord};
use island_storage::{DocumentStore, DocumentStoreExt, FilterOp, Query};

use crate::error::ServiceResult;
use crate::services::LEADERBOARD;

pub struct LeaderboardService {
    store: Arc<dyn DocumentStore>,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        LeaderboardService { store }
    }

    /// Period key for an instant: the most recent Sunday 00:00 UTC, rendered
    /// as a stable string. Periods never overlap and points never roll over
    /// between them.
    pub fn period_key(now: DateTime<Utc>) -> String {
        let days_back = now.weekday().num_days_from_sunday() as i64;
        let sunday = now.date_naive() - Duration::days(days_back);
        format!("weekly-{}", sunday.format("%Y-%m-%d"))
    }

    pub fn current_period(&self) -> String {
        Self::period_key(Utc::now())
    }

    /// Upsert one user's cumulative total for a period. The stored value is
    /// the running total, not a delta.
    pub fn record_points(&self, period: &str, user: &UserRecord) -> ServiceResult<()> {
        let entry = LeaderboardEntry {
            period: period.to_string(),
            user_key: user.user_key.clone(),
            display_name: user.display_name.clone(),
            wallet_address: user.wallet_address.clone(),
            points: user.points,
            updated_at: Utc::now(),
        };
        let key = format!("{}:{}", period, user.user_key);
        self.store.set_as(LEADERBOARD, &key, &entry)?;
        Ok(())
    }

    /// Top `n` entries for a period, points descending. Ties keep a stable
    /// order within one query.
    pub fn top_n(&self, period: &str, n: usize) -> ServiceResult<Vec<LeaderboardEntry>> {
        let query = Query::filtered("period", FilterOp::Eq, json!(period))
            .order_by("points", true)
            .limit(n);
        let docs = self.store.query(LEADERBOARD, &query)?;
        let mut entries = Vec::with_capacity(docs.len());
        for doc in docs {
            entries.push(serde_json::from_value(doc.value)?);
        }
        Ok(entries)
    }

    /// Rank is `1 + |{entries with strictly greater points}|`, so equal
    /// totals rank identically. An absent user is unranked, not an error.
    pub fn rank_of(&self, period: &str, user_key: &UserKey) -> ServiceResult<RankInfo> {
        let query = Query::filtered("period", FilterOp::Eq, json!(period));
        let docs = self.store.query(LEADERBOARD, &query)?;
        let mut entries = Vec::with_capacity(docs.len());
        for doc in docs {
            let entry: LeaderboardEntry = serde_json::from_value(doc.value)?;
            entries.push(entry);
        }

        let total_participants = entries.len() as u64;
        let me = entries.iter().find(|e| &e.user_key == user_key);
        match me {
            None => Ok(RankInfo {
                rank: None,
                total_participants,
                points: None,
            }),
            Some(entry) => {
                let ahead = entries.iter().filter(|e| e.points > entry.points).count() as u64;
                Ok(RankInfo {
                    rank: Some(ahead + 1),
                    total_participants,
                    points: Some(entry.points),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn period_key_is_the_most_recent_sunday() {
        // 2026-08-25 is a Tuesday; the week began Sunday the 23rd.
        let tuesday = Utc.with_ymd_and_hms(2026, 8, 25, 15, 30, 0).unwrap();
        assert_eq!(LeaderboardService::period_key(tuesday), "weekly-2026-08-23");

        // A Sunday maps to itself, regardless of time of day.
        let sunday = Utc.with_ymd_and_hms(2026, 8, 23, 23, 59, 59).unwrap();
        assert_eq!(LeaderboardService::period_key(sunday), "weekly-2026-08-23");

        // The following Sunday starts a new, independent period.
        let next = Utc.with_ymd_and_hms(2026, 8, 30, 0, 0, 0).unwrap();
        assert_eq!(LeaderboardService::period_key(next), "weekly-2026-08-30");
    }
}
