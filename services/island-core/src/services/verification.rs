//! Mission verification engine.
//!
//! Dispatches on the mission's requirement type, consulting the chain RPC
//! where the policy needs it. Failed checks are negative outcomes, not
//! errors; only infrastructure failures (chain unreachable, storage) become
//! `ServiceError`s. A mission already verified for a user is terminal:
//! repeat calls short-circuit to success without re-checking evidence.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use island_chain::{address_eq, has_code, to_wei, ChainClient};
use island_core_types::{
    Mission, MissionCatalog, MissionProgress, MissionRequirement, UserKey, UserRecord,
    VerificationOutcome,
};
use island_storage::DocumentStore;

use crate::error::{ServiceError, ServiceResult};
use crate::services::{load_user, update_user, STATS};

/// User-submitted evidence. Which field matters depends on the mission's
/// requirement type; the rest are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationData {
    pub tx_hash: Option<String>,
    pub contract_address: Option<String>,
    pub amount: Option<f64>,
    pub pattern_code: Option<String>,
    pub answers: Option<Vec<String>>,
}

/// One mission joined with a user's progress, for progress listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionProgressView {
    #[serde(flatten)]
    pub mission: Mission,
    pub progress: MissionProgress,
    pub unlocked: bool,
}

pub struct MissionService {
    catalog: Arc<MissionCatalog>,
    store: Arc<dyn DocumentStore>,
    chain: Arc<dyn ChainClient>,
}

impl MissionService {
    pub fn new(
        catalog: Arc<MissionCatalog>,
        store: Arc<dyn DocumentStore>,
        chain: Arc<dyn ChainClient>,
    ) -> Self {
        MissionService {
            catalog,
            store,
            chain,
        }
    }

    pub fn catalog(&self) -> &MissionCatalog {
        &self.catalog
    }

    /// Verify a mission for a user and, on a first-time pass, record the
    /// completion and bump the global completion counter.
    pub async fn verify(
        &self,
        user_key: &UserKey,
        mission_id: &str,
        data: &VerificationData,
    ) -> ServiceResult<VerificationOutcome> {
        let user = load_user(self.store.as_ref(), user_key)?;
        let mission = self
            .catalog
            .get(mission_id)
            .ok_or_else(|| ServiceError::not_found(format!("mission {}", mission_id)))?;

        let completed: HashSet<String> = user.completed_missions().into_iter().collect();
        if !self.catalog.is_unlocked(mission_id, &completed) {
            return Ok(VerificationOutcome::fail(
                "prerequisite missions are not complete",
            ));
        }

        if user.progress(mission_id).completed {
            // Verified is terminal; evidence is not re-checked.
            return Ok(VerificationOutcome::pass("mission already verified"));
        }

        let outcome = self.check(mission, &user, data).await?;
        if outcome.success {
            self.record_completion(user_key, mission_id)?;
            info!("mission {} verified for {}", mission_id, user_key);
        }
        Ok(outcome)
    }

    async fn check(
        &self,
        mission: &Mission,
        user: &UserRecord,
        data: &VerificationData,
    ) -> ServiceResult<VerificationOutcome> {
        let outcome = match &mission.requirement {
            MissionRequirement::Install => {
                // Reaching this step implies the wallet is connected.
                VerificationOutcome::pass("wallet connection confirmed")
            }

            MissionRequirement::Transfer {
                receiver,
                min_amount,
            } => {
                let tx_hash = match data.tx_hash.as_deref() {
                    Some(h) if !h.is_empty() => h,
                    _ => return Ok(VerificationOutcome::fail("transaction hash required")),
                };
                match self.chain.get_transaction(tx_hash).await? {
                    None => VerificationOutcome::fail("transaction not found on chain"),
                    Some(tx) if !address_eq(&tx.from, &user.wallet_address) => {
                        VerificationOutcome::fail("transaction was not sent from your wallet")
                    }
                    Some(tx) if !address_eq(&tx.to, receiver) => {
                        VerificationOutcome::fail("transaction receiver does not match")
                    }
                    Some(tx) if tx.value_wei < to_wei(*min_amount) => VerificationOutcome::fail(
                        format!("transfer amount below the minimum of {}", min_amount),
                    ),
                    Some(_) => VerificationOutcome::pass("transaction confirmed"),
                }
            }

            MissionRequirement::SmartContract => {
                let address = match data.contract_address.as_deref() {
                    Some(a) if !a.is_empty() => a,
                    _ => return Ok(VerificationOutcome::fail("contract address required")),
                };
                let bytecode = self.chain.get_code(address).await?;
                if has_code(&bytecode) {
                    VerificationOutcome::pass("smart contract confirmed")
                } else {
                    VerificationOutcome::fail("no contract code at that address")
                }
            }

            MissionRequirement::CrossChain => {
                // No bridge check is wired up; the claim is accepted as-is.
                warn!(
                    "cross-chain mission {} accepted without on-chain verification",
                    mission.id
                );
                VerificationOutcome::pass("cross-chain transfer confirmed")
            }

            MissionRequirement::Staking { min_amount } => match data.amount {
                Some(amount) if amount >= *min_amount => {
                    VerificationOutcome::pass("staking confirmed")
                }
                _ => VerificationOutcome::fail(format!(
                    "a minimum stake of {} tokens is required",
                    min_amount
                )),
            },

            MissionRequirement::Kyt { expected_code } => match data.pattern_code.as_deref() {
                None | Some("") => VerificationOutcome::fail("pattern code required"),
                Some(code) if code == expected_code => {
                    VerificationOutcome::pass("pattern code confirmed")
                }
                Some(_) => VerificationOutcome::fail("pattern code does not match"),
            },

            MissionRequirement::Quiz {
                correct_answers,
                pass_threshold,
            } => {
                let answers = match &data.answers {
                    Some(answers) => answers,
                    None => return Ok(VerificationOutcome::fail("quiz answers required")),
                };
                let score = correct_answers
                    .iter()
                    .zip(answers.iter())
                    .filter(|(expected, given)| expected == given)
                    .count();
                let total = correct_answers.len();
                let passed = score >= *pass_threshold;
                let message = if passed {
                    format!("quiz passed with {}/{}", score, total)
                } else {
                    format!("quiz failed with {}/{}", score, total)
                };
                VerificationOutcome::graded(passed, score, total, message)
            }

            MissionRequirement::Unsupported => {
                VerificationOutcome::fail("unsupported mission type")
            }
        };
        Ok(outcome)
    }

    /// First-time completion: flip the monotonic flag and count it globally.
    fn record_completion(&self, user_key: &UserKey, mission_id: &str) -> ServiceResult<()> {
        let now = Utc::now();
        let mission_id = mission_id.to_string();
        let mut newly_completed = false;

        update_user(self.store.as_ref(), user_key, &mut |record| {
            let progress = record.missions.entry(mission_id.clone()).or_default();
            if !progress.completed {
                progress.completed = true;
                progress.completed_at = Some(now);
                newly_completed = true;
            }
        })?;

        if newly_completed {
            self.store.transact(STATS, "global", &mut |current| {
                let total = current
                    .as_ref()
                    .and_then(|v| v.get("total_missions_completed"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                Ok(Some(json!({ "total_missions_completed": total + 1 })))
            })?;
        }
        Ok(())
    }

    /// The full catalog joined with one user's progress, in display order.
    pub fn progress_for(&self, user_key: &UserKey) -> ServiceResult<Vec<MissionProgressView>> {
        let user = load_user(self.store.as_ref(), user_key)?;
        let completed: HashSet<String> = user.completed_missions().into_iter().collect();
        Ok(self
            .catalog
            .all()
            .iter()
            .map(|mission| MissionProgressView {
                mission: mission.clone(),
                progress: user.progress(&mission.id),
                unlocked: self.catalog.is_unlocked(&mission.id, &completed),
            })
            .collect())
    }
}
