use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reward::RewardSpec;

fn default_min_stake() -> f64 {
    10.0
}

/// Verification policy for a mission, keyed by the `type` tag of the authored
/// catalog entry. Unknown tags deserialize to `Unsupported` so a stale client
/// or catalog typo yields a clean "unsupported mission type" outcome instead
/// of a load failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionRequirement {
    /// Wallet install/connect. The caller reaching this step is the proof.
    Install,
    /// An on-chain value transfer to a configured receiver.
    Transfer { receiver: String, min_amount: f64 },
    /// A deployed contract: non-empty bytecode at the submitted address.
    SmartContract,
    /// Cross-chain transfer. Accepted unconditionally; there is no on-chain
    /// check wired up for the bridge yet.
    CrossChain,
    /// Self-reported staking amount against a minimum. No staking-state
    /// lookup is performed.
    Staking {
        #[serde(default = "default_min_stake")]
        min_amount: f64,
    },
    /// Transaction-tracing exercise: exact match on a pattern code.
    Kyt { expected_code: String },
    /// Quiz graded against the configured answer sheet.
    Quiz {
        correct_answers: Vec<String>,
        pass_threshold: usize,
    },
    #[serde(other)]
    Unsupported,
}

/// A single authored mission. Presentation fields ride along for clients;
/// the core only interprets `requirement`, `prerequisites` and `reward`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: u32,
    pub requirement: MissionRequirement,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub reward: Option<RewardSpec>,
}

/// An NFT the catalog can hand out as a mission reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("duplicate mission id: {0}")]
    DuplicateMission(String),

    #[error("mission {mission} references unknown prerequisite {prerequisite}")]
    UnknownPrerequisite {
        mission: String,
        prerequisite: String,
    },

    #[error("prerequisite cycle involving mission {0}")]
    PrerequisiteCycle(String),

    #[error("duplicate nft id: {0}")]
    DuplicateNft(String),

    #[error("catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read-only mission catalog. Authored out-of-band, validated once at load:
/// ids unique, prerequisites resolvable and acyclic.
#[derive(Debug, Clone)]
pub struct MissionCatalog {
    missions: Vec<Mission>,
    by_id: HashMap<String, usize>,
    nfts: HashMap<String, NftDefinition>,
}

/// On-disk shape of the catalog file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    missions: Vec<Mission>,
    #[serde(default)]
    nfts: Vec<NftDefinition>,
}

impl MissionCatalog {
    pub fn new(
        mut missions: Vec<Mission>,
        nfts: Vec<NftDefinition>,
    ) -> Result<Self, CatalogError> {
        missions.sort_by_key(|m| m.order);

        let mut by_id = HashMap::new();
        for (idx, mission) in missions.iter().enumerate() {
            if by_id.insert(mission.id.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateMission(mission.id.clone()));
            }
        }
        for mission in &missions {
            for prereq in &mission.prerequisites {
                if !by_id.contains_key(prereq) {
                    return Err(CatalogError::UnknownPrerequisite {
                        mission: mission.id.clone(),
                        prerequisite: prereq.clone(),
                    });
                }
            }
        }

        let mut nft_map = HashMap::new();
        for nft in nfts {
            let id = nft.id.clone();
            if nft_map.insert(id.clone(), nft).is_some() {
                return Err(CatalogError::DuplicateNft(id));
            }
        }

        let catalog = MissionCatalog {
            missions,
            by_id,
            nfts: nft_map,
        };
        catalog.check_acyclic()?;
        Ok(catalog)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(raw)?;
        Self::new(file.missions, file.nfts)
    }

    /// Depth-first cycle detection over the prerequisite graph.
    fn check_acyclic(&self) -> Result<(), CatalogError> {
        let mut visiting = HashSet::new();
        let mut done = HashSet::new();
        for mission in &self.missions {
            if self.has_cycle(&mission.id, &mut visiting, &mut done) {
                return Err(CatalogError::PrerequisiteCycle(mission.id.clone()));
            }
        }
        Ok(())
    }

    fn has_cycle<'a>(
        &'a self,
        id: &'a str,
        visiting: &mut HashSet<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> bool {
        if done.contains(id) {
            return false;
        }
        if !visiting.insert(id) {
            return true;
        }
        if let Some(mission) = self.get(id) {
            for prereq in &mission.prerequisites {
                if self.has_cycle(prereq, visiting, done) {
                    return true;
                }
            }
        }
        visiting.remove(id);
        done.insert(id);
        false
    }

    pub fn get(&self, id: &str) -> Option<&Mission> {
        self.by_id.get(id).map(|&idx| &self.missions[idx])
    }

    /// All missions in display order.
    pub fn all(&self) -> &[Mission] {
        &self.missions
    }

    pub fn nft(&self, id: &str) -> Option<&NftDefinition> {
        self.nfts.get(id)
    }

    /// A mission is unlocked once every prerequisite is complete. Missions
    /// with no prerequisites are always unlocked.
    pub fn is_unlocked(&self, mission_id: &str, completed: &HashSet<String>) -> bool {
        match self.get(mission_id) {
            Some(mission) => mission
                .prerequisites
                .iter()
                .all(|prereq| completed.contains(prereq)),
            None => false,
        }
    }
}

/// Outcome of one verification attempt. A failed check is a negative result,
/// not an error; only infrastructure problems surface as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl VerificationOutcome {
    pub fn pass(message: impl Into<String>) -> Self {
        VerificationOutcome {
            success: true,
            message: message.into(),
            score: None,
            total: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        VerificationOutcome {
            success: false,
            message: message.into(),
            score: None,
            total: None,
        }
    }

    pub fn graded(passed: bool, score: usize, total: usize, message: impl Into<String>) -> Self {
        VerificationOutcome {
            success: passed,
            message: message.into(),
            score: Some(score),
            total: Some(total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mission(id: &str, prereqs: &[&str]) -> Mission {
        Mission {
            id: id.to_string(),
            title: String::new(),
            description: String::new(),
            order: 0,
            requirement: MissionRequirement::Install,
            prerequisites: prereqs.iter().map(|s| s.to_string()).collect(),
            reward: None,
        }
    }

    #[test]
    fn catalog_rejects_duplicate_ids() {
        let err = MissionCatalog::new(vec![mission("a", &[]), mission("a", &[])], vec![]);
        assert!(matches!(err, Err(CatalogError::DuplicateMission(_))));
    }

    #[test]
    fn catalog_rejects_unknown_prerequisite() {
        let err = MissionCatalog::new(vec![mission("a", &["ghost"])], vec![]);
        assert!(matches!(err, Err(CatalogError::UnknownPrerequisite { .. })));
    }

    #[test]
    fn catalog_rejects_cycles() {
        let err = MissionCatalog::new(
            vec![mission("a", &["b"]), mission("b", &["c"]), mission("c", &["a"])],
            vec![],
        );
        assert!(matches!(err, Err(CatalogError::PrerequisiteCycle(_))));
    }

    #[test]
    fn unlock_requires_all_prerequisites() {
        let catalog = MissionCatalog::new(
            vec![mission("a", &[]), mission("b", &[]), mission("c", &["a", "b"])],
            vec![],
        )
        .unwrap();

        let mut done = HashSet::new();
        assert!(catalog.is_unlocked("a", &done));
        assert!(!catalog.is_unlocked("c", &done));
        done.insert("a".to_string());
        assert!(!catalog.is_unlocked("c", &done));
        done.insert("b".to_string());
        assert!(catalog.is_unlocked("c", &done));
    }

    #[test]
    fn unknown_requirement_tag_parses_as_unsupported() {
        let raw = r#"{
            "missions": [
                {"id": "m1", "requirement": {"type": "TELEPORT"}}
            ]
        }"#;
        let catalog = MissionCatalog::from_json_str(raw).unwrap();
        assert_eq!(
            catalog.get("m1").unwrap().requirement,
            MissionRequirement::Unsupported
        );
    }

    #[test]
    fn requirement_tags_round_trip() {
        let raw = r#"{"type": "TRANSFER", "receiver": "0xAAA", "min_amount": 0.01}"#;
        let req: MissionRequirement = serde_json::from_str(raw).unwrap();
        assert_eq!(
            req,
            MissionRequirement::Transfer {
                receiver: "0xAAA".to_string(),
                min_amount: 0.01
            }
        );

        let staking: MissionRequirement = serde_json::from_str(r#"{"type": "STAKING"}"#).unwrap();
        assert_eq!(
            staking,
            MissionRequirement::Staking { min_amount: 10.0 }
        );
    }
}
