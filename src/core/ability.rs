//! Ability data - static attributes looked up from the game-data catalog
//!
//! The catalog itself is produced elsewhere (fetched and exported by the
//! surrounding application). This module only reads it by ID.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Game action ID (decimal in the catalog, hex in the combat log)
pub type AbilityId = u32;

/// Abilities sharing a group share one reuse timer
pub type CooldownGroupId = u32;

/// Class/job ID
pub type JobId = u32;

// =============================================================================
// ABILITY
// =============================================================================

/// Static attributes of one ability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub id: AbilityId,
    #[serde(default)]
    pub name: String,
    pub cooldown_group: CooldownGroupId,
    /// Reuse time in milliseconds
    pub recast_ms: u64,
    /// Cast time in milliseconds (0 = instant)
    #[serde(default)]
    pub cast_ms: u64,
    /// Ability that, when fired just before this one, makes this one a combo step
    #[serde(default)]
    pub combo_target_id: Option<AbilityId>,
    /// If false, firing this ability breaks an active combo it does not continue
    #[serde(default)]
    pub preserves_combo: bool,
}

impl Ability {
    pub fn new(id: AbilityId, cooldown_group: CooldownGroupId, recast_ms: u64) -> Self {
        Self {
            id,
            name: String::new(),
            cooldown_group,
            recast_ms,
            cast_ms: 0,
            combo_target_id: None,
            preserves_combo: false,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_combo_target(mut self, target: AbilityId) -> Self {
        self.combo_target_id = Some(target);
        self
    }

    pub fn preserving_combo(mut self) -> Self {
        self.preserves_combo = true;
        self
    }
}

// =============================================================================
// CATALOG LOOKUP
// =============================================================================

/// Read-only ability lookup
pub trait AbilityCatalog {
    /// Look up an ability by ID
    fn ability(&self, id: AbilityId) -> Option<&Ability>;

    fn contains(&self, id: AbilityId) -> bool {
        self.ability(id).is_some()
    }
}

/// Error loading a catalog export
#[derive(Debug)]
pub enum CatalogError {
    Parse(serde_json::Error),
    InvalidJobId(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Parse(e) => write!(f, "Failed to parse catalog: {}", e),
            CatalogError::InvalidJobId(id) => write!(f, "Invalid job id in catalog: '{}'", id),
        }
    }
}

impl std::error::Error for CatalogError {}

/// One entry of the per-job action export (`classjobactions.json`)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogAction {
    #[serde(rename = "ID")]
    id: AbilityId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    cooldown_group: CooldownGroupId,
    #[serde(rename = "Cast100ms", default)]
    cast_100ms: u64,
    #[serde(rename = "Recast100ms", default)]
    recast_100ms: u64,
    /// 0 in the export means "no combo"
    #[serde(rename = "ActionComboTargetID", default)]
    action_combo_target_id: Option<AbilityId>,
    #[serde(default)]
    preserves_combo: u8,
}

impl From<CatalogAction> for Ability {
    fn from(raw: CatalogAction) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            cooldown_group: raw.cooldown_group,
            recast_ms: raw.recast_100ms * 100,
            cast_ms: raw.cast_100ms * 100,
            combo_target_id: raw.action_combo_target_id.filter(|&id| id != 0),
            preserves_combo: raw.preserves_combo != 0,
        }
    }
}

/// In-memory catalog keyed by ability ID and job
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    by_id: HashMap<AbilityId, Ability>,
    by_job: HashMap<JobId, Vec<AbilityId>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the per-job export: `{ "<jobId>": [ { "ID": .., ... }, ... ] }`
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let raw: HashMap<String, Vec<CatalogAction>> =
            serde_json::from_str(json).map_err(CatalogError::Parse)?;

        let mut catalog = Self::new();
        for (job, actions) in raw {
            let job_id: JobId = job
                .trim()
                .parse()
                .map_err(|_| CatalogError::InvalidJobId(job.clone()))?;
            for action in actions {
                catalog.insert(job_id, action.into());
            }
        }
        Ok(catalog)
    }

    /// Add an ability under a job (an ability may belong to several jobs)
    pub fn insert(&mut self, job_id: JobId, ability: Ability) {
        let ids = self.by_job.entry(job_id).or_default();
        if !ids.contains(&ability.id) {
            ids.push(ability.id);
        }
        self.by_id.insert(ability.id, ability);
    }

    /// Abilities of a job, in export order
    pub fn abilities_for_job(&self, job_id: JobId) -> Vec<&Ability> {
        self.by_job
            .get(&job_id)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl AbilityCatalog for StaticCatalog {
    fn ability(&self, id: AbilityId) -> Option<&Ability> {
        self.by_id.get(&id)
    }
}
