//! Rotation definitions - phase-grouped ability sequences
//!
//! Rotations are authored elsewhere (rotation browser / builder) and handed
//! to the matcher. The JSON shape matches the rotation service's export.

use serde::{Deserialize, Serialize};

use super::ability::{AbilityId, JobId};

// =============================================================================
// PHASES
// =============================================================================

/// Phase label; exports that only title their phases get `Other`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseTag {
    PrePull,
    Opener,
    Cooldown,
    Burst,
    #[default]
    Other,
}

impl PhaseTag {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseTag::PrePull => "prepull",
            PhaseTag::Opener => "opener",
            PhaseTag::Cooldown => "cooldown",
            PhaseTag::Burst => "burst",
            PhaseTag::Other => "other",
        }
    }
}

/// Ordered sub-sequence of a rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPhase {
    #[serde(rename = "phase", default)]
    pub tag: PhaseTag,
    #[serde(default)]
    pub title: String,
    pub actions: Vec<AbilityId>,
    /// The phase the rotation loops back into after the last phase
    #[serde(default)]
    pub repeatable: bool,
}

impl RotationPhase {
    pub fn new(tag: PhaseTag, actions: Vec<AbilityId>) -> Self {
        Self {
            tag,
            title: String::new(),
            actions,
            repeatable: false,
        }
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }
}

// =============================================================================
// ROTATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rotation {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "classJobId")]
    pub job_id: JobId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub patch: String,
    pub phases: Vec<RotationPhase>,
}

/// Why a rotation cannot be matched against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationError {
    NoPhases,
    EmptyPhase { index: usize },
    RepeatableCount { count: usize },
}

impl std::fmt::Display for RotationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationError::NoPhases => write!(f, "Rotation has no phases"),
            RotationError::EmptyPhase { index } => write!(f, "Phase {} has no actions", index),
            RotationError::RepeatableCount { count } => write!(
                f,
                "Rotation must have exactly one repeatable phase, found {}",
                count
            ),
        }
    }
}

impl std::error::Error for RotationError {}

impl Rotation {
    pub fn new(job_id: JobId, phases: Vec<RotationPhase>) -> Self {
        Self {
            id: String::new(),
            job_id,
            title: String::new(),
            description: String::new(),
            patch: String::new(),
            phases,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check the matcher's preconditions: non-empty phases, exactly one repeatable
    pub fn validate(&self) -> Result<(), RotationError> {
        if self.phases.is_empty() {
            return Err(RotationError::NoPhases);
        }
        if let Some(index) = self.phases.iter().position(|p| p.actions.is_empty()) {
            return Err(RotationError::EmptyPhase { index });
        }
        let count = self.phases.iter().filter(|p| p.repeatable).count();
        if count != 1 {
            return Err(RotationError::RepeatableCount { count });
        }
        Ok(())
    }

    /// Index of the first repeatable phase
    pub fn repeatable_index(&self) -> Option<usize> {
        self.phases.iter().position(|p| p.repeatable)
    }

    pub fn total_actions(&self) -> usize {
        self.phases.iter().map(|p| p.actions.len()).sum()
    }
}
