//! Combat-log constants - event codes, reserved ability IDs, timings

use num_enum::TryFromPrimitive;
use std::time::Duration;

use super::ability::AbilityId;

// =============================================================================
// LOG LINE CODES
// =============================================================================

/// Event type code found in field 0 of a network log line
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum LogLineCode {
    GameLog = 0,
    ChangeZone = 1,
    ChangePrimaryPlayer = 2,
    AddCombatant = 3,
    RemoveCombatant = 4,
    PartyList = 11,
    PlayerStats = 12,
    StartsCasting = 20,
    ActionEffect = 21,
    AoeActionEffect = 22,
    CancelAction = 23,
    DotHot = 24,
    Death = 25,
    StatusAdd = 26,
    HeadMarker = 27,
    StatusRemove = 30,
    Gauge = 31,
    Debug = 251,
    PacketDump = 252,
    Version = 253,
    Error = 254,
}

/// Classification of field 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeField {
    Known(LogLineCode),
    /// Numeric, but not a code this decoder knows
    Unknown(u16),
    /// Not a number
    Invalid,
}

impl LogLineCode {
    /// Classify field 0 ("21", "251", ...)
    pub fn parse(field: &str) -> CodeField {
        let Ok(value) = field.trim().parse::<u16>() else {
            return CodeField::Invalid;
        };
        u8::try_from(value)
            .ok()
            .and_then(|v| Self::try_from(v).ok())
            .map(CodeField::Known)
            .unwrap_or(CodeField::Unknown(value))
    }
}

// =============================================================================
// FIELD LAYOUTS (minimum field counts, checksum not required)
// =============================================================================

pub const MIN_FIELDS_CHANGE_ZONE: usize = 4;
pub const MIN_FIELDS_CHANGE_PRIMARY_PLAYER: usize = 4;
pub const MIN_FIELDS_PLAYER_STATS: usize = 3;
pub const MIN_FIELDS_STARTS_CASTING: usize = 9;
pub const MIN_FIELDS_ACTION_EFFECT: usize = 8;
pub const MIN_FIELDS_STATUS: usize = 9;

// =============================================================================
// RESERVED ABILITIES
// =============================================================================

/// Melee auto-attack
pub const AUTO_ATTACK_MELEE: AbilityId = 0x07;

/// Ranged auto-attack
pub const AUTO_ATTACK_RANGED: AbilityId = 0x08;

pub fn is_auto_attack(id: AbilityId) -> bool {
    id == AUTO_ATTACK_MELEE || id == AUTO_ATTACK_RANGED
}

// =============================================================================
// TIMINGS
// =============================================================================

/// Fixed delay between socket reconnect attempts
pub const RECONNECT_DELAY: Duration = Duration::from_millis(300);

/// Interval between host readiness checks
pub const HOST_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Accepted abilities kept in the session history
pub const HISTORY_LIMIT: usize = 50;
