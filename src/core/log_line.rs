//! Log line decoder - raw combat-log records to typed events
//!
//! A record is a `|`-separated list of fields: field 0 is the event code,
//! field 1 the timestamp, the last field a checksum (ignored). Decoding is
//! total: anything short or unparsable becomes `LogLineKind::Malformed`.

use chrono::{DateTime, FixedOffset};

use super::ability::{AbilityId, JobId};
use super::constants::{
    is_auto_attack, CodeField, LogLineCode, MIN_FIELDS_ACTION_EFFECT,
    MIN_FIELDS_CHANGE_PRIMARY_PLAYER, MIN_FIELDS_CHANGE_ZONE, MIN_FIELDS_PLAYER_STATS,
    MIN_FIELDS_STARTS_CASTING, MIN_FIELDS_STATUS,
};

// =============================================================================
// TYPES
// =============================================================================

/// An ability (cast start or use) from one source to one target
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityUse {
    pub source_id: u32,
    pub source_name: String,
    pub ability_id: AbilityId,
    pub ability_name: String,
    pub target_id: Option<u32>,
    pub target_name: String,
    /// Cast time, only set for cast-started lines
    pub cast_ms: Option<u64>,
    /// One line per target for area abilities
    pub area: bool,
    /// False for auto-attacks, which must never reach the matcher
    pub actionable: bool,
}

/// A status effect gained or lost
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub effect_id: u32,
    pub effect_name: String,
    pub duration_ms: u64,
    pub source_id: Option<u32>,
    pub source_name: String,
    pub target_id: Option<u32>,
    pub target_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogLineKind {
    ZoneChanged { zone_id: u32, zone_name: String },
    PrimaryPlayerChanged { player_id: u32, player_name: String },
    JobChanged { job_id: JobId },
    AbilityCastStarted(AbilityUse),
    AbilityUsed(AbilityUse),
    StatusAdded(StatusChange),
    StatusRemoved(StatusChange),
    /// Recognized or unrecognized code that downstream consumers skip
    Ignored { code: String },
    Malformed { reason: String },
}

/// One decoded record
#[derive(Debug, Clone, PartialEq)]
pub struct LogLineEvent {
    pub raw_fields: Vec<String>,
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub kind: LogLineKind,
}

impl LogLineEvent {
    /// Ability ID if this line should advance a rotation
    pub fn actionable_ability(&self) -> Option<&AbilityUse> {
        match &self.kind {
            LogLineKind::AbilityUsed(used) if used.actionable => Some(used),
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self.kind, LogLineKind::Malformed { .. })
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Decode a raw `|`-separated line
pub fn decode_raw(line: &str) -> LogLineEvent {
    let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('|').collect();
    decode(&fields)
}

/// Decode an already split record
pub fn decode<S: AsRef<str>>(fields: &[S]) -> LogLineEvent {
    let raw_fields: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();
    let timestamp = raw_fields
        .get(1)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts.trim()).ok());
    let kind = decode_kind(&raw_fields);

    LogLineEvent {
        raw_fields,
        timestamp,
        kind,
    }
}

fn decode_kind(fields: &[String]) -> LogLineKind {
    let Some(code_field) = fields.first() else {
        return malformed("empty record");
    };

    let code = match LogLineCode::parse(code_field) {
        CodeField::Known(code) => code,
        CodeField::Unknown(_) => {
            return LogLineKind::Ignored {
                code: code_field.clone(),
            }
        }
        CodeField::Invalid => return malformed(format!("invalid event code '{}'", code_field)),
    };

    let result = match code {
        LogLineCode::ChangeZone => decode_zone(fields),
        LogLineCode::ChangePrimaryPlayer => decode_primary_player(fields),
        LogLineCode::PlayerStats => decode_player_stats(fields),
        LogLineCode::StartsCasting => decode_ability(fields, MIN_FIELDS_STARTS_CASTING, false)
            .map(LogLineKind::AbilityCastStarted),
        LogLineCode::ActionEffect => decode_ability(fields, MIN_FIELDS_ACTION_EFFECT, false)
            .map(LogLineKind::AbilityUsed),
        LogLineCode::AoeActionEffect => decode_ability(fields, MIN_FIELDS_ACTION_EFFECT, true)
            .map(LogLineKind::AbilityUsed),
        LogLineCode::StatusAdd => decode_status(fields).map(LogLineKind::StatusAdded),
        LogLineCode::StatusRemove => decode_status(fields).map(LogLineKind::StatusRemoved),
        _ => Ok(LogLineKind::Ignored {
            code: code_field.clone(),
        }),
    };

    result.unwrap_or_else(|reason| LogLineKind::Malformed { reason })
}

fn malformed(reason: impl Into<String>) -> LogLineKind {
    LogLineKind::Malformed {
        reason: reason.into(),
    }
}

fn require(fields: &[String], min: usize) -> Result<(), String> {
    if fields.len() < min {
        Err(format!(
            "code {} needs {} fields, got {}",
            fields[0],
            min,
            fields.len()
        ))
    } else {
        Ok(())
    }
}

fn hex_field(fields: &[String], index: usize, what: &str) -> Result<u32, String> {
    let raw = fields[index].trim();
    u32::from_str_radix(raw, 16).map_err(|_| format!("invalid {} '{}'", what, raw))
}

/// Hex ID that may legitimately be blank (no target / no source)
fn optional_hex_field(fields: &[String], index: usize, what: &str) -> Result<Option<u32>, String> {
    if fields[index].trim().is_empty() {
        Ok(None)
    } else {
        hex_field(fields, index, what).map(Some)
    }
}

fn seconds_field(fields: &[String], index: usize, what: &str) -> Result<u64, String> {
    let raw = fields[index].trim();
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("invalid {} '{}'", what, raw))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("invalid {} '{}'", what, raw));
    }
    Ok((secs * 1000.0).round() as u64)
}

// 01|ts|zoneId|zoneName|...
fn decode_zone(fields: &[String]) -> Result<LogLineKind, String> {
    require(fields, MIN_FIELDS_CHANGE_ZONE)?;
    Ok(LogLineKind::ZoneChanged {
        zone_id: hex_field(fields, 2, "zone id")?,
        zone_name: fields[3].clone(),
    })
}

// 02|ts|playerId|playerName|...
fn decode_primary_player(fields: &[String]) -> Result<LogLineKind, String> {
    require(fields, MIN_FIELDS_CHANGE_PRIMARY_PLAYER)?;
    Ok(LogLineKind::PrimaryPlayerChanged {
        player_id: hex_field(fields, 2, "player id")?,
        player_name: fields[3].clone(),
    })
}

// 12|ts|job|str|dex|...  (job is decimal)
fn decode_player_stats(fields: &[String]) -> Result<LogLineKind, String> {
    require(fields, MIN_FIELDS_PLAYER_STATS)?;
    let raw = fields[2].trim();
    let job_id = raw
        .parse()
        .map_err(|_| format!("invalid job id '{}'", raw))?;
    Ok(LogLineKind::JobChanged { job_id })
}

// 20|ts|sourceId|sourceName|abilityId|abilityName|targetId|targetName|castTime|...
// 21|ts|sourceId|sourceName|abilityId|abilityName|targetId|targetName|...
fn decode_ability(fields: &[String], min: usize, area: bool) -> Result<AbilityUse, String> {
    require(fields, min)?;
    let ability_id = hex_field(fields, 4, "ability id")?;
    let cast_ms = if min == MIN_FIELDS_STARTS_CASTING {
        Some(seconds_field(fields, 8, "cast time")?)
    } else {
        None
    };

    Ok(AbilityUse {
        source_id: hex_field(fields, 2, "source id")?,
        source_name: fields[3].clone(),
        ability_id,
        ability_name: fields[5].clone(),
        target_id: optional_hex_field(fields, 6, "target id")?,
        target_name: fields[7].clone(),
        cast_ms,
        area,
        actionable: !is_auto_attack(ability_id),
    })
}

// 26|ts|effectId|effectName|duration|sourceId|sourceName|targetId|targetName|...
fn decode_status(fields: &[String]) -> Result<StatusChange, String> {
    require(fields, MIN_FIELDS_STATUS)?;
    Ok(StatusChange {
        effect_id: hex_field(fields, 2, "effect id")?,
        effect_name: fields[3].clone(),
        duration_ms: seconds_field(fields, 4, "duration")?,
        source_id: optional_hex_field(fields, 5, "source id")?,
        source_name: fields[6].clone(),
        target_id: optional_hex_field(fields, 7, "target id")?,
        target_name: fields[8].clone(),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TS: &str = "2020-09-06T18:19:04.7950000-04:00";

    fn line(parts: &[&str]) -> String {
        parts.join("|")
    }

    // -------------------------------------------------------------------------
    // Ability lines
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_ability_used() {
        let raw = line(&[
            "21", TS, "10532971", "Tataru Taru", "1D35", "Hakaze", "40001299", "Striking Dummy",
            "710003", "9450000", "checksum",
        ]);
        let event = decode_raw(&raw);
        assert!(event.timestamp.is_some());
        match &event.kind {
            LogLineKind::AbilityUsed(used) => {
                assert_eq!(used.source_id, 0x10532971);
                assert_eq!(used.source_name, "Tataru Taru");
                assert_eq!(used.ability_id, 7477);
                assert_eq!(used.ability_name, "Hakaze");
                assert_eq!(used.target_id, Some(0x40001299));
                assert!(!used.area);
                assert!(used.actionable);
                assert_eq!(used.cast_ms, None);
            }
            other => panic!("Expected AbilityUsed, got {:?}", other),
        }
        assert_eq!(event.actionable_ability().map(|u| u.ability_id), Some(7477));
    }

    #[test]
    fn test_decode_auto_attack_not_actionable() {
        let raw = line(&[
            "21", TS, "10532971", "Tataru Taru", "7", "attack", "40001299", "Striking Dummy", "",
        ]);
        let event = decode_raw(&raw);
        match &event.kind {
            LogLineKind::AbilityUsed(used) => {
                assert_eq!(used.ability_id, 0x07);
                assert!(!used.actionable);
            }
            other => panic!("Expected AbilityUsed, got {:?}", other),
        }
        assert!(event.actionable_ability().is_none());
    }

    #[test]
    fn test_decode_aoe_ability() {
        let raw = line(&[
            "22", TS, "10532971", "Tataru Taru", "1D41", "Fuga", "40001299", "Dummy", "0",
        ]);
        match decode_raw(&raw).kind {
            LogLineKind::AbilityUsed(used) => {
                assert!(used.area);
                assert_eq!(used.ability_id, 0x1D41);
            }
            other => panic!("Expected AbilityUsed, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_cast_started() {
        let raw = line(&[
            "20", TS, "10532971", "Tataru Taru", "1D3F", "Higanbana", "40001299", "Dummy", "1.80",
            "", "",
        ]);
        match decode_raw(&raw).kind {
            LogLineKind::AbilityCastStarted(cast) => {
                assert_eq!(cast.ability_id, 0x1D3F);
                assert_eq!(cast.cast_ms, Some(1800));
            }
            other => panic!("Expected AbilityCastStarted, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_ability_blank_target() {
        let raw = line(&["21", TS, "10532971", "Tataru Taru", "1D35", "Hakaze", "", ""]);
        match decode_raw(&raw).kind {
            LogLineKind::AbilityUsed(used) => assert_eq!(used.target_id, None),
            other => panic!("Expected AbilityUsed, got {:?}", other),
        }
    }

    // -------------------------------------------------------------------------
    // Player / zone / status lines
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_job_changed() {
        let raw = line(&["12", TS, "34", "4000", "300", "checksum"]);
        assert_eq!(decode_raw(&raw).kind, LogLineKind::JobChanged { job_id: 34 });
    }

    #[test]
    fn test_decode_primary_player() {
        let raw = line(&["02", TS, "10532971", "Tataru Taru", "checksum"]);
        assert_eq!(
            decode_raw(&raw).kind,
            LogLineKind::PrimaryPlayerChanged {
                player_id: 0x10532971,
                player_name: "Tataru Taru".to_string()
            }
        );
    }

    #[test]
    fn test_decode_zone_changed() {
        let raw = line(&["01", TS, "339", "Mist", "checksum"]);
        assert_eq!(
            decode_raw(&raw).kind,
            LogLineKind::ZoneChanged {
                zone_id: 0x339,
                zone_name: "Mist".to_string()
            }
        );
    }

    #[test]
    fn test_decode_status_added_and_removed() {
        let fields = [
            "26", TS, "4CD", "Jinpu", "40.00", "10532971", "Tataru Taru", "10532971",
            "Tataru Taru", "00", "checksum",
        ];
        match decode(&fields).kind {
            LogLineKind::StatusAdded(status) => {
                assert_eq!(status.effect_id, 0x4CD);
                assert_eq!(status.duration_ms, 40_000);
                assert_eq!(status.source_id, Some(0x10532971));
            }
            other => panic!("Expected StatusAdded, got {:?}", other),
        }

        let mut removed = fields;
        removed[0] = "30";
        assert!(matches!(
            decode(&removed).kind,
            LogLineKind::StatusRemoved(_)
        ));
    }

    // -------------------------------------------------------------------------
    // Ignored / malformed
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_ignored_codes() {
        let chat = decode_raw(&line(&["00", TS, "0039", "", "Welcome", "checksum"]));
        assert_eq!(
            chat.kind,
            LogLineKind::Ignored {
                code: "00".to_string()
            }
        );

        let unknown = decode_raw(&line(&["99", TS, "x"]));
        assert_eq!(
            unknown.kind,
            LogLineKind::Ignored {
                code: "99".to_string()
            }
        );
    }

    #[test]
    fn test_decode_is_total() {
        let empty: [&str; 0] = [];
        assert!(decode(&empty).is_malformed());
        assert!(decode(&[""]).is_malformed());
        assert!(decode(&["21"]).is_malformed());
        assert!(decode(&["21", TS, "zz", "a", "b", "c", "d", "e"]).is_malformed());
        assert!(decode(&["12", TS, "paladin"]).is_malformed());
        assert!(decode(&["26", TS, "4CD", "Jinpu", "NaN", "", "", "", ""]).is_malformed());
        assert!(decode_raw("").is_malformed());
        assert!(decode_raw("garbage without separators").is_malformed());
    }

    #[test]
    fn test_decode_keeps_raw_fields() {
        let event = decode(&["12", "not-a-timestamp", "34"]);
        assert_eq!(event.raw_fields, vec!["12", "not-a-timestamp", "34"]);
        assert!(event.timestamp.is_none());
        assert_eq!(event.kind, LogLineKind::JobChanged { job_id: 34 });
    }
}
