//! Overlay host protocol types
//!
//! JSON messages exchanged with the combat-log plugin host. The same calls
//! travel over both transports; only the socket wraps them in an `Envelope`
//! carrying a sequence number for response correlation.

use serde::{Deserialize, Serialize};

// =============================================================================
// EVENT KINDS
// =============================================================================

/// Kinds of pushed events a client can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    LogLine,
    ChangePrimaryPlayer,
    ChangeZone,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::LogLine => "LogLine",
            EventKind::ChangePrimaryPlayer => "ChangePrimaryPlayer",
            EventKind::ChangeZone => "ChangeZone",
        }
    }
}

// =============================================================================
// CALLS (client → host)
// =============================================================================

/// Handler calls sent to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call")]
pub enum OverlayCall {
    /// Start pushing these event kinds
    #[serde(rename = "subscribe")]
    Subscribe { events: Vec<EventKind> },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { events: Vec<EventKind> },
    /// Query combatants, optionally filtered
    #[serde(rename = "getCombatants")]
    GetCombatants {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        ids: Vec<u32>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        names: Vec<String>,
    },
    #[serde(rename = "getLanguage")]
    GetLanguage,
}

/// Socket frame: a call plus the sequence number echoed back in the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub call: OverlayCall,
    #[serde(rename = "rseq", default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
}

impl Envelope {
    pub fn fire_and_forget(call: OverlayCall) -> Self {
        Self {
            call,
            sequence_number: None,
        }
    }

    pub fn correlated(call: OverlayCall, sequence_number: u64) -> Self {
        Self {
            call,
            sequence_number: Some(sequence_number),
        }
    }
}

/// Wire name of the sequence number field in socket frames
pub const SEQUENCE_FIELD: &str = "rseq";

// =============================================================================
// PUSHED EVENTS (host → client)
// =============================================================================

/// Events pushed by the host without a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PushEvent {
    LogLine {
        line: Vec<String>,
        #[serde(rename = "rawLine", default, skip_serializing_if = "Option::is_none")]
        raw_line: Option<String>,
    },
    ChangePrimaryPlayer {
        #[serde(rename = "charID")]
        char_id: u32,
        #[serde(rename = "charName", default)]
        char_name: String,
    },
    ChangeZone {
        #[serde(rename = "zoneID")]
        zone_id: u32,
        #[serde(rename = "zoneName", default)]
        zone_name: String,
    },
}

impl PushEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::LogLine { .. } => EventKind::LogLine,
            PushEvent::ChangePrimaryPlayer { .. } => EventKind::ChangePrimaryPlayer,
            PushEvent::ChangeZone { .. } => EventKind::ChangeZone,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
