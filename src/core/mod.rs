//! Core module - platform-independent trainer logic

pub mod ability;
pub mod binding;
pub mod constants;
pub mod cooldown;
pub mod format;
pub mod io_traits;
pub mod log_line;
pub mod matcher;
pub mod protocol;
pub mod rotation;
pub mod session;

pub use ability::{Ability, AbilityCatalog, AbilityId, JobId, StaticCatalog};
pub use cooldown::{CooldownEngine, CooldownRecord, TriggerEvent};
pub use io_traits::{CallError, ConnectionStatus, PendingCall, Transport};
pub use log_line::{decode, decode_raw, LogLineEvent, LogLineKind};
pub use matcher::{MatchOutcome, RotationMatcher};
pub use rotation::{Rotation, RotationError};
pub use session::{SessionEvent, TrainerSession};
