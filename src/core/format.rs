//! Formatting utilities for trainer display.

use super::cooldown::CooldownRecord;

/// Format a duration as seconds with two decimals (`2.50s`).
pub fn format_seconds(ms: u64) -> String {
    format!("{}.{:02}s", ms / 1000, (ms % 1000) / 10)
}

/// Cast time for tooltips, `Instant` when the ability has none.
pub fn format_cast_time(cast_ms: u64) -> String {
    if cast_ms == 0 {
        "Instant".to_string()
    } else {
        format_seconds(cast_ms)
    }
}

/// Remaining cooldown as shown on a hotbar slot: whole seconds rounded up,
/// tenths below one second, empty when ready.
pub fn format_cooldown(remaining_ms: u64) -> String {
    match remaining_ms {
        0 => String::new(),
        1..=999 => format!("0.{}", remaining_ms.div_ceil(100).min(9)),
        _ => remaining_ms.div_ceil(1000).to_string(),
    }
}

/// Elapsed share of a cooldown in `0.0..=1.0`, for the sweep overlay.
pub fn cooldown_fraction(record: &CooldownRecord) -> f32 {
    if record.duration_ms == 0 {
        return 1.0;
    }
    let elapsed = record.duration_ms.saturating_sub(record.remaining_ms);
    elapsed as f32 / record.duration_ms as f32
}

/// Progress counter (`3/5`).
pub fn format_progress(done: usize, total: usize) -> String {
    format!("{}/{}", done.min(total), total)
}
