//! Key bindings and hotbar layout
//!
//! Chords are written `Ctrl+Shift+Alt+<key>` where `<key>` is a digit, a
//! numpad key (`Numpad1`) or a key code (`KeyA`). Every hotbar slot has a
//! label (`Hotbar1 Action1`); bindings map one chord to one label.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

use super::ability::AbilityId;

// =============================================================================
// KEY CHORD
// =============================================================================

/// Key plus modifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyChord {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub key: String,
}

impl KeyChord {
    pub fn new(key: &str) -> Self {
        Self {
            ctrl: false,
            shift: false,
            alt: false,
            key: normalize_key(key),
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    /// Parse `Ctrl+Shift+1` style text, modifiers in any order and case
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts: Vec<&str> = text.split('+').map(str::trim).collect();
        let key = parts.pop().filter(|k| !k.is_empty())?;

        let mut chord = KeyChord::new(key);
        for modifier in parts {
            match modifier.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => chord.ctrl = true,
                "shift" => chord.shift = true,
                "alt" => chord.alt = true,
                _ => return None,
            }
        }
        Some(chord)
    }
}

/// `Digit1` → `1`, as keyboard events report it
fn normalize_key(key: &str) -> String {
    match key.strip_prefix("Digit") {
        Some(digit) if digit.len() == 1 && digit.chars().all(|c| c.is_ascii_digit()) => {
            digit.to_string()
        }
        _ => key.to_string(),
    }
}

impl std::fmt::Display for KeyChord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ctrl {
            write!(f, "Ctrl+")?;
        }
        if self.shift {
            write!(f, "Shift+")?;
        }
        if self.alt {
            write!(f, "Alt+")?;
        }
        write!(f, "{}", self.key)
    }
}

impl Serialize for KeyChord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for KeyChord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        KeyChord::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("Invalid key chord: '{}'", s)))
    }
}

// =============================================================================
// HOTBAR SLOTS
// =============================================================================

pub const HOTBAR_COUNT: usize = 10;
pub const SLOTS_PER_HOTBAR: usize = 12;

/// Hotbars that get default key bindings
pub const BOUND_HOTBARS: usize = 4;

const HOTBAR_KEYS: [&str; SLOTS_PER_HOTBAR] =
    ["1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "KeyA", "KeyB"];

/// Zero-based hotbar / slot position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HotbarSlot {
    pub hotbar: usize,
    pub slot: usize,
}

impl HotbarSlot {
    pub fn new(hotbar: usize, slot: usize) -> Self {
        Self { hotbar, slot }
    }

    pub fn is_valid(self) -> bool {
        self.hotbar < HOTBAR_COUNT && self.slot < SLOTS_PER_HOTBAR
    }

    /// Binding label, numbered from 1
    pub fn label(self) -> String {
        format!("Hotbar{} Action{}", self.hotbar + 1, self.slot + 1)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let (bar, action) = label.split_once(' ')?;
        let hotbar: usize = bar.strip_prefix("Hotbar")?.parse().ok()?;
        let slot: usize = action.strip_prefix("Action")?.parse().ok()?;
        let parsed = HotbarSlot::new(hotbar.checked_sub(1)?, slot.checked_sub(1)?);
        parsed.is_valid().then_some(parsed)
    }

    /// Default chord of this slot, only the first hotbars have one
    pub fn default_chord(self) -> Option<KeyChord> {
        if self.slot >= SLOTS_PER_HOTBAR {
            return None;
        }
        let chord = KeyChord::new(HOTBAR_KEYS[self.slot]);
        match self.hotbar {
            0 => Some(chord),
            1 => Some(chord.ctrl()),
            2 => Some(chord.shift()),
            3 => Some(chord.alt()),
            _ => None,
        }
    }
}

// =============================================================================
// KEY BINDINGS
// =============================================================================

/// Label ↔ chord mapping, one chord per label and one label per chord
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBindings {
    by_label: BTreeMap<String, KeyChord>,
    by_chord: HashMap<KeyChord, String>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default hotbar bindings
    pub fn default_hotbar() -> Self {
        let mut bindings = Self::new();
        for hotbar in 0..BOUND_HOTBARS {
            for slot in 0..SLOTS_PER_HOTBAR {
                let position = HotbarSlot::new(hotbar, slot);
                if let Some(chord) = position.default_chord() {
                    bindings.set(&position.label(), chord);
                }
            }
        }
        bindings
    }

    /// Defaults with user overrides applied in label order
    pub fn with_overrides(overrides: &BTreeMap<String, KeyChord>) -> Self {
        let mut bindings = Self::default_hotbar();
        for (label, chord) in overrides {
            bindings.set(label, chord.clone());
        }
        bindings
    }

    /// Bind `chord` to `label`
    ///
    /// Any other label holding the chord loses its binding and is returned.
    /// The label's previous chord becomes free.
    pub fn set(&mut self, label: &str, chord: KeyChord) -> Option<String> {
        let displaced = match self.by_chord.remove(&chord) {
            Some(other) if other != label => {
                self.by_label.remove(&other);
                Some(other)
            }
            _ => None,
        };

        if let Some(previous) = self.by_label.insert(label.to_string(), chord.clone()) {
            if previous != chord {
                self.by_chord.remove(&previous);
            }
        }
        self.by_chord.insert(chord, label.to_string());
        displaced
    }

    /// Remove the label's binding, returns its chord
    pub fn clear(&mut self, label: &str) -> Option<KeyChord> {
        let chord = self.by_label.remove(label)?;
        self.by_chord.remove(&chord);
        Some(chord)
    }

    pub fn chord_for(&self, label: &str) -> Option<&KeyChord> {
        self.by_label.get(label)
    }

    pub fn label_for(&self, chord: &KeyChord) -> Option<&str> {
        self.by_chord.get(chord).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyChord)> {
        self.by_label.iter().map(|(l, c)| (l.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }
}

// =============================================================================
// HOTBAR LAYOUT
// =============================================================================

/// Abilities placed on the hotbars
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotbarLayout {
    slots: [[Option<AbilityId>; SLOTS_PER_HOTBAR]; HOTBAR_COUNT],
}

impl Default for HotbarLayout {
    fn default() -> Self {
        Self {
            slots: [[None; SLOTS_PER_HOTBAR]; HOTBAR_COUNT],
        }
    }
}

impl HotbarLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, position: HotbarSlot) -> Option<AbilityId> {
        self.slots.get(position.hotbar)?.get(position.slot).copied()?
    }

    /// Place (or with `None`, clear) an ability; false if out of range
    pub fn set(&mut self, position: HotbarSlot, ability: Option<AbilityId>) -> bool {
        if !position.is_valid() {
            return false;
        }
        self.slots[position.hotbar][position.slot] = ability;
        true
    }

    pub fn swap(&mut self, a: HotbarSlot, b: HotbarSlot) -> bool {
        if !a.is_valid() || !b.is_valid() {
            return false;
        }
        let first = self.slots[a.hotbar][a.slot];
        self.slots[a.hotbar][a.slot] = self.slots[b.hotbar][b.slot];
        self.slots[b.hotbar][b.slot] = first;
        true
    }

    /// Fill slots in order, twelve per hotbar; returns how many were placed
    pub fn auto_assign(&mut self, abilities: &[AbilityId]) -> usize {
        let capacity = HOTBAR_COUNT * SLOTS_PER_HOTBAR;
        for (index, id) in abilities.iter().take(capacity).enumerate() {
            self.slots[index / SLOTS_PER_HOTBAR][index % SLOTS_PER_HOTBAR] = Some(*id);
        }
        abilities.len().min(capacity)
    }

    /// Occupied slots, hotbar by hotbar
    pub fn occupied(&self) -> impl Iterator<Item = (HotbarSlot, AbilityId)> + '_ {
        self.slots.iter().enumerate().flat_map(|(hotbar, bar)| {
            bar.iter()
                .enumerate()
                .filter_map(move |(slot, id)| id.map(|id| (HotbarSlot::new(hotbar, slot), id)))
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // KeyChord
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_and_format() {
        let chord = KeyChord::parse("shift+ctrl+KeyA").unwrap();
        assert!(chord.ctrl && chord.shift && !chord.alt);
        assert_eq!(chord.to_string(), "Ctrl+Shift+KeyA");
        assert_eq!(KeyChord::parse("1").unwrap(), KeyChord::new("1"));
    }

    #[test]
    fn test_digit_codes_normalized() {
        assert_eq!(KeyChord::parse("Alt+Digit5").unwrap().to_string(), "Alt+5");
        assert_eq!(KeyChord::new("Numpad5").key, "Numpad5");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(KeyChord::parse("").is_none());
        assert!(KeyChord::parse("Ctrl+").is_none());
        assert!(KeyChord::parse("Meta+1").is_none());
    }

    #[test]
    fn test_chord_serde_as_string() {
        let chord = KeyChord::new("2").ctrl();
        let json = serde_json::to_string(&chord).unwrap();
        assert_eq!(json, r#""Ctrl+2""#);
        let back: KeyChord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chord);
        assert!(serde_json::from_str::<KeyChord>(r#""Hyper+2""#).is_err());
    }

    // -------------------------------------------------------------------------
    // HotbarSlot
    // -------------------------------------------------------------------------

    #[test]
    fn test_slot_labels() {
        let slot = HotbarSlot::new(1, 11);
        assert_eq!(slot.label(), "Hotbar2 Action12");
        assert_eq!(HotbarSlot::from_label("Hotbar2 Action12"), Some(slot));
        assert_eq!(HotbarSlot::from_label("Hotbar0 Action1"), None);
        assert_eq!(HotbarSlot::from_label("Hotbar11 Action1"), None);
        assert_eq!(HotbarSlot::from_label("Hotbar1"), None);
    }

    #[test]
    fn test_default_chords() {
        assert_eq!(
            HotbarSlot::new(0, 9).default_chord().unwrap().to_string(),
            "0"
        );
        assert_eq!(
            HotbarSlot::new(1, 10).default_chord().unwrap().to_string(),
            "Ctrl+KeyA"
        );
        assert_eq!(
            HotbarSlot::new(3, 0).default_chord().unwrap().to_string(),
            "Alt+1"
        );
        assert!(HotbarSlot::new(4, 0).default_chord().is_none());
    }

    // -------------------------------------------------------------------------
    // KeyBindings
    // -------------------------------------------------------------------------

    #[test]
    fn test_default_hotbar_bindings() {
        let bindings = KeyBindings::default_hotbar();
        assert_eq!(bindings.len(), BOUND_HOTBARS * SLOTS_PER_HOTBAR);
        assert_eq!(
            bindings.label_for(&KeyChord::new("2").shift()),
            Some("Hotbar3 Action2")
        );
        assert!(bindings.chord_for("Hotbar5 Action1").is_none());
    }

    #[test]
    fn test_set_displaces_other_label() {
        let mut bindings = KeyBindings::default_hotbar();
        let displaced = bindings.set("Hotbar5 Action1", KeyChord::new("1"));
        assert_eq!(displaced.as_deref(), Some("Hotbar1 Action1"));
        assert!(bindings.chord_for("Hotbar1 Action1").is_none());
        assert_eq!(bindings.label_for(&KeyChord::new("1")), Some("Hotbar5 Action1"));
    }

    #[test]
    fn test_set_frees_previous_chord() {
        let mut bindings = KeyBindings::default_hotbar();
        let displaced = bindings.set("Hotbar1 Action1", KeyChord::new("F1"));
        assert!(displaced.is_none());
        assert!(bindings.label_for(&KeyChord::new("1")).is_none());
        assert_eq!(bindings.label_for(&KeyChord::new("F1")), Some("Hotbar1 Action1"));
    }

    #[test]
    fn test_rebinding_same_chord_is_noop() {
        let mut bindings = KeyBindings::default_hotbar();
        let before = bindings.clone();
        assert!(bindings.set("Hotbar1 Action1", KeyChord::new("1")).is_none());
        assert_eq!(bindings, before);
    }

    #[test]
    fn test_overrides_and_clear() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Hotbar6 Action1".to_string(), KeyChord::new("KeyQ"));
        let mut bindings = KeyBindings::with_overrides(&overrides);
        assert_eq!(bindings.len(), BOUND_HOTBARS * SLOTS_PER_HOTBAR + 1);

        assert_eq!(bindings.clear("Hotbar6 Action1"), Some(KeyChord::new("KeyQ")));
        assert!(bindings.label_for(&KeyChord::new("KeyQ")).is_none());
        assert!(bindings.clear("Hotbar6 Action1").is_none());
    }

    // -------------------------------------------------------------------------
    // HotbarLayout
    // -------------------------------------------------------------------------

    #[test]
    fn test_layout_set_get_swap() {
        let mut layout = HotbarLayout::new();
        let a = HotbarSlot::new(0, 0);
        let b = HotbarSlot::new(2, 5);
        assert!(layout.set(a, Some(7477)));
        assert!(layout.swap(a, b));
        assert_eq!(layout.get(a), None);
        assert_eq!(layout.get(b), Some(7477));
        assert!(!layout.set(HotbarSlot::new(10, 0), Some(1)));
        assert_eq!(layout.get(HotbarSlot::new(0, 12)), None);
    }

    #[test]
    fn test_auto_assign_wraps_hotbars() {
        let mut layout = HotbarLayout::new();
        let abilities: Vec<AbilityId> = (1..=14).collect();
        assert_eq!(layout.auto_assign(&abilities), 14);
        assert_eq!(layout.get(HotbarSlot::new(0, 11)), Some(12));
        assert_eq!(layout.get(HotbarSlot::new(1, 0)), Some(13));
        assert_eq!(layout.get(HotbarSlot::new(1, 1)), Some(14));
        assert_eq!(layout.occupied().count(), 14);
    }

    #[test]
    fn test_auto_assign_stops_at_capacity() {
        let mut layout = HotbarLayout::new();
        let abilities: Vec<AbilityId> = (0..200).collect();
        assert_eq!(layout.auto_assign(&abilities), 120);
    }
}
