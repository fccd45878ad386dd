//! Cooldown engine - the single authority for "can this ability fire now"
//!
//! Owns one timer per active cooldown group and notifies observers when an
//! ability is accepted. Time only moves in `tick()`; `trigger()` never
//! changes elapsed time.

use std::collections::HashMap;
use tracing::{debug, warn};

use super::ability::{Ability, AbilityCatalog, AbilityId, CooldownGroupId};

// =============================================================================
// TYPES
// =============================================================================

/// Live timer of one cooldown group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownRecord {
    pub group_id: CooldownGroupId,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub remaining_ms: u64,
}

/// Emitted once per accepted trigger
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    pub ability: Ability,
    pub at_ms: u64,
}

/// Combo highlight state of an ability, derived from what fired before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboStatus {
    /// Not part of a combo, or its combo step is not the one that fired last
    Inactive,
    /// Firing this ability now continues the active combo
    Continuing,
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub type TriggerObserver = Box<dyn FnMut(&TriggerEvent)>;

// =============================================================================
// COOLDOWN ENGINE
// =============================================================================

pub struct CooldownEngine {
    records: HashMap<CooldownGroupId, CooldownRecord>,
    now_ms: u64,
    last_fired: Option<Ability>,
    /// Last fired ability that does not preserve combos. Combo-preserving
    /// abilities fire between combo steps without touching the running
    /// combo, so `last_fired` alone cannot tell whether it continues.
    combo_anchor: Option<AbilityId>,
    observers: Vec<(ObserverId, TriggerObserver)>,
    next_observer_id: u64,
}

impl CooldownEngine {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            now_ms: 0,
            last_fired: None,
            combo_anchor: None,
            observers: Vec::new(),
            next_observer_id: 0,
        }
    }

    /// Engine clock, as set by the last `tick()`
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Remaining cooldown of the ability's group, 0 if it may fire
    pub fn remaining_ms(&self, ability: &Ability) -> u64 {
        self.records
            .get(&ability.cooldown_group)
            .map(|r| r.remaining_ms)
            .unwrap_or(0)
    }

    pub fn is_on_cooldown(&self, ability: &Ability) -> bool {
        self.remaining_ms(ability) != 0
    }

    pub fn record(&self, group_id: CooldownGroupId) -> Option<&CooldownRecord> {
        self.records.get(&group_id)
    }

    pub fn active_records(&self) -> impl Iterator<Item = &CooldownRecord> {
        self.records.values()
    }

    pub fn last_fired(&self) -> Option<&Ability> {
        self.last_fired.as_ref()
    }

    /// Try to fire an ability
    ///
    /// Returns false (no state change, no event) while its group is on
    /// cooldown. On success the group's record is committed before the
    /// observers run, in registration order.
    pub fn trigger(&mut self, ability: &Ability) -> bool {
        let remaining = self.remaining_ms(ability);
        if remaining != 0 {
            warn!(
                ability_id = ability.id,
                group = ability.cooldown_group,
                remaining_ms = remaining,
                "[ENGINE] Ability on cooldown"
            );
            return false;
        }

        debug!(
            ability_id = ability.id,
            name = %ability.name,
            at_ms = self.now_ms,
            "[ENGINE] Triggering"
        );

        self.records.insert(
            ability.cooldown_group,
            CooldownRecord {
                group_id: ability.cooldown_group,
                start_ms: self.now_ms,
                duration_ms: ability.recast_ms,
                remaining_ms: ability.recast_ms,
            },
        );

        self.last_fired = Some(ability.clone());
        if !ability.preserves_combo {
            self.combo_anchor = Some(ability.id);
        }

        let event = TriggerEvent {
            ability: ability.clone(),
            at_ms: self.now_ms,
        };
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }

        true
    }

    /// Fire an ability by ID
    ///
    /// # Panics
    ///
    /// Panics if the ID is not in the catalog. Callers resolve IDs before
    /// they reach the engine.
    pub fn trigger_id<C: AbilityCatalog>(&mut self, catalog: &C, id: AbilityId) -> bool {
        let Some(ability) = catalog.ability(id).cloned() else {
            panic!("unknown ability id {} passed to engine", id);
        };
        self.trigger(&ability)
    }

    /// Advance the clock and recompute every live record
    ///
    /// Records that reach 0 are removed. Never fires anything.
    pub fn tick(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
        self.records.retain(|_, record| {
            let elapsed = now_ms.saturating_sub(record.start_ms);
            record.remaining_ms = record.duration_ms.saturating_sub(elapsed);
            record.remaining_ms != 0
        });
    }

    /// Combo highlight for an ability given what fired last
    pub fn combo_status(&self, ability: &Ability) -> ComboStatus {
        match (ability.combo_target_id, self.combo_anchor) {
            (Some(target), Some(anchor)) if target == anchor => ComboStatus::Continuing,
            _ => ComboStatus::Inactive,
        }
    }

    /// Register an observer for accepted triggers
    pub fn subscribe(&mut self, observer: TriggerObserver) -> ObserverId {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }
}

impl Default for CooldownEngine {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
