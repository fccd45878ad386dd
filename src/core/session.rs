//! Trainer session - orchestrates the engine and matcher with the transport
//!
//! TrainerSession owns the cooldown engine, the rotation matcher, the key
//! bindings and the hotbar layout. Input arrives either from key presses
//! (through the engine) or from decoded combat-log lines (straight to the
//! matcher). Each call returns the events that occurred, for UI and logging.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::core::ability::{Ability, AbilityCatalog, AbilityId, JobId};
use crate::core::binding::{HotbarLayout, HotbarSlot, KeyBindings, KeyChord};
use crate::core::constants::HISTORY_LIMIT;
use crate::core::cooldown::CooldownEngine;
use crate::core::io_traits::{ConnectionStatus, HandlerId, Transport};
use crate::core::log_line::{self, AbilityUse, LogLineKind};
use crate::core::matcher::{MatchOutcome, RotationMatcher};
use crate::core::protocol::{EventKind, PushEvent};
use crate::core::rotation::{Rotation, RotationError};

// =============================================================================
// SESSION EVENTS
// =============================================================================

/// Events emitted by TrainerSession for UI updates and logging
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The engine accepted an ability
    Triggered { ability_id: AbilityId, at_ms: u64 },
    /// The engine refused an ability still on cooldown
    OnCooldown {
        ability_id: AbilityId,
        remaining_ms: u64,
    },
    /// The matcher consumed an ability
    Matched(MatchOutcome),
    /// The player's job changed, the rotation was cleared
    JobChanged(JobId),
    /// A rotation for another job was selected
    JobChangeRequested(JobId),
    PrimaryPlayerChanged { player_id: u32, player_name: String },
    ZoneChanged { zone_id: u32, zone_name: String },
    /// Undecodable log line, ingestion continues
    LogLineRejected { reason: String },
    /// Transport connection status changed
    ConnectionChanged(ConnectionStatus),
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// Session behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Only abilities used by the primary player advance the rotation
    pub primary_player_only: bool,
    /// Accepted abilities kept in the history
    pub history_limit: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            primary_player_only: true,
            history_limit: HISTORY_LIMIT,
        }
    }
}

/// Where an accepted ability came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Manual,
    Telemetry,
}

/// One accepted ability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    pub ability_id: AbilityId,
    pub at_ms: u64,
    pub source: InputSource,
}

/// Last area ability line, to fold the per-target duplicates
#[derive(Debug, Clone, PartialEq, Eq)]
struct AreaUse {
    source_id: u32,
    ability_id: AbilityId,
    timestamp: String,
}

// =============================================================================
// TRAINER SESSION
// =============================================================================

pub struct TrainerSession {
    engine: CooldownEngine,
    matcher: RotationMatcher,
    options: SessionOptions,
    bindings: KeyBindings,
    layout: HotbarLayout,
    /// Filled by transport handlers, drained by `update()`
    inbox: Rc<RefCell<VecDeque<PushEvent>>>,
    handlers: Vec<HandlerId>,
    primary_player: Option<u32>,
    job: Option<JobId>,
    history: VecDeque<HistoryEntry>,
    last_status: Option<ConnectionStatus>,
    last_area_use: Option<AreaUse>,
}

impl TrainerSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            engine: CooldownEngine::new(),
            matcher: RotationMatcher::new(),
            options,
            bindings: KeyBindings::default_hotbar(),
            layout: HotbarLayout::new(),
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            handlers: Vec::new(),
            primary_player: None,
            job: None,
            history: VecDeque::new(),
            last_status: None,
            last_area_use: None,
        }
    }

    pub fn with_bindings(mut self, bindings: KeyBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn engine(&self) -> &CooldownEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut CooldownEngine {
        &mut self.engine
    }

    pub fn matcher(&self) -> &RotationMatcher {
        &self.matcher
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut KeyBindings {
        &mut self.bindings
    }

    pub fn layout(&self) -> &HotbarLayout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut HotbarLayout {
        &mut self.layout
    }

    /// Accepted abilities, oldest first
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn job(&self) -> Option<JobId> {
        self.job
    }

    pub fn primary_player(&self) -> Option<u32> {
        self.primary_player
    }

    // -------------------------------------------------------------------------
    // Transport wiring
    // -------------------------------------------------------------------------

    /// Register push handlers and ask the host to start sending events
    pub fn attach<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        for kind in [
            EventKind::LogLine,
            EventKind::ChangePrimaryPlayer,
            EventKind::ChangeZone,
        ] {
            let inbox = Rc::clone(&self.inbox);
            let id = transport.subscribe(
                kind,
                Box::new(move |event: &PushEvent| inbox.borrow_mut().push_back(event.clone())),
            );
            self.handlers.push(id);
        }
        transport.start_events();
        info!(handlers = self.handlers.len(), "[SESSION] Attached to transport");
    }

    pub fn detach<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        for id in self.handlers.drain(..) {
            transport.unsubscribe(id);
        }
        self.inbox.borrow_mut().clear();
    }

    /// Pump the transport and process everything it delivered
    ///
    /// Call once per frame, after `tick()`.
    pub fn update<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        transport.poll();
        let status = transport.status();
        if self.last_status != Some(status) {
            self.last_status = Some(status);
            events.push(SessionEvent::ConnectionChanged(status));
        }

        loop {
            // Borrow released before handling
            let Some(event) = self.inbox.borrow_mut().pop_front() else {
                break;
            };
            self.handle_push(event, &mut events);
        }

        events
    }

    fn handle_push(&mut self, event: PushEvent, events: &mut Vec<SessionEvent>) {
        match event {
            PushEvent::LogLine { line, .. } => events.extend(self.ingest_line(&line)),
            PushEvent::ChangePrimaryPlayer { char_id, char_name } => {
                self.set_primary_player(char_id, char_name, events)
            }
            PushEvent::ChangeZone { zone_id, zone_name } => {
                events.push(SessionEvent::ZoneChanged { zone_id, zone_name })
            }
        }
    }

    // -------------------------------------------------------------------------
    // Telemetry input
    // -------------------------------------------------------------------------

    /// Process one combat-log record
    pub fn ingest_line<S: AsRef<str>>(&mut self, fields: &[S]) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let event = log_line::decode(fields);
        let timestamp = event.raw_fields.get(1).cloned().unwrap_or_default();

        match event.kind {
            LogLineKind::Malformed { reason } => {
                warn!(reason = %reason, "[SESSION] Rejected log line");
                events.push(SessionEvent::LogLineRejected { reason });
            }
            LogLineKind::JobChanged { job_id } => events.extend(self.set_job(job_id)),
            LogLineKind::PrimaryPlayerChanged {
                player_id,
                player_name,
            } => self.set_primary_player(player_id, player_name, &mut events),
            LogLineKind::ZoneChanged { zone_id, zone_name } => {
                events.push(SessionEvent::ZoneChanged { zone_id, zone_name })
            }
            LogLineKind::AbilityUsed(used) => {
                if self.accepts_use(&used, timestamp) {
                    self.record_history(used.ability_id, InputSource::Telemetry);
                    self.feed_matcher(used.ability_id, &mut events);
                }
            }
            LogLineKind::AbilityCastStarted(_)
            | LogLineKind::StatusAdded(_)
            | LogLineKind::StatusRemoved(_)
            | LogLineKind::Ignored { .. } => {}
        }

        events
    }

    fn accepts_use(&mut self, used: &AbilityUse, timestamp: String) -> bool {
        if !used.actionable {
            return false;
        }
        if self.options.primary_player_only
            && self.primary_player.is_some_and(|id| id != used.source_id)
        {
            return false;
        }

        if used.area {
            let area_use = AreaUse {
                source_id: used.source_id,
                ability_id: used.ability_id,
                timestamp,
            };
            if self.last_area_use.as_ref() == Some(&area_use) {
                return false;
            }
            self.last_area_use = Some(area_use);
        } else {
            self.last_area_use = None;
        }
        true
    }

    fn set_primary_player(&mut self, player_id: u32, player_name: String, events: &mut Vec<SessionEvent>) {
        if self.primary_player == Some(player_id) {
            return;
        }
        info!(player_id, name = %player_name, "[SESSION] Primary player changed");
        self.primary_player = Some(player_id);
        events.push(SessionEvent::PrimaryPlayerChanged {
            player_id,
            player_name,
        });
    }

    /// Record the player's job; a different job clears the rotation
    pub fn set_job(&mut self, job_id: JobId) -> Vec<SessionEvent> {
        if self.job == Some(job_id) {
            return Vec::new();
        }
        info!(job_id, previous = ?self.job, "[SESSION] Job changed");
        self.job = Some(job_id);
        self.matcher.clear();
        vec![SessionEvent::JobChanged(job_id)]
    }

    // -------------------------------------------------------------------------
    // Manual input
    // -------------------------------------------------------------------------

    /// Advance the engine clock
    pub fn tick(&mut self, now_ms: u64) {
        self.engine.tick(now_ms);
    }

    /// Fire an ability through the cooldown engine
    pub fn trigger(&mut self, ability: &Ability) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if !self.engine.trigger(ability) {
            events.push(SessionEvent::OnCooldown {
                ability_id: ability.id,
                remaining_ms: self.engine.remaining_ms(ability),
            });
            return events;
        }

        events.push(SessionEvent::Triggered {
            ability_id: ability.id,
            at_ms: self.engine.now_ms(),
        });
        self.record_history(ability.id, InputSource::Manual);
        self.feed_matcher(ability.id, &mut events);
        events
    }

    /// Resolve a key chord to its hotbar slot and fire the ability placed there
    ///
    /// Unbound chords and empty slots do nothing. An ability missing from
    /// the catalog is refused before it reaches the engine.
    pub fn press<C: AbilityCatalog + ?Sized>(
        &mut self,
        catalog: &C,
        chord: &KeyChord,
    ) -> Vec<SessionEvent> {
        let Some(slot) = self
            .bindings
            .label_for(chord)
            .and_then(HotbarSlot::from_label)
        else {
            debug!(chord = %chord, "[SESSION] Chord not bound to a slot");
            return Vec::new();
        };
        let Some(ability_id) = self.layout.get(slot) else {
            return Vec::new();
        };
        let Some(ability) = catalog.ability(ability_id).cloned() else {
            warn!(ability_id, slot = %slot.label(), "[SESSION] Slot holds an unknown ability");
            return Vec::new();
        };
        self.trigger(&ability)
    }

    // -------------------------------------------------------------------------
    // Rotation
    // -------------------------------------------------------------------------

    /// Select the rotation to match against, `None` to stop matching
    pub fn select_rotation(
        &mut self,
        rotation: Option<Rotation>,
    ) -> Result<Vec<SessionEvent>, RotationError> {
        let job_id = rotation.as_ref().map(|r| r.job_id);
        self.matcher.select_rotation(rotation)?;

        let mut events = Vec::new();
        if let Some(job_id) = job_id {
            if self.job != Some(job_id) {
                info!(job_id, "[SESSION] Rotation requires another job");
                self.job = Some(job_id);
                events.push(SessionEvent::JobChangeRequested(job_id));
            }
        }
        Ok(events)
    }

    fn feed_matcher(&mut self, ability_id: AbilityId, events: &mut Vec<SessionEvent>) {
        match self.matcher.consume(ability_id) {
            MatchOutcome::Idle => {}
            outcome => events.push(SessionEvent::Matched(outcome)),
        }
    }

    fn record_history(&mut self, ability_id: AbilityId, source: InputSource) {
        if self.options.history_limit == 0 {
            return;
        }
        while self.history.len() >= self.options.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry {
            ability_id,
            at_ms: self.engine.now_ms(),
            source,
        });
    }
}

impl Default for TrainerSession {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

// =============================================================================
// TESTS
// =============================================================================
