//! Rotation matcher - tracks progress through a phase-grouped sequence
//!
//! Longest exact prefix, restart on deviation: the expected ability advances
//! the cursor, anything else sends the whole rotation back to the start.
//! Completing the last phase loops into the repeatable phase.

use tracing::{debug, info};

use super::ability::AbilityId;
use super::rotation::{Rotation, RotationError};

// =============================================================================
// STATE
// =============================================================================

/// Cursor into the selected rotation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatcherState {
    pub phase_index: usize,
    pub action_index: usize,
    pub iteration: u32,
    /// One flag per phase
    pub done: Vec<bool>,
}

impl MatcherState {
    fn for_rotation(rotation: &Rotation) -> Self {
        Self {
            phase_index: 0,
            action_index: 0,
            iteration: 0,
            done: vec![false; rotation.phases.len()],
        }
    }
}

/// Display state of one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    Active,
    Done,
    Pending,
}

/// Result of consuming one ability
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// No rotation selected
    Idle,
    /// Expected ability, still inside the phase
    Advanced {
        phase_index: usize,
        action_index: usize,
    },
    /// Phase finished, moved to the following phase
    PhaseCompleted { completed: usize, next: usize },
    /// Last phase finished, looped into the repeatable phase
    Looped {
        completed: usize,
        repeat: usize,
        iteration: u32,
    },
    /// Unexpected ability, everything was reset
    Mismatch {
        expected: AbilityId,
        actual: AbilityId,
    },
}

// =============================================================================
// ROTATION MATCHER
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct RotationMatcher {
    rotation: Option<Rotation>,
    repeat_index: usize,
    state: MatcherState,
}

impl RotationMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rotation(&self) -> Option<&Rotation> {
        self.rotation.as_ref()
    }

    pub fn state(&self) -> &MatcherState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.rotation.is_none()
    }

    /// Replace the active rotation and reset all progress
    ///
    /// `None` puts the matcher in the idle state. An invalid rotation is
    /// refused and leaves the current selection untouched.
    pub fn select_rotation(&mut self, rotation: Option<Rotation>) -> Result<(), RotationError> {
        match rotation {
            Some(rotation) => {
                rotation.validate()?;
                self.repeat_index = rotation.repeatable_index().unwrap_or(0);
                self.state = MatcherState::for_rotation(&rotation);
                info!(
                    title = %rotation.title,
                    job_id = rotation.job_id,
                    phases = rotation.phases.len(),
                    "[MATCHER] Rotation selected"
                );
                self.rotation = Some(rotation);
            }
            None => self.clear(),
        }
        Ok(())
    }

    /// Drop the rotation; `consume` becomes a no-op
    pub fn clear(&mut self) {
        if self.rotation.take().is_some() {
            info!("[MATCHER] Rotation cleared");
        }
        self.repeat_index = 0;
        self.state = MatcherState::default();
    }

    /// Ability the matcher waits for next
    pub fn expected(&self) -> Option<AbilityId> {
        let rotation = self.rotation.as_ref()?;
        rotation
            .phases
            .get(self.state.phase_index)?
            .actions
            .get(self.state.action_index)
            .copied()
    }

    pub fn phase_status(&self, index: usize) -> PhaseStatus {
        if self.rotation.is_some() && index == self.state.phase_index {
            PhaseStatus::Active
        } else if self.state.done.get(index).copied().unwrap_or(false) {
            PhaseStatus::Done
        } else {
            PhaseStatus::Pending
        }
    }

    /// Feed one fired ability
    pub fn consume(&mut self, ability_id: AbilityId) -> MatchOutcome {
        let Some(rotation) = self.rotation.as_ref() else {
            return MatchOutcome::Idle;
        };

        let phase_count = rotation.phases.len();
        let phase_len = rotation.phases[self.state.phase_index].actions.len();
        let expected = rotation.phases[self.state.phase_index].actions[self.state.action_index];

        if ability_id != expected {
            debug!(
                expected,
                actual = ability_id,
                phase = self.state.phase_index,
                action = self.state.action_index,
                "[MATCHER] Mismatch, restarting rotation"
            );
            self.reset_progress();
            return MatchOutcome::Mismatch {
                expected,
                actual: ability_id,
            };
        }

        self.state.action_index += 1;
        if self.state.action_index < phase_len {
            return MatchOutcome::Advanced {
                phase_index: self.state.phase_index,
                action_index: self.state.action_index,
            };
        }

        let completed = self.state.phase_index;
        self.state.done[completed] = true;
        self.state.action_index = 0;

        if completed + 1 == phase_count {
            self.state.phase_index = self.repeat_index;
            self.state.iteration += 1;
            debug!(
                repeat = self.repeat_index,
                iteration = self.state.iteration,
                "[MATCHER] Rotation looped"
            );
            MatchOutcome::Looped {
                completed,
                repeat: self.repeat_index,
                iteration: self.state.iteration,
            }
        } else {
            let next = completed + 1;
            self.state.phase_index = next;
            self.state.done[next] = false;
            MatchOutcome::PhaseCompleted { completed, next }
        }
    }

    fn reset_progress(&mut self) {
        self.state.phase_index = 0;
        self.state.action_index = 0;
        self.state.iteration = 0;
        self.state.done.iter_mut().for_each(|d| *d = false);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rotation::{PhaseTag, RotationPhase};

    fn two_phase() -> Rotation {
        Rotation::new(
            34,
            vec![
                RotationPhase::new(PhaseTag::Opener, vec![7477, 7478]),
                RotationPhase::new(PhaseTag::Burst, vec![7479]).repeatable(),
            ],
        )
    }

    fn three_phase() -> Rotation {
        Rotation::new(
            34,
            vec![
                RotationPhase::new(PhaseTag::Opener, vec![1, 2, 3]),
                RotationPhase::new(PhaseTag::Cooldown, vec![4, 5]).repeatable(),
                RotationPhase::new(PhaseTag::Burst, vec![6]),
            ],
        )
    }

    fn matcher_with(rotation: Rotation) -> RotationMatcher {
        let mut matcher = RotationMatcher::new();
        matcher.select_rotation(Some(rotation)).unwrap();
        matcher
    }

    fn cursor(matcher: &RotationMatcher) -> (usize, usize, u32) {
        let s = matcher.state();
        (s.phase_index, s.action_index, s.iteration)
    }

    // -------------------------------------------------------------------------
    // Idle
    // -------------------------------------------------------------------------

    #[test]
    fn test_consume_without_rotation_is_noop() {
        let mut matcher = RotationMatcher::new();
        assert_eq!(matcher.consume(7477), MatchOutcome::Idle);
        assert!(matcher.is_idle());
        assert_eq!(matcher.expected(), None);
    }

    #[test]
    fn test_clear_rotation() {
        let mut matcher = matcher_with(two_phase());
        matcher.consume(7477);
        matcher.select_rotation(None).unwrap();
        assert!(matcher.is_idle());
        assert_eq!(matcher.consume(7478), MatchOutcome::Idle);
        assert_eq!(*matcher.state(), MatcherState::default());
    }

    #[test]
    fn test_invalid_rotation_refused() {
        let mut matcher = matcher_with(two_phase());
        let bad = Rotation::new(1, vec![RotationPhase::new(PhaseTag::Opener, vec![1])]);
        assert!(matcher.select_rotation(Some(bad)).is_err());
        assert_eq!(matcher.rotation().map(|r| r.job_id), Some(34));
    }

    // -------------------------------------------------------------------------
    // Advancing
    // -------------------------------------------------------------------------

    #[test]
    fn test_phase_advances_once_after_full_phase() {
        let mut matcher = matcher_with(three_phase());
        assert_eq!(
            matcher.consume(1),
            MatchOutcome::Advanced {
                phase_index: 0,
                action_index: 1
            }
        );
        assert_eq!(
            matcher.consume(2),
            MatchOutcome::Advanced {
                phase_index: 0,
                action_index: 2
            }
        );
        assert_eq!(
            matcher.consume(3),
            MatchOutcome::PhaseCompleted {
                completed: 0,
                next: 1
            }
        );
        assert_eq!(cursor(&matcher), (1, 0, 0));
        assert_eq!(matcher.phase_status(0), PhaseStatus::Done);
        assert_eq!(matcher.phase_status(1), PhaseStatus::Active);
        assert_eq!(matcher.phase_status(2), PhaseStatus::Pending);
        assert_eq!(matcher.expected(), Some(4));
    }

    #[test]
    fn test_loop_into_repeatable_phase() {
        let mut matcher = matcher_with(three_phase());
        for id in [1, 2, 3, 4, 5] {
            matcher.consume(id);
        }
        assert_eq!(cursor(&matcher), (2, 0, 0));

        assert_eq!(
            matcher.consume(6),
            MatchOutcome::Looped {
                completed: 2,
                repeat: 1,
                iteration: 1
            }
        );
        assert_eq!(cursor(&matcher), (1, 0, 1));

        // Repeat phase then last phase again
        for id in [4, 5, 6] {
            matcher.consume(id);
        }
        assert_eq!(cursor(&matcher), (1, 0, 2));
    }

    #[test]
    fn test_repeatable_last_phase_loops_on_itself() {
        let mut matcher = matcher_with(two_phase());
        for id in [7477, 7478, 7479] {
            matcher.consume(id);
        }
        assert_eq!(cursor(&matcher), (1, 0, 1));
        matcher.consume(7479);
        assert_eq!(cursor(&matcher), (1, 0, 2));
        matcher.consume(7479);
        assert_eq!(cursor(&matcher), (1, 0, 3));
    }

    // -------------------------------------------------------------------------
    // Restart on mismatch
    // -------------------------------------------------------------------------

    #[test]
    fn test_mismatch_after_iteration_resets_everything() {
        let mut matcher = matcher_with(two_phase());
        for id in [7477, 7478, 7479] {
            matcher.consume(id);
        }
        assert_eq!(cursor(&matcher), (1, 0, 1));

        assert_eq!(
            matcher.consume(9999),
            MatchOutcome::Mismatch {
                expected: 7479,
                actual: 9999
            }
        );
        assert_eq!(cursor(&matcher), (0, 0, 0));
        assert!(matcher.state().done.iter().all(|d| !d));

        // Out-of-place burst action is another mismatch
        matcher.consume(7479);
        assert_eq!(cursor(&matcher), (0, 0, 0));
    }

    #[test]
    fn test_mismatch_mid_phase_restarts_whole_rotation() {
        let mut matcher = matcher_with(three_phase());
        for id in [1, 2, 3, 4] {
            matcher.consume(id);
        }
        assert_eq!(cursor(&matcher), (1, 1, 0));

        matcher.consume(1);
        assert_eq!(cursor(&matcher), (0, 0, 0));
        assert_eq!(matcher.phase_status(0), PhaseStatus::Active);
        assert_eq!(matcher.phase_status(1), PhaseStatus::Pending);
    }

    #[test]
    fn test_select_resets_progress() {
        let mut matcher = matcher_with(three_phase());
        matcher.consume(1);
        matcher.consume(2);
        matcher.select_rotation(Some(three_phase())).unwrap();
        assert_eq!(cursor(&matcher), (0, 0, 0));
        assert_eq!(matcher.state().done, vec![false, false, false]);
    }
}
