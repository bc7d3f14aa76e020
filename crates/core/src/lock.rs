//! The session lock state machine: `NeverUnlocked` / `Unlocked` /
//! `SoftLocked` / `HardLocked`, and the transition table from spec §4.6.
//!
//! This module holds no secrets itself — `LockPhase` and `LockState` are
//! plain, serializable bookkeeping that the orchestrator persists via
//! `SecureStore` alongside (but never inside) the `Keystore`/`PinStoreData`.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockPhase {
    NeverUnlocked,
    Unlocked,
    SoftLocked,
    HardLocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockState {
    pub failed_pin_attempts: u8,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_failed_at: Option<OffsetDateTime>,
    pub is_hard_locked: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub hard_locked_at: Option<OffsetDateTime>,
}

impl Default for LockState {
    fn default() -> Self {
        Self {
            failed_pin_attempts: 0,
            last_failed_at: None,
            is_hard_locked: false,
            hard_locked_at: None,
        }
    }
}

impl LockState {
    #[must_use]
    pub fn reset() -> Self {
        Self::default()
    }

    pub fn record_failed_pin_attempt(&mut self, attempts: u8, now: OffsetDateTime) {
        self.failed_pin_attempts = attempts;
        self.last_failed_at = Some(now);
    }

    pub fn mark_hard_locked(&mut self, now: OffsetDateTime) {
        self.is_hard_locked = true;
        self.hard_locked_at = Some(now);
    }
}

/// Pure transition logic over `LockPhase`. Holds no I/O; the orchestrator
/// calls these to decide the next phase, then persists it itself.
pub struct LockMachine;

impl LockMachine {
    /// `NeverUnlocked → Unlocked`, or any other phase following a
    /// successful password unlock (`HardLocked → Unlocked`,
    /// `SoftLocked → Unlocked`).
    #[must_use]
    pub fn on_password_unlock_success() -> LockPhase {
        LockPhase::Unlocked
    }

    /// `Unlocked → SoftLocked`: explicit `lock()`, auto-lock timer expiry,
    /// or session expiry. Never reachable from `NeverUnlocked` or
    /// `HardLocked` — those are a caller misuse the orchestrator guards
    /// against, not something this state machine needs to re-validate.
    #[must_use]
    pub fn on_soft_lock() -> LockPhase {
        LockPhase::SoftLocked
    }

    /// `SoftLocked → Unlocked`: `unlock_with_pin` success.
    #[must_use]
    pub fn on_pin_unlock_success() -> LockPhase {
        LockPhase::Unlocked
    }

    /// `SoftLocked → HardLocked`: 3rd failed PIN attempt, `PinStoreData`
    /// deleted, or session revoked beyond refresh.
    #[must_use]
    pub fn on_hard_lock() -> LockPhase {
        LockPhase::HardLocked
    }

    /// Any state → `NeverUnlocked`: logout clears all per-user artifacts
    /// except the server-held WMK.
    #[must_use]
    pub fn on_logout() -> LockPhase {
        LockPhase::NeverUnlocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lock_state_is_unlocked_counters() {
        let state = LockState::default();
        assert_eq!(state.failed_pin_attempts, 0);
        assert!(!state.is_hard_locked);
        assert!(state.last_failed_at.is_none());
    }

    #[test]
    fn transition_methods_return_expected_phases() {
        assert_eq!(LockMachine::on_password_unlock_success(), LockPhase::Unlocked);
        assert_eq!(LockMachine::on_soft_lock(), LockPhase::SoftLocked);
        assert_eq!(LockMachine::on_pin_unlock_success(), LockPhase::Unlocked);
        assert_eq!(LockMachine::on_hard_lock(), LockPhase::HardLocked);
        assert_eq!(LockMachine::on_logout(), LockPhase::NeverUnlocked);
    }

    #[test]
    fn record_failed_pin_attempt_updates_counter_and_timestamp() {
        let mut state = LockState::default();
        let now = OffsetDateTime::UNIX_EPOCH;
        state.record_failed_pin_attempt(2, now);
        assert_eq!(state.failed_pin_attempts, 2);
        assert_eq!(state.last_failed_at, Some(now));
    }

    #[test]
    fn mark_hard_locked_sets_flag_and_timestamp() {
        let mut state = LockState::default();
        let now = OffsetDateTime::UNIX_EPOCH;
        state.mark_hard_locked(now);
        assert!(state.is_hard_locked);
        assert_eq!(state.hard_locked_at, Some(now));
    }

    #[test]
    fn reset_clears_all_fields() {
        let mut state = LockState::default();
        state.mark_hard_locked(OffsetDateTime::UNIX_EPOCH);
        state.record_failed_pin_attempt(3, OffsetDateTime::UNIX_EPOCH);
        state = LockState::reset();
        assert_eq!(state.failed_pin_attempts, 0);
        assert!(!state.is_hard_locked);
    }
}
