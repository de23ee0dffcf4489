//! Engine lifecycle state machine.
//!
//! All transitions serialize through one mutex; a lock-free mirror serves
//! reads so queries never wait behind a long-running transition action.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use wavenote_audio::{EngineError, EngineState};

fn state_to_u8(state: EngineState) -> u8 {
    match state {
        EngineState::Uninitialized => 0,
        EngineState::Initializing => 1,
        EngineState::Initialized => 2,
        EngineState::Closing => 3,
        EngineState::Closed => 4,
    }
}

fn state_from_u8(raw: u8) -> EngineState {
    match raw {
        0 => EngineState::Uninitialized,
        1 => EngineState::Initializing,
        2 => EngineState::Initialized,
        3 => EngineState::Closing,
        _ => EngineState::Closed,
    }
}

fn transition_allowed(from: EngineState, to: EngineState) -> bool {
    use EngineState::{Closed, Closing, Initialized, Initializing, Uninitialized};
    matches!(
        (from, to),
        (Uninitialized, Initializing)
            | (Initializing, Initialized)
            | (Initializing, Closed)
            | (Initialized, Closing)
            | (Closing, Closed)
            // Closed engines may be re-initialized.
            | (Closed, Initializing)
    )
}

/// Thread-safe lifecycle state holder with guarded transitions.
#[derive(Debug)]
pub(crate) struct EngineStateMachine {
    guarded: Mutex<EngineState>,
    snapshot: AtomicU8,
}

impl EngineStateMachine {
    pub(crate) fn new() -> Self {
        Self {
            guarded: Mutex::new(EngineState::Uninitialized),
            snapshot: AtomicU8::new(state_to_u8(EngineState::Uninitialized)),
        }
    }

    /// Current state without taking the transition lock.
    pub(crate) fn state(&self) -> EngineState {
        state_from_u8(self.snapshot.load(Ordering::Acquire))
    }

    /// Transitions to `target` and runs `action` under the lock.
    ///
    /// If `action` fails the previous state is restored before the error
    /// propagates; the original error is never swallowed.
    pub(crate) fn transition_to<T>(
        &self,
        target: EngineState,
        action: impl FnOnce() -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut state = self.guarded.lock().expect("engine state lock poisoned");
        let previous = *state;
        if !transition_allowed(previous, target) {
            return Err(EngineError::InvalidTransition {
                from: previous,
                to: target,
            });
        }
        *state = target;
        self.snapshot.store(state_to_u8(target), Ordering::Release);

        match action() {
            Ok(value) => Ok(value),
            Err(err) => {
                *state = previous;
                self.snapshot.store(state_to_u8(previous), Ordering::Release);
                Err(err)
            }
        }
    }

    /// Runs `action` under the lock after asserting the current state.
    pub(crate) fn execute_in_state<T>(
        &self,
        required: EngineState,
        action: impl FnOnce() -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let state = self.guarded.lock().expect("engine state lock poisoned");
        if *state != required {
            return Err(EngineError::InvalidState {
                required,
                actual: *state,
            });
        }
        action()
    }

    /// Atomically moves `expected → target`.
    ///
    /// Returns `false` on a state mismatch or an illegal transition; never
    /// fails.
    pub(crate) fn compare_and_set(&self, expected: EngineState, target: EngineState) -> bool {
        let mut state = self.guarded.lock().expect("engine state lock poisoned");
        if *state != expected || !transition_allowed(expected, target) {
            return false;
        }
        *state = target;
        self.snapshot.store(state_to_u8(target), Ordering::Release);
        true
    }

    /// Fails unless the current state equals `expected`.
    pub(crate) fn check_state(&self, expected: EngineState) -> Result<(), EngineError> {
        let actual = self.state();
        if actual != expected {
            return Err(EngineError::InvalidState {
                required: expected,
                actual,
            });
        }
        Ok(())
    }

    /// Fails unless the current state is one of `expected`.
    #[allow(dead_code)]
    pub(crate) fn check_state_any(
        &self,
        expected: &'static [EngineState],
    ) -> Result<(), EngineError> {
        let actual = self.state();
        if expected.contains(&actual) {
            return Ok(());
        }
        Err(EngineError::InvalidStateAny {
            required: expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::EngineStateMachine;
    use wavenote_audio::{EngineError, EngineState};

    fn machine_in(state: EngineState) -> EngineStateMachine {
        let machine = EngineStateMachine::new();
        let path: &[EngineState] = match state {
            EngineState::Uninitialized => &[],
            EngineState::Initializing => &[EngineState::Initializing],
            EngineState::Initialized => {
                &[EngineState::Initializing, EngineState::Initialized]
            }
            EngineState::Closing => &[
                EngineState::Initializing,
                EngineState::Initialized,
                EngineState::Closing,
            ],
            EngineState::Closed => &[
                EngineState::Initializing,
                EngineState::Initialized,
                EngineState::Closing,
                EngineState::Closed,
            ],
        };
        for step in path {
            machine
                .transition_to(*step, || Ok(()))
                .expect("setup transition failed");
        }
        machine
    }

    #[test]
    fn starts_uninitialized() {
        let machine = EngineStateMachine::new();
        assert_eq!(machine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn walks_the_full_lifecycle() {
        let machine = machine_in(EngineState::Closed);
        assert_eq!(machine.state(), EngineState::Closed);
        // Closed engines may be re-initialized.
        assert!(machine.compare_and_set(EngineState::Closed, EngineState::Initializing));
    }

    #[test]
    fn rejects_illegal_transitions() {
        let machine = EngineStateMachine::new();
        let err = machine
            .transition_to(EngineState::Initialized, || Ok(()))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: EngineState::Uninitialized,
                to: EngineState::Initialized,
            },
        ));
        assert_eq!(machine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn failed_action_rolls_back_and_propagates_the_original_error() {
        let machine = EngineStateMachine::new();
        let err = machine
            .transition_to(EngineState::Initializing, || {
                Err::<(), _>(EngineError::AlreadyInitialized)
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyInitialized));
        assert_eq!(machine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn initializing_may_close_directly() {
        let machine = machine_in(EngineState::Initializing);
        assert!(machine.compare_and_set(EngineState::Initializing, EngineState::Closed));
        assert_eq!(machine.state(), EngineState::Closed);
    }

    #[test]
    fn compare_and_set_fails_quietly_on_mismatch_or_illegal_target() {
        let machine = machine_in(EngineState::Initialized);
        // Wrong expected state.
        assert!(!machine.compare_and_set(EngineState::Closing, EngineState::Closed));
        // Right expected state, illegal target.
        assert!(!machine.compare_and_set(EngineState::Initialized, EngineState::Uninitialized));
        assert_eq!(machine.state(), EngineState::Initialized);
    }

    #[test]
    fn execute_in_state_requires_the_exact_state() {
        let machine = machine_in(EngineState::Initialized);
        assert!(machine
            .execute_in_state(EngineState::Initialized, || Ok(()))
            .is_ok());
        let err = machine
            .execute_in_state(EngineState::Closed, || Ok(()))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[test]
    fn every_pair_outside_the_table_is_rejected() {
        const STATES: [EngineState; 5] = [
            EngineState::Uninitialized,
            EngineState::Initializing,
            EngineState::Initialized,
            EngineState::Closing,
            EngineState::Closed,
        ];
        const ALLOWED: [(EngineState, EngineState); 6] = [
            (EngineState::Uninitialized, EngineState::Initializing),
            (EngineState::Initializing, EngineState::Initialized),
            (EngineState::Initializing, EngineState::Closed),
            (EngineState::Initialized, EngineState::Closing),
            (EngineState::Closing, EngineState::Closed),
            (EngineState::Closed, EngineState::Initializing),
        ];
        for from in STATES {
            for to in STATES {
                let machine = machine_in(from);
                let accepted = machine.compare_and_set(from, to);
                assert_eq!(
                    accepted,
                    ALLOWED.contains(&(from, to)),
                    "transition {from} -> {to}",
                );
            }
        }
    }

    #[test]
    fn concurrent_compare_and_set_admits_exactly_one_winner() {
        let machine = std::sync::Arc::new(EngineStateMachine::new());
        let winners: usize = std::thread::scope(|scope| {
            (0..8)
                .map(|_| {
                    let machine = std::sync::Arc::clone(&machine);
                    scope.spawn(move || {
                        machine.compare_and_set(
                            EngineState::Uninitialized,
                            EngineState::Initializing,
                        )
                    })
                })
                .collect::<Vec<_>>()
                .into_iter()
                .map(|handle| usize::from(handle.join().expect("thread panicked")))
                .sum()
        });
        assert_eq!(winners, 1);
        assert_eq!(machine.state(), EngineState::Initializing);
    }

    #[test]
    fn check_state_any_accepts_any_listed_state() {
        let machine = machine_in(EngineState::Initialized);
        assert!(machine
            .check_state_any(&[EngineState::Initializing, EngineState::Initialized])
            .is_ok());
        assert!(machine
            .check_state_any(&[EngineState::Closed])
            .is_err());
    }
}
