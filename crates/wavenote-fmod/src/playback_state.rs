//! Playback state machine.
//!
//! Stable states are Stopped, Playing, Paused and Finished. Seeking exists
//! only as a transient notification the facade emits around a seek; it never
//! becomes the machine's state. Errors surface through the error callback
//! without a stable Error state.

use std::sync::Mutex;

use tracing::warn;

use wavenote_audio::{PlaybackError, PlaybackState};

fn transition_allowed(from: PlaybackState, to: PlaybackState) -> bool {
    use PlaybackState::{Finished, Paused, Playing, Stopped};
    matches!(
        (from, to),
        (Stopped, Playing)
            // Finished playback may restart or settle to stopped.
            | (Finished, Playing)
            | (Finished, Stopped)
            | (Playing, Paused)
            | (Playing, Stopped)
            | (Playing, Finished)
            | (Paused, Playing)
            | (Paused, Stopped)
    )
}

/// Serialized playback state with a validated transition table.
#[derive(Debug)]
pub(crate) struct PlaybackStateMachine {
    state: Mutex<PlaybackState>,
}

impl PlaybackStateMachine {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(PlaybackState::Stopped),
        }
    }

    pub(crate) fn state(&self) -> PlaybackState {
        *self.state.lock().expect("playback state lock poisoned")
    }

    /// Whether playback is playing or paused.
    pub(crate) fn is_active(&self) -> bool {
        !matches!(
            self.state(),
            PlaybackState::Stopped | PlaybackState::Finished,
        )
    }

    /// Stopped/Finished → Playing.
    pub(crate) fn transition_to_playing(&self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock().expect("playback state lock poisoned");
        if !matches!(*state, PlaybackState::Stopped | PlaybackState::Finished) {
            return Err(PlaybackError::InvalidStateFor {
                action: "start playback",
                state: *state,
            });
        }
        *state = PlaybackState::Playing;
        Ok(())
    }

    /// Playing → Paused.
    pub(crate) fn transition_to_paused(&self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock().expect("playback state lock poisoned");
        if *state != PlaybackState::Playing {
            return Err(PlaybackError::InvalidStateFor {
                action: "pause",
                state: *state,
            });
        }
        *state = PlaybackState::Paused;
        Ok(())
    }

    /// Paused → Playing.
    pub(crate) fn resume(&self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock().expect("playback state lock poisoned");
        if *state != PlaybackState::Paused {
            return Err(PlaybackError::InvalidStateFor {
                action: "resume",
                state: *state,
            });
        }
        *state = PlaybackState::Playing;
        Ok(())
    }

    /// Any state → Stopped; no-op when already stopped.
    pub(crate) fn transition_to_stopped(&self) {
        let mut state = self.state.lock().expect("playback state lock poisoned");
        *state = PlaybackState::Stopped;
    }

    /// Seeks are only legal while playing or paused. The machine does not
    /// change state: native seeks are instant.
    pub(crate) fn validate_seek_allowed(&self) -> Result<(), PlaybackError> {
        let state = self.state.lock().expect("playback state lock poisoned");
        if !matches!(*state, PlaybackState::Playing | PlaybackState::Paused) {
            return Err(PlaybackError::InvalidStateFor {
                action: "seek",
                state: *state,
            });
        }
        Ok(())
    }

    /// Playing → Finished on natural completion.
    pub(crate) fn transition_to_finished(&self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock().expect("playback state lock poisoned");
        if *state != PlaybackState::Playing {
            return Err(PlaybackError::InvalidStateFor {
                action: "finish playback",
                state: *state,
            });
        }
        *state = PlaybackState::Finished;
        Ok(())
    }

    /// Forces Playing/Paused to Stopped after the native channel vanished;
    /// Stopped and Finished are left untouched.
    pub(crate) fn handle_channel_invalid(&self) {
        let mut state = self.state.lock().expect("playback state lock poisoned");
        if matches!(*state, PlaybackState::Playing | PlaybackState::Paused) {
            *state = PlaybackState::Stopped;
        }
    }

    /// Resets to Stopped unconditionally.
    pub(crate) fn reset(&self) {
        let mut state = self.state.lock().expect("playback state lock poisoned");
        *state = PlaybackState::Stopped;
    }

    /// Atomically validates identity and legality, then transitions.
    pub(crate) fn compare_and_set(&self, expected: PlaybackState, next: PlaybackState) -> bool {
        let mut state = self.state.lock().expect("playback state lock poisoned");
        if *state != expected {
            return false;
        }
        if !transition_allowed(expected, next) {
            warn!(from = %expected, to = %next, "invalid playback transition attempt");
            return false;
        }
        *state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::PlaybackStateMachine;
    use wavenote_audio::{PlaybackError, PlaybackState};

    fn playing() -> PlaybackStateMachine {
        let machine = PlaybackStateMachine::new();
        machine.transition_to_playing().expect("play failed");
        machine
    }

    fn machine_in(state: PlaybackState) -> PlaybackStateMachine {
        let machine = PlaybackStateMachine::new();
        match state {
            PlaybackState::Stopped => {}
            PlaybackState::Playing => machine.transition_to_playing().expect("play failed"),
            PlaybackState::Paused => {
                machine.transition_to_playing().expect("play failed");
                machine.transition_to_paused().expect("pause failed");
            }
            PlaybackState::Finished => {
                machine.transition_to_playing().expect("play failed");
                machine.transition_to_finished().expect("finish failed");
            }
            PlaybackState::Seeking | PlaybackState::Error => {
                panic!("{state} is not a stable machine state")
            }
        }
        machine
    }

    #[test]
    fn starts_stopped_and_inactive() {
        let machine = PlaybackStateMachine::new();
        assert_eq!(machine.state(), PlaybackState::Stopped);
        assert!(!machine.is_active());
    }

    #[test]
    fn play_pause_resume_stop_cycle() {
        let machine = playing();
        assert!(machine.is_active());
        machine.transition_to_paused().expect("pause failed");
        assert_eq!(machine.state(), PlaybackState::Paused);
        machine.resume().expect("resume failed");
        assert_eq!(machine.state(), PlaybackState::Playing);
        machine.transition_to_stopped();
        assert_eq!(machine.state(), PlaybackState::Stopped);
    }

    #[test]
    fn finished_playback_may_restart() {
        let machine = playing();
        machine.transition_to_finished().expect("finish failed");
        assert_eq!(machine.state(), PlaybackState::Finished);
        assert!(!machine.is_active());
        machine.transition_to_playing().expect("restart failed");
        assert_eq!(machine.state(), PlaybackState::Playing);
    }

    #[test]
    fn stop_is_accepted_from_every_state() {
        let machine = playing();
        machine.transition_to_finished().expect("finish failed");
        machine.transition_to_stopped();
        assert_eq!(machine.state(), PlaybackState::Stopped);
        // Stopping again is a no-op.
        machine.transition_to_stopped();
        assert_eq!(machine.state(), PlaybackState::Stopped);
    }

    #[test]
    fn illegal_transitions_name_the_operation_and_state() {
        let machine = PlaybackStateMachine::new();
        match machine.transition_to_paused() {
            Err(PlaybackError::InvalidStateFor { action, state }) => {
                assert_eq!(action, "pause");
                assert_eq!(state, PlaybackState::Stopped);
            }
            other => panic!("expected InvalidStateFor, got {other:?}"),
        }
        assert!(machine.resume().is_err());
        assert!(machine.transition_to_finished().is_err());
        // Double play is rejected.
        machine.transition_to_playing().expect("play failed");
        assert!(machine.transition_to_playing().is_err());
    }

    #[test]
    fn seek_is_only_allowed_while_playing_or_paused() {
        let machine = PlaybackStateMachine::new();
        assert!(machine.validate_seek_allowed().is_err());
        machine.transition_to_playing().expect("play failed");
        assert!(machine.validate_seek_allowed().is_ok());
        machine.transition_to_paused().expect("pause failed");
        assert!(machine.validate_seek_allowed().is_ok());
        machine.transition_to_finished().unwrap_err();
        machine.transition_to_stopped();
        assert!(machine.validate_seek_allowed().is_err());
    }

    #[test]
    fn channel_invalid_forces_active_states_to_stopped() {
        let machine = playing();
        machine.handle_channel_invalid();
        assert_eq!(machine.state(), PlaybackState::Stopped);

        let machine = playing();
        machine.transition_to_paused().expect("pause failed");
        machine.handle_channel_invalid();
        assert_eq!(machine.state(), PlaybackState::Stopped);

        // Finished is left untouched.
        let machine = playing();
        machine.transition_to_finished().expect("finish failed");
        machine.handle_channel_invalid();
        assert_eq!(machine.state(), PlaybackState::Finished);
    }

    #[test]
    fn every_pair_outside_the_table_is_rejected() {
        const ALLOWED: [(PlaybackState, PlaybackState); 8] = [
            (PlaybackState::Stopped, PlaybackState::Playing),
            (PlaybackState::Finished, PlaybackState::Playing),
            (PlaybackState::Finished, PlaybackState::Stopped),
            (PlaybackState::Playing, PlaybackState::Paused),
            (PlaybackState::Playing, PlaybackState::Stopped),
            (PlaybackState::Playing, PlaybackState::Finished),
            (PlaybackState::Paused, PlaybackState::Playing),
            (PlaybackState::Paused, PlaybackState::Stopped),
        ];
        // Only the four stable states can be a CAS source; Seeking and Error
        // are never the machine's state.
        let reachable = [
            PlaybackState::Stopped,
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Finished,
        ];
        let all = [
            PlaybackState::Stopped,
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Seeking,
            PlaybackState::Finished,
            PlaybackState::Error,
        ];
        for from in reachable {
            for to in all {
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
    fn compare_and_set_checks_identity_and_legality() {
        let machine = playing();
        // Wrong expected state.
        assert!(!machine.compare_and_set(PlaybackState::Paused, PlaybackState::Playing));
        // Legal transition.
        assert!(machine.compare_and_set(PlaybackState::Playing, PlaybackState::Paused));
        // Illegal target from the current state.
        assert!(!machine.compare_and_set(PlaybackState::Paused, PlaybackState::Finished));
        assert_eq!(machine.state(), PlaybackState::Paused);
    }
}
