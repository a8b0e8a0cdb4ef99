//! Jukebox Session Host
//!
//! The host is the edge around the pure session core. It owns:
//! - Serialization of concurrent callers (one `RwLock` per session)
//! - Clock sampling (once per operation)
//! - The escrow ledger collaborator
//! - Snapshots and replay recording
//! - Structured logging of every accepted and rejected operation
//!
//! The session core never reads a clock, never logs and never touches I/O;
//! everything it needs is passed in by [`SessionHost`].

#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod escrow;
pub mod host;

use std::io;

use jukebox_session::{ParamsError, SessionError};
use jukebox_wire::WireError;
use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, HostConfig};
pub use escrow::EscrowLedger;
pub use host::SessionHost;

/// Errors surfaced by [`SessionHost`].
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid session parameters: {0}")]
    Params(#[from] ParamsError),
    #[error("session record: {0}")]
    Record(#[from] WireError),
    #[error("replay recording is disabled")]
    ReplayDisabled,
    #[error("replay io: {0}")]
    Io(#[from] io::Error),
    #[error("session lock poisoned")]
    LockPoisoned,
    #[error("{0} produced an unexpected outcome")]
    UnexpectedOutcome(&'static str),
}

impl HostError {
    /// The session error behind this failure, if any.
    pub fn session_error(&self) -> Option<&SessionError> {
        match self {
            Self::Session(err) => Some(err),
            _ => None,
        }
    }

    /// True if the same request may succeed when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        self.session_error().is_some_and(SessionError::is_retryable)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jukebox_session::{
        AuthorizationError, MIN_STAKE, SessionState, StateError, TimingError, ValidationError,
    };

    use super::*;

    const MANAGER: u64 = 1;
    const P1: u64 = 10;
    const P2: u64 = 20;

    fn host(record_replay: bool) -> (SessionHost<EscrowLedger>, Arc<ManualClock>) {
        let config = HostConfig {
            manager: MANAGER,
            session_duration: 3,
            max_moves_per_player: 2,
            record_replay,
            ..HostConfig::default()
        };
        let clock = Arc::new(ManualClock::new(0));
        let mut ledger = EscrowLedger::new();
        ledger.fund(P1, MIN_STAKE);
        ledger.fund(P2, MIN_STAKE);
        let host = SessionHost::new(&config, ledger, clock.clone()).unwrap();
        (host, clock)
    }

    #[test]
    fn test_reference_scenario_through_host() {
        let (host, clock) = host(false);
        host.enter(P1, "pic1", "song1", MIN_STAKE).unwrap();
        host.enter(P2, "pic2", "song2", MIN_STAKE).unwrap();
        assert_eq!(host.start(MANAGER).unwrap(), 3);

        host.move_turn(P1).unwrap();
        clock.set(1);
        let handoff = host.move_turn(P2).unwrap();
        assert_eq!(handoff.outgoing, Some((P1, 1)));

        clock.set(3);
        assert_eq!(host.player_duration(P2).unwrap(), 2);
        assert!(host.can_settle().unwrap());

        let settlement = host.settle(MANAGER).unwrap();
        assert_eq!(settlement.winner, Some(P2));
        assert_eq!(host.state().unwrap(), SessionState::Ended);

        let (winner_balance, fee, escrow) = host
            .with_ledger(|l| (l.balance(P2), l.balance(MANAGER), l.escrowed()))
            .unwrap();
        assert_eq!(winner_balance, 16_000_000);
        assert_eq!(fee, 4_000_000);
        assert_eq!(escrow, 0);
    }

    #[test]
    fn test_rejections_surface_typed_errors() {
        let (host, _clock) = host(false);

        let err = host.start(P1).unwrap_err();
        assert!(matches!(
            err.session_error(),
            Some(SessionError::Authorization(AuthorizationError::NotManager { caller: P1 }))
        ));

        let err = host.move_turn(P1).unwrap_err();
        assert!(matches!(
            err.session_error(),
            Some(SessionError::State(StateError::NotStarted))
        ));

        let err = host.enter(P1, "p", "m", MIN_STAKE - 1).unwrap_err();
        assert!(matches!(
            err.session_error(),
            Some(SessionError::Validation(ValidationError::InsufficientStake { .. }))
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unfunded_entry_is_retryable_and_leaves_no_trace() {
        let (host, _clock) = host(false);
        let err = host.enter(99, "p", "m", MIN_STAKE).unwrap_err();
        assert!(err.is_retryable());
        assert!(host.can_enter(99).unwrap());
        assert_eq!(host.session().unwrap().pot(), 0);

        host.with_ledger_mut(|l| l.fund(99, MIN_STAKE)).unwrap();
        host.enter(99, "p", "m", MIN_STAKE).unwrap();
        assert!(!host.can_enter(99).unwrap());
    }

    #[test]
    fn test_settle_blocker_reports_the_reason() {
        let (host, clock) = host(false);
        host.enter(P1, "p", "m", MIN_STAKE).unwrap();
        host.start(MANAGER).unwrap();

        clock.set(2);
        assert!(matches!(
            host.settle_blocker().unwrap(),
            Some(SessionError::Timing(TimingError::SessionNotElapsed { ends_at: 3 }))
        ));
        clock.set(3);
        assert_eq!(host.settle_blocker().unwrap(), None);
    }

    #[test]
    fn test_replay_requires_recording() {
        let (host, _clock) = host(false);
        assert!(matches!(
            host.replay_artifact(),
            Err(HostError::ReplayDisabled)
        ));
    }

    #[test]
    fn test_recorded_replay_verifies() {
        let (host, clock) = host(true);
        host.enter(P1, "p1", "m1", MIN_STAKE).unwrap();
        host.enter(P2, "p2", "m2", MIN_STAKE).unwrap();
        // rejected operations are not recorded
        assert!(host.start(P1).is_err());
        host.start(MANAGER).unwrap();
        host.move_turn(P2).unwrap();
        clock.set(3);
        host.settle(MANAGER).unwrap();

        let artifact = host.replay_artifact().unwrap();
        assert_eq!(artifact.operations.len(), 5);
        assert_eq!(artifact.last_winner, Some(P2));

        let replayed = jukebox_replay::verify_replay(&artifact).unwrap();
        assert_eq!(replayed, host.session().unwrap());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = HostConfig {
            session_duration: 0,
            ..HostConfig::default()
        };
        let result = SessionHost::new(
            &config,
            EscrowLedger::new(),
            Arc::new(ManualClock::new(0)),
        );
        assert!(matches!(
            result,
            Err(HostError::Params(ParamsError::ZeroDuration))
        ));
    }
}
