//! Concurrent session host.
//!
//! One `RwLock` guards the session, its ledger and the replay recorder.
//! Mutations run under the write lock, queries under the read lock. Every call
//! samples the clock exactly once, after acquiring the lock, so serialized
//! writers observe non-decreasing time.

use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use jukebox_replay::{ReplayRecorder, write_replay};
use jukebox_session::{
    AccountId, Amount, Handoff, HolderMetadata, Ledger, Operation, Outcome, Session, SessionError,
    SessionState, Settlement, Timestamp,
};
use jukebox_wire::{ReplayArtifact, decode_session, encode_session};
use tracing::{debug, info, warn};

use crate::HostError;
use crate::clock::Clock;
use crate::config::HostConfig;

struct Hosted<L> {
    session: Session,
    ledger: L,
    recorder: Option<ReplayRecorder>,
}

/// A single session shared between concurrent callers.
pub struct SessionHost<L> {
    inner: RwLock<Hosted<L>>,
    clock: Arc<dyn Clock>,
}

impl<L: Ledger> SessionHost<L> {
    /// Host a fresh session built from `config`.
    pub fn new(config: &HostConfig, ledger: L, clock: Arc<dyn Clock>) -> Result<Self, HostError> {
        let session = Session::new(config.manager, config.session_params())?;
        info!(
            manager = config.manager,
            session_duration = config.session_duration,
            max_moves_per_player = config.max_moves_per_player,
            "session created"
        );
        Ok(Self::with_session(session, ledger, clock, config.record_replay))
    }

    /// Host a session decoded from snapshot bytes.
    ///
    /// Recording, if enabled, starts from the restored state.
    pub fn restore(
        bytes: &[u8],
        ledger: L,
        clock: Arc<dyn Clock>,
        record_replay: bool,
    ) -> Result<Self, HostError> {
        let session = decode_session(bytes)?;
        info!(
            state = %session.state(),
            players = session.players().len(),
            pot = session.pot(),
            "session restored"
        );
        Ok(Self::with_session(session, ledger, clock, record_replay))
    }

    fn with_session(
        session: Session,
        ledger: L,
        clock: Arc<dyn Clock>,
        record_replay: bool,
    ) -> Self {
        let recorder = record_replay.then(|| ReplayRecorder::new(&session));
        Self {
            inner: RwLock::new(Hosted {
                session,
                ledger,
                recorder,
            }),
            clock,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Hosted<L>>, HostError> {
        self.inner.read().map_err(|_| HostError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Hosted<L>>, HostError> {
        self.inner.write().map_err(|_| HostError::LockPoisoned)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Apply one operation at the current clock reading.
    pub fn execute(&self, op: Operation) -> Result<Outcome, HostError> {
        let mut guard = self.write()?;
        let now = self.clock.now();
        let hosted = &mut *guard;

        match hosted.session.apply(&op, now, &mut hosted.ledger) {
            Ok(outcome) => {
                log_applied(&op, &outcome, now);
                if let Some(recorder) = hosted.recorder.as_mut() {
                    recorder.record(now, op, &outcome);
                }
                Ok(outcome)
            }
            Err(err) => {
                log_rejected(&op, &err, now);
                Err(err.into())
            }
        }
    }

    pub fn enter(
        &self,
        player: AccountId,
        picture_ref: &str,
        media_ref: &str,
        stake: Amount,
    ) -> Result<(), HostError> {
        self.execute(Operation::Enter {
            player,
            picture_ref: picture_ref.to_string(),
            media_ref: media_ref.to_string(),
            stake,
        })
        .map(|_| ())
    }

    /// Start the session; returns when it ends.
    pub fn start(&self, caller: AccountId) -> Result<Timestamp, HostError> {
        match self.execute(Operation::Start { caller })? {
            Outcome::Started { ends_at } => Ok(ends_at),
            _ => Err(HostError::UnexpectedOutcome("start")),
        }
    }

    pub fn move_turn(&self, player: AccountId) -> Result<Handoff, HostError> {
        match self.execute(Operation::Move { player })? {
            Outcome::Moved(handoff) => Ok(handoff),
            _ => Err(HostError::UnexpectedOutcome("move")),
        }
    }

    pub fn settle(&self, caller: AccountId) -> Result<Settlement, HostError> {
        match self.execute(Operation::Settle { caller })? {
            Outcome::Settled(settlement) => Ok(settlement),
            _ => Err(HostError::UnexpectedOutcome("settle")),
        }
    }

    pub fn reset(
        &self,
        caller: AccountId,
        session_duration: Timestamp,
        max_moves_per_player: u32,
        clear_players: bool,
    ) -> Result<(), HostError> {
        self.execute(Operation::Reset {
            caller,
            session_duration,
            max_moves_per_player,
            clear_players,
        })
        .map(|_| ())
    }

    /// Mutable access to the ledger, e.g. for funding accounts.
    pub fn with_ledger_mut<R>(&self, f: impl FnOnce(&mut L) -> R) -> Result<R, HostError> {
        Ok(f(&mut self.write()?.ledger))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn can_enter(&self, player: AccountId) -> Result<bool, HostError> {
        Ok(self.read()?.session.can_enter(player))
    }

    pub fn can_move(&self, player: AccountId) -> Result<bool, HostError> {
        let guard = self.read()?;
        Ok(guard.session.can_move(player, self.clock.now()))
    }

    /// Live holding duration of `player`, including any open interval.
    pub fn player_duration(&self, player: AccountId) -> Result<Timestamp, HostError> {
        let guard = self.read()?;
        Ok(guard.session.live_duration(player, self.clock.now()))
    }

    pub fn can_settle(&self) -> Result<bool, HostError> {
        let guard = self.read()?;
        Ok(guard.session.can_settle(self.clock.now()))
    }

    /// Why settling would fail right now, if it would.
    pub fn settle_blocker(&self) -> Result<Option<SessionError>, HostError> {
        let guard = self.read()?;
        Ok(guard.session.settle_blocker(self.clock.now()))
    }

    pub fn current_holder_metadata(&self) -> Result<Option<HolderMetadata>, HostError> {
        Ok(self.read()?.session.current_holder_metadata())
    }

    pub fn state(&self) -> Result<SessionState, HostError> {
        Ok(self.read()?.session.state())
    }

    pub fn winner(&self) -> Result<Option<AccountId>, HostError> {
        Ok(self.read()?.session.winner())
    }

    /// Copy of the hosted session.
    pub fn session(&self) -> Result<Session, HostError> {
        Ok(self.read()?.session.clone())
    }

    /// Read access to the ledger.
    pub fn with_ledger<R>(&self, f: impl FnOnce(&L) -> R) -> Result<R, HostError> {
        Ok(f(&self.read()?.ledger))
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Encoded session record, suitable for [`SessionHost::restore`].
    pub fn snapshot(&self) -> Result<Vec<u8>, HostError> {
        Ok(encode_session(&self.read()?.session))
    }

    /// Replay artifact covering every operation applied since recording began.
    pub fn replay_artifact(&self) -> Result<ReplayArtifact, HostError> {
        let guard = self.read()?;
        let recorder = guard.recorder.as_ref().ok_or(HostError::ReplayDisabled)?;
        Ok(recorder.finalize(&guard.session))
    }

    /// Write the replay artifact to `path`. Existing files are never replaced.
    pub fn write_replay(&self, path: &Path) -> Result<(), HostError> {
        let artifact = self.replay_artifact()?;
        write_replay(&artifact, path)?;
        info!(
            path = %path.display(),
            operations = artifact.operations.len(),
            "replay written"
        );
        Ok(())
    }
}

fn log_applied(op: &Operation, outcome: &Outcome, now: Timestamp) {
    match outcome {
        Outcome::Entered => info!(op = op.kind(), player = op.actor(), "player entered"),
        Outcome::Started { ends_at } => info!(now, ends_at, "session started"),
        Outcome::Moved(handoff) => info!(
            now,
            player = handoff.incoming,
            outgoing = ?handoff.outgoing,
            remaining_moves = handoff.remaining_moves,
            "turn moved"
        ),
        Outcome::Settled(settlement) => info!(
            now,
            winner = ?settlement.winner,
            payout = ?settlement.payout,
            "session settled"
        ),
        Outcome::Reset => info!(caller = op.actor(), "session reset"),
    }
}

fn log_rejected(op: &Operation, err: &SessionError, now: Timestamp) {
    if err.is_retryable() {
        warn!(
            op = op.kind(),
            actor = op.actor(),
            now,
            error = %err,
            "ledger failure, operation rolled back"
        );
    } else {
        debug!(
            op = op.kind(),
            actor = op.actor(),
            now,
            category = err.category(),
            error = %err,
            "operation rejected"
        );
    }
}
