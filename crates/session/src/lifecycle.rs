//! Lifecycle: starting a round and resetting for the next one.

use crate::error::{SessionError, StateError};
use crate::session::{Session, SessionState};
use crate::{AccountId, Timestamp};

impl Session {
    /// Open the active window at `now`.
    pub fn start(&mut self, caller: AccountId, now: Timestamp) -> Result<(), SessionError> {
        self.require_manager(caller)?;
        if self.state != SessionState::Pending {
            return Err(StateError::AlreadyStarted.into());
        }
        self.state = SessionState::Active;
        self.started_at = Some(now);
        Ok(())
    }

    /// Return to Pending with a new window and turn allowance.
    ///
    /// Allowed from any state. With `clear_players` the roster is emptied;
    /// otherwise every player is re-armed with `max_moves_per_player` turns
    /// and zero held time. Any unpaid pot carries over to the next round.
    pub fn reset(
        &mut self,
        caller: AccountId,
        session_duration: Timestamp,
        max_moves_per_player: u32,
        clear_players: bool,
    ) -> Result<(), SessionError> {
        self.require_manager(caller)?;

        self.holder = None;
        self.winner = None;
        self.started_at = None;
        self.state = SessionState::Pending;
        self.params.session_duration = session_duration;
        self.params.max_moves_per_player = max_moves_per_player;

        if clear_players {
            self.players.clear();
        } else {
            for player in &mut self.players {
                player.remaining_moves = max_moves_per_player;
                player.accumulated_duration = 0;
            }
        }
        Ok(())
    }
}
