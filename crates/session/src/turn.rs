//! Turns: moving the holder slot and accounting held time.
//!
//! Held time is settled into `accumulated_duration` only when the holder
//! changes (or at settlement). [`Session::live_duration`] merges the settled
//! value with the in-progress turn and is the figure callers should display.

use crate::error::{SessionError, StateError, TimingError, ValidationError};
use crate::session::{Holder, Session, SessionState};
use crate::{AccountId, Timestamp};

/// Result of a successful move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    /// Holder that was displaced, with the time credited to them.
    pub outgoing: Option<(AccountId, Timestamp)>,
    pub incoming: AccountId,
    /// Turns the incoming player has left after this one.
    pub remaining_moves: u32,
}

/// Display metadata of the current holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderMetadata {
    pub player: AccountId,
    pub picture_ref: String,
    pub media_ref: String,
}

impl Session {
    /// True iff `player` may take the slot at `now`.
    pub fn can_move(&self, player: AccountId, now: Timestamp) -> bool {
        self.check_move(player, now).is_ok()
    }

    /// Hand the slot to `player` at `now`.
    ///
    /// Credits the outgoing holder with `now - since` before installing the
    /// new holder at the same `now`, then spends one of the mover's turns.
    pub fn move_turn(
        &mut self,
        player: AccountId,
        now: Timestamp,
    ) -> Result<Handoff, SessionError> {
        self.check_move(player, now)?;

        let outgoing = self.flush_holder(now);

        self.holder = Some(Holder { player, since: now });
        let remaining_moves = match self.player_mut(player) {
            Some(mover) => {
                mover.remaining_moves -= 1;
                mover.remaining_moves
            }
            None => 0,
        };

        Ok(Handoff {
            outgoing,
            incoming: player,
            remaining_moves,
        })
    }

    /// Settled plus in-progress held time of `player` at `now`.
    ///
    /// Unknown players have zero duration.
    pub fn live_duration(&self, player: AccountId, now: Timestamp) -> Timestamp {
        let settled = self.accumulated_duration(player);
        match self.holder {
            Some(holder) if holder.player == player => {
                settled.saturating_add(now.saturating_sub(holder.since))
            }
            _ => settled,
        }
    }

    /// Metadata of the current holder, if any.
    pub fn current_holder_metadata(&self) -> Option<HolderMetadata> {
        let holder = self.holder?;
        let player = self.player(holder.player)?;
        Some(HolderMetadata {
            player: player.id,
            picture_ref: player.picture_ref.clone(),
            media_ref: player.media_ref.clone(),
        })
    }

    /// Validate a move, reporting the first violated condition.
    fn check_move(&self, player: AccountId, now: Timestamp) -> Result<(), SessionError> {
        match self.state {
            SessionState::Active => {}
            SessionState::Pending => return Err(StateError::NotStarted.into()),
            SessionState::Ended => return Err(StateError::AlreadyEnded.into()),
        }
        if let Some(ends_at) = self.ends_at()
            && now >= ends_at
        {
            return Err(TimingError::SessionElapsed { ends_at }.into());
        }
        let Some(entry) = self.player(player) else {
            return Err(ValidationError::UnknownPlayer { player }.into());
        };
        if entry.remaining_moves == 0 {
            return Err(ValidationError::NoMovesLeft { player }.into());
        }
        if self.current_holder() == Some(player) {
            return Err(ValidationError::AlreadyHoldingTurn { player }.into());
        }
        Ok(())
    }

    /// Credit the current holder with time held up to `now` and clear the
    /// slot. Returns who was credited and by how much.
    pub(crate) fn flush_holder(&mut self, now: Timestamp) -> Option<(AccountId, Timestamp)> {
        let holder = self.holder.take()?;
        let held = now.saturating_sub(holder.since);
        if let Some(outgoing) = self.player_mut(holder.player) {
            outgoing.accumulated_duration = outgoing.accumulated_duration.saturating_add(held);
        }
        Some((holder.player, held))
    }
}
