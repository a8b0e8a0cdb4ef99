//! Entry: admitting players while the session is pending.

use crate::error::{SessionError, StateError, ValidationError};
use crate::ledger::Ledger;
use crate::session::{Player, Session, SessionState};
use crate::{AccountId, Amount};

impl Session {
    /// True iff `player` could enter right now (stake aside).
    pub fn can_enter(&self, player: AccountId) -> bool {
        self.state == SessionState::Pending && !self.is_player(player)
    }

    /// Admit `player` with their metadata, escrowing `stake` on the ledger.
    ///
    /// The deposit happens before the player is appended; if the ledger
    /// rejects it the session is unchanged.
    pub fn enter<L: Ledger + ?Sized>(
        &mut self,
        player: AccountId,
        picture_ref: &str,
        media_ref: &str,
        stake: Amount,
        ledger: &mut L,
    ) -> Result<(), SessionError> {
        match self.state {
            SessionState::Pending => {}
            SessionState::Active => return Err(StateError::AlreadyStarted.into()),
            SessionState::Ended => return Err(StateError::AlreadyEnded.into()),
        }
        if self.is_player(player) {
            return Err(ValidationError::AlreadyEntered { player }.into());
        }
        if stake < self.params.min_stake {
            return Err(ValidationError::InsufficientStake {
                stake,
                minimum: self.params.min_stake,
            }
            .into());
        }

        ledger.deposit(player, stake)?;

        self.pot = self.pot.saturating_add(stake);
        self.players.push(Player {
            id: player,
            picture_ref: picture_ref.to_string(),
            media_ref: media_ref.to_string(),
            remaining_moves: self.params.max_moves_per_player,
            accumulated_duration: 0,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::ledger::{PayoutPlan, RecordingLedger};
    use crate::session::SessionParams;
    use crate::MIN_STAKE;

    const MANAGER: AccountId = 0;

    fn pending() -> Session {
        Session::new(
            MANAGER,
            SessionParams {
                session_duration: 3,
                max_moves_per_player: 2,
                ..Default::default()
            },
        )
        .unwrap()
    }

    struct DownLedger;

    impl Ledger for DownLedger {
        fn deposit(&mut self, _: AccountId, _: Amount) -> Result<(), LedgerError> {
            Err(LedgerError::Unavailable {
                reason: "offline".to_string(),
            })
        }

        fn payout(&mut self, _: &PayoutPlan) -> Result<(), LedgerError> {
            unreachable!("entry never pays out")
        }
    }

    #[test]
    fn test_can_enter_while_pending() {
        let session = pending();
        assert!(session.can_enter(MANAGER));
        assert!(session.can_enter(1));
    }

    #[test]
    fn test_enter_appends_player_and_escrows_stake() {
        let mut session = pending();
        let mut ledger = RecordingLedger::new();

        session
            .enter(1, "pic1", "song1", MIN_STAKE, &mut ledger)
            .unwrap();

        assert_eq!(session.players().len(), 1);
        let player = &session.players()[0];
        assert_eq!(player.id, 1);
        assert_eq!(player.picture_ref, "pic1");
        assert_eq!(player.media_ref, "song1");
        assert_eq!(player.remaining_moves, 2);
        assert_eq!(player.accumulated_duration, 0);
        assert_eq!(ledger.deposits, vec![(1, MIN_STAKE)]);
        assert_eq!(session.pot(), MIN_STAKE);
    }

    #[test]
    fn test_cannot_enter_twice() {
        let mut session = pending();
        let mut ledger = RecordingLedger::new();
        session.enter(1, "pic", "song", MIN_STAKE, &mut ledger).unwrap();

        assert!(!session.can_enter(1));
        let err = session
            .enter(1, "pic", "song", MIN_STAKE, &mut ledger)
            .unwrap_err();
        assert_eq!(err, ValidationError::AlreadyEntered { player: 1 }.into());
        assert_eq!(session.players().len(), 1);
        assert_eq!(ledger.deposits.len(), 1);
    }

    #[test]
    fn test_enter_rejects_insufficient_stake() {
        let mut session = pending();
        let mut ledger = RecordingLedger::new();

        let err = session
            .enter(1, "pic", "song", MIN_STAKE / 10, &mut ledger)
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InsufficientStake {
                stake: MIN_STAKE / 10,
                minimum: MIN_STAKE,
            }
            .into()
        );
        assert!(session.players().is_empty());
        assert!(ledger.deposits.is_empty());
    }

    #[test]
    fn test_cannot_enter_after_start() {
        let mut session = pending();
        let mut ledger = RecordingLedger::new();
        session.start(MANAGER, 0).unwrap();

        assert!(!session.can_enter(1));
        let err = session
            .enter(1, "pic", "song", MIN_STAKE, &mut ledger)
            .unwrap_err();
        assert_eq!(err, StateError::AlreadyStarted.into());
    }

    #[test]
    fn test_cannot_enter_after_settle() {
        let mut session = pending();
        let mut ledger = RecordingLedger::new();
        session.enter(1, "pic", "song", MIN_STAKE, &mut ledger).unwrap();
        session.start(MANAGER, 0).unwrap();
        session.settle(MANAGER, 3, &mut ledger).unwrap();

        assert!(!session.can_enter(2));
        let err = session
            .enter(2, "pic", "song", MIN_STAKE, &mut ledger)
            .unwrap_err();
        assert_eq!(err, StateError::AlreadyEnded.into());
        assert_eq!(session.players().len(), 1);
        assert_eq!(ledger.total_deposited(), MIN_STAKE);
    }

    #[test]
    fn test_rejected_deposit_leaves_session_untouched() {
        let mut session = pending();
        let before = session.clone();

        let err = session
            .enter(1, "pic", "song", MIN_STAKE, &mut DownLedger)
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(session, before);
    }
}
