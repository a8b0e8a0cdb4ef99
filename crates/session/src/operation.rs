//! Mutations as values.
//!
//! Hosts and the replay verifier drive the session through
//! [`Session::apply`], so a recorded operation stream reproduces the same
//! record when re-applied with the same timestamps.

use crate::error::SessionError;
use crate::ledger::Ledger;
use crate::session::Session;
use crate::settlement::Settlement;
use crate::turn::Handoff;
use crate::{AccountId, Amount, Timestamp};

/// A state-changing request against a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Enter {
        player: AccountId,
        picture_ref: String,
        media_ref: String,
        stake: Amount,
    },
    Start {
        caller: AccountId,
    },
    Move {
        player: AccountId,
    },
    Settle {
        caller: AccountId,
    },
    Reset {
        caller: AccountId,
        session_duration: Timestamp,
        max_moves_per_player: u32,
        clear_players: bool,
    },
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Enter { .. } => "enter",
            Self::Start { .. } => "start",
            Self::Move { .. } => "move",
            Self::Settle { .. } => "settle",
            Self::Reset { .. } => "reset",
        }
    }

    /// Identity the operation is performed by.
    pub fn actor(&self) -> AccountId {
        match self {
            Self::Enter { player, .. } | Self::Move { player } => *player,
            Self::Start { caller }
            | Self::Settle { caller }
            | Self::Reset { caller, .. } => *caller,
        }
    }
}

/// What an applied operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Entered,
    Started { ends_at: Timestamp },
    Moved(Handoff),
    Settled(Settlement),
    Reset,
}

impl Session {
    /// Apply `op` at `now`.
    pub fn apply<L: Ledger + ?Sized>(
        &mut self,
        op: &Operation,
        now: Timestamp,
        ledger: &mut L,
    ) -> Result<Outcome, SessionError> {
        match op {
            Operation::Enter {
                player,
                picture_ref,
                media_ref,
                stake,
            } => {
                self.enter(*player, picture_ref, media_ref, *stake, ledger)?;
                Ok(Outcome::Entered)
            }
            Operation::Start { caller } => {
                self.start(*caller, now)?;
                Ok(Outcome::Started {
                    ends_at: now.saturating_add(self.session_duration()),
                })
            }
            Operation::Move { player } => self.move_turn(*player, now).map(Outcome::Moved),
            Operation::Settle { caller } => self.settle(*caller, now, ledger).map(Outcome::Settled),
            Operation::Reset {
                caller,
                session_duration,
                max_moves_per_player,
                clear_players,
            } => {
                self.reset(*caller, *session_duration, *max_moves_per_player, *clear_players)?;
                Ok(Outcome::Reset)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::RecordingLedger;
    use crate::session::{SessionParams, SessionState};
    use crate::MIN_STAKE;

    fn enter(player: AccountId) -> Operation {
        Operation::Enter {
            player,
            picture_ref: format!("pic{player}"),
            media_ref: format!("song{player}"),
            stake: MIN_STAKE,
        }
    }

    #[test]
    fn test_apply_runs_full_round() {
        let mut session = Session::new(
            0,
            SessionParams {
                session_duration: 3,
                max_moves_per_player: 2,
                ..Default::default()
            },
        )
        .unwrap();
        let mut ledger = RecordingLedger::new();

        let script = [
            (0, enter(1)),
            (0, enter(2)),
            (0, Operation::Start { caller: 0 }),
            (0, Operation::Move { player: 1 }),
            (1, Operation::Move { player: 2 }),
            (3, Operation::Settle { caller: 0 }),
        ];

        let mut outcomes = Vec::new();
        for (now, op) in &script {
            outcomes.push(session.apply(op, *now, &mut ledger).unwrap());
        }

        assert_eq!(outcomes[2], Outcome::Started { ends_at: 3 });
        assert!(matches!(
            outcomes[4],
            Outcome::Moved(Handoff {
                outgoing: Some((1, 1)),
                ..
            })
        ));
        let Outcome::Settled(settlement) = &outcomes[5] else {
            panic!("expected settlement, got {:?}", outcomes[5]);
        };
        assert_eq!(settlement.winner, Some(2));
        assert_eq!(session.state(), SessionState::Ended);
    }

    #[test]
    fn test_apply_propagates_rejection() {
        let mut session = Session::new(0, SessionParams::default()).unwrap();
        let mut ledger = RecordingLedger::new();
        let err = session
            .apply(&Operation::Start { caller: 5 }, 0, &mut ledger)
            .unwrap_err();
        assert_eq!(err.category(), "authorization");
    }

    #[test]
    fn test_operation_actor_and_kind() {
        assert_eq!(enter(4).actor(), 4);
        assert_eq!(enter(4).kind(), "enter");
        let reset = Operation::Reset {
            caller: 9,
            session_duration: 1,
            max_moves_per_player: 1,
            clear_players: true,
        };
        assert_eq!(reset.actor(), 9);
        assert_eq!(reset.kind(), "reset");
    }
}
