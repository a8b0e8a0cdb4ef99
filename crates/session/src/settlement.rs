//! Settlement: expiry, winner selection and payout.
//!
//! Settlement is two-phase. The outcome is computed from live durations
//! without touching the record, the payout is submitted to the ledger, and
//! only if the ledger accepts is the outcome committed. A rejected payout
//! leaves the session Active with no winner so the manager can retry.

use crate::error::{SessionError, StateError, TimingError};
use crate::ledger::{Ledger, PayoutPlan};
use crate::session::{Session, SessionState};
use crate::{AccountId, Timestamp};

/// Committed result of a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// `None` only when the session had no players.
    pub winner: Option<AccountId>,
    /// Final held time per player, in entry order.
    pub standings: Vec<(AccountId, Timestamp)>,
    /// Payout submitted to the ledger; `None` when there was nothing to pay.
    pub payout: Option<PayoutPlan>,
}

/// Player with the most held time; ties go to the earliest entrant.
pub fn select_winner(standings: &[(AccountId, Timestamp)]) -> Option<AccountId> {
    let mut best: Option<(AccountId, Timestamp)> = None;
    for &(player, duration) in standings {
        match best {
            Some((_, top)) if duration <= top => {}
            _ => best = Some((player, duration)),
        }
    }
    best.map(|(player, _)| player)
}

impl Session {
    /// True iff the session is Active, its window has elapsed at `now`, and
    /// no winner has been chosen.
    pub fn can_settle(&self, now: Timestamp) -> bool {
        self.settle_blocker(now).is_none()
    }

    /// Why settlement is not possible at `now`, or `None` if it is.
    pub fn settle_blocker(&self, now: Timestamp) -> Option<SessionError> {
        match self.state {
            SessionState::Pending => return Some(StateError::NotStarted.into()),
            SessionState::Ended => return Some(StateError::AlreadyEnded.into()),
            SessionState::Active => {}
        }
        if self.winner.is_some() {
            return Some(StateError::AlreadyEnded.into());
        }
        match self.ends_at() {
            Some(ends_at) if now < ends_at => {
                Some(TimingError::SessionNotElapsed { ends_at }.into())
            }
            Some(_) => None,
            None => Some(StateError::NotStarted.into()),
        }
    }

    /// Close the round at `now`: pick the winner and pay out the pot.
    pub fn settle<L: Ledger + ?Sized>(
        &mut self,
        caller: AccountId,
        now: Timestamp,
        ledger: &mut L,
    ) -> Result<Settlement, SessionError> {
        self.require_manager(caller)?;
        if !self.can_settle(now) {
            return Err(StateError::NotSettleable.into());
        }

        // Phase 1: compute without mutating
        let settlement = self.plan_settlement(now);

        // Phase 2: external payout; an error here aborts before any commit
        if let Some(plan) = &settlement.payout {
            ledger.payout(plan)?;
        }

        // Phase 3: commit
        self.flush_holder(now);
        debug_assert!(
            settlement
                .standings
                .iter()
                .all(|&(player, duration)| self.accumulated_duration(player) == duration),
            "committed durations must match the planned standings"
        );
        self.winner = settlement.winner;
        self.state = SessionState::Ended;
        if settlement.payout.is_some() {
            self.pot = 0;
        }

        Ok(settlement)
    }

    fn plan_settlement(&self, now: Timestamp) -> Settlement {
        let standings: Vec<(AccountId, Timestamp)> = self
            .players
            .iter()
            .map(|p| (p.id, self.live_duration(p.id, now)))
            .collect();
        let winner = select_winner(&standings);
        let payout = winner.filter(|_| self.pot > 0).map(|winner| {
            PayoutPlan::split(self.pot, self.params.manager_fee_bps, winner, self.manager)
        });

        Settlement {
            winner,
            standings,
            payout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthorizationError;
    use crate::ledger::RecordingLedger;
    use crate::session::SessionParams;
    use crate::MIN_STAKE;

    const MANAGER: AccountId = 0;
    const P1: AccountId = 1;
    const P2: AccountId = 2;
    const P3: AccountId = 3;

    fn started_with(players: &[AccountId]) -> (Session, RecordingLedger) {
        let mut session = Session::new(
            MANAGER,
            SessionParams {
                session_duration: 3,
                max_moves_per_player: 2,
                ..Default::default()
            },
        )
        .unwrap();
        let mut ledger = RecordingLedger::new();
        for &p in players {
            session
                .enter(p, &format!("pic{p}"), &format!("song{p}"), MIN_STAKE, &mut ledger)
                .unwrap();
        }
        session.start(MANAGER, 0).unwrap();
        (session, ledger)
    }

    #[test]
    fn test_select_winner_prefers_longest_then_earliest() {
        assert_eq!(select_winner(&[]), None);
        assert_eq!(select_winner(&[(P1, 1), (P2, 2)]), Some(P2));
        assert_eq!(select_winner(&[(P1, 2), (P2, 2), (P3, 1)]), Some(P1));
        assert_eq!(select_winner(&[(P3, 0), (P1, 0)]), Some(P3));
    }

    #[test]
    fn test_cannot_settle_before_start() {
        let session = Session::new(MANAGER, SessionParams::default()).unwrap();
        assert!(!session.can_settle(1_000));
        assert_eq!(
            session.settle_blocker(1_000),
            Some(StateError::NotStarted.into())
        );
    }

    #[test]
    fn test_can_settle_exactly_at_window_end() {
        let (session, _) = started_with(&[P1, P2]);
        assert!(!session.can_settle(0));
        assert!(!session.can_settle(2));
        assert_eq!(
            session.settle_blocker(2),
            Some(TimingError::SessionNotElapsed { ends_at: 3 }.into())
        );
        assert!(session.can_settle(3));
        assert!(session.can_settle(4));
    }

    #[test]
    fn test_settle_restricted_to_manager() {
        let (mut session, mut ledger) = started_with(&[P1, P2]);
        let err = session.settle(P1, 4, &mut ledger).unwrap_err();
        assert_eq!(err, AuthorizationError::NotManager { caller: P1 }.into());
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_settle_before_window_end_is_rejected() {
        let (mut session, mut ledger) = started_with(&[P1, P2]);
        let err = session.settle(MANAGER, 2, &mut ledger).unwrap_err();
        assert_eq!(err, StateError::NotSettleable.into());
        assert!(ledger.payouts.is_empty());
    }

    /// Duration 3: P1 holds 0..1, P2 holds 1..3, P2 wins 2 to 1.
    #[test]
    fn test_settle_flushes_last_turn_and_picks_longest_holder() {
        let (mut session, mut ledger) = started_with(&[P1, P2]);
        session.move_turn(P1, 0).unwrap();
        session.move_turn(P2, 1).unwrap();

        assert!(session.can_settle(3));
        let settlement = session.settle(MANAGER, 3, &mut ledger).unwrap();

        assert_eq!(settlement.winner, Some(P2));
        assert_eq!(settlement.standings, vec![(P1, 1), (P2, 2)]);
        assert_eq!(session.winner(), Some(P2));
        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.accumulated_duration(P1), 1);
        assert_eq!(session.accumulated_duration(P2), 2);
        assert_eq!(session.current_holder(), None);
        assert!(!session.can_settle(3));
    }

    #[test]
    fn test_settle_pays_winner_and_manager_fee() {
        let (mut session, mut ledger) = started_with(&[P1, P2]);
        session.move_turn(P1, 0).unwrap();
        session.move_turn(P2, 1).unwrap();

        session.settle(MANAGER, 4, &mut ledger).unwrap();

        assert_eq!(
            ledger.payouts,
            vec![PayoutPlan {
                winner: P2,
                winner_amount: 16_000_000,
                manager: MANAGER,
                manager_fee: 4_000_000,
            }]
        );
        assert_eq!(session.pot(), 0);
    }

    #[test]
    fn test_tie_goes_to_earliest_entrant() {
        let (mut session, mut ledger) = started_with(&[P1, P2, P3]);
        session.move_turn(P2, 0).unwrap();
        session.move_turn(P1, 1).unwrap();
        session.move_turn(P3, 2).unwrap();

        // All three held for exactly one unit
        let settlement = session.settle(MANAGER, 3, &mut ledger).unwrap();
        assert_eq!(settlement.standings, vec![(P1, 1), (P2, 1), (P3, 1)]);
        assert_eq!(settlement.winner, Some(P1));
    }

    #[test]
    fn test_no_moves_first_entrant_wins() {
        let (mut session, mut ledger) = started_with(&[P2, P1]);
        let settlement = session.settle(MANAGER, 3, &mut ledger).unwrap();
        assert_eq!(settlement.winner, Some(P2));
    }

    #[test]
    fn test_settle_without_players_ends_without_payout() {
        let (mut session, mut ledger) = started_with(&[]);
        let settlement = session.settle(MANAGER, 3, &mut ledger).unwrap();
        assert_eq!(settlement.winner, None);
        assert_eq!(settlement.payout, None);
        assert!(ledger.payouts.is_empty());
        assert_eq!(session.state(), SessionState::Ended);
    }

    #[test]
    fn test_rejected_payout_rolls_back_settlement() {
        let (mut session, mut ledger) = started_with(&[P1, P2]);
        session.move_turn(P1, 0).unwrap();
        let before = session.clone();

        ledger.reject_payouts = true;
        let err = session.settle(MANAGER, 3, &mut ledger).unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(session, before);
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.winner(), None);
        assert!(session.can_settle(3));

        // Retry succeeds once the ledger recovers
        ledger.reject_payouts = false;
        let settlement = session.settle(MANAGER, 5, &mut ledger).unwrap();
        assert_eq!(settlement.winner, Some(P1));
        assert_eq!(session.accumulated_duration(P1), 5);
        assert_eq!(ledger.payouts.len(), 1);
    }

    #[test]
    fn test_settle_is_exactly_once() {
        let (mut session, mut ledger) = started_with(&[P1]);
        session.settle(MANAGER, 3, &mut ledger).unwrap();
        let err = session.settle(MANAGER, 4, &mut ledger).unwrap_err();
        assert_eq!(err, StateError::NotSettleable.into());
        assert_eq!(ledger.payouts.len(), 1);
        assert!(!session.can_settle(4));
        assert_eq!(
            session.settle_blocker(4),
            Some(StateError::AlreadyEnded.into())
        );
    }
}
