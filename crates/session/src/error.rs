//! Error taxonomy for session operations.
//!
//! Every rejection is detected before the record is touched, so an `Err`
//! from any operation means the session is unchanged. [`LedgerError`] is the
//! only retryable failure.

use thiserror::Error;

use crate::{AccountId, Amount, Timestamp};

/// Caller lacks the rights for a privileged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("caller {caller} is not the session manager")]
    NotManager { caller: AccountId },
}

/// Operation is not allowed in the current lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("session has already started")]
    AlreadyStarted,
    #[error("session has not started")]
    NotStarted,
    #[error("session has already ended")]
    AlreadyEnded,
    #[error("session is not settleable")]
    NotSettleable,
}

/// Operation arguments conflict with the session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("stake {stake} is below the minimum of {minimum}")]
    InsufficientStake { stake: Amount, minimum: Amount },
    #[error("player {player} has already entered")]
    AlreadyEntered { player: AccountId },
    #[error("player {player} is not in this session")]
    UnknownPlayer { player: AccountId },
    #[error("player {player} has no moves left")]
    NoMovesLeft { player: AccountId },
    #[error("player {player} is already holding the turn")]
    AlreadyHoldingTurn { player: AccountId },
}

/// Operation is on the wrong side of the session window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimingError {
    #[error("session window elapsed at {ends_at}")]
    SessionElapsed { ends_at: Timestamp },
    #[error("session window runs until {ends_at}")]
    SessionNotElapsed { ends_at: Timestamp },
}

/// Failure reported by the external ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("deposit rejected: {reason}")]
    DepositRejected { reason: String },
    #[error("payout rejected: {reason}")]
    PayoutRejected { reason: String },
    #[error("ledger unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Any failure of a session operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("authorization: {0}")]
    Authorization(#[from] AuthorizationError),
    #[error("state: {0}")]
    State(#[from] StateError),
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("timing: {0}")]
    Timing(#[from] TimingError),
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
}

impl SessionError {
    /// True when resubmitting the same operation may succeed without any
    /// other change to the session.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Ledger(_))
    }

    /// Stable category label for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Authorization(_) => "authorization",
            Self::State(_) => "state",
            Self::Validation(_) => "validation",
            Self::Timing(_) => "timing",
            Self::Ledger(_) => "ledger",
        }
    }
}

/// Invalid session parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("session duration must be positive")]
    ZeroDuration,
    #[error("manager fee {bps} bps leaves the winner without a majority (max {max})")]
    FeeTooHigh { bps: u16, max: u16 },
}

/// A session record that violates the record invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error("duplicate player {player}")]
    DuplicatePlayer { player: AccountId },
    #[error("holder {player} is not a player")]
    UnknownHolder { player: AccountId },
    #[error("winner {player} is not a player")]
    UnknownWinner { player: AccountId },
    #[error("inconsistent record: {reason}")]
    Inconsistent { reason: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_ledger_errors_are_retryable() {
        let ledger: SessionError = LedgerError::Unavailable {
            reason: "down".to_string(),
        }
        .into();
        assert!(ledger.is_retryable());

        let rejected: SessionError = StateError::NotSettleable.into();
        assert!(!rejected.is_retryable());

        let unauthorized: SessionError = AuthorizationError::NotManager { caller: 7 }.into();
        assert!(!unauthorized.is_retryable());
    }

    #[test]
    fn test_error_display_names_category_and_detail() {
        let err: SessionError = ValidationError::InsufficientStake {
            stake: 1,
            minimum: 10,
        }
        .into();
        assert_eq!(err.category(), "validation");
        assert_eq!(
            err.to_string(),
            "validation: stake 1 is below the minimum of 10"
        );
    }
}
