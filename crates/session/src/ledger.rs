//! Ledger collaborator boundary.
//!
//! The session never holds value itself. Stakes are forwarded to the ledger on
//! entry and the settled pot is released through a single [`PayoutPlan`].
//! Implementations MUST be all-or-nothing: an `Err` means no value moved.

use crate::error::LedgerError;
use crate::{AccountId, Amount, BPS_DENOMINATOR};

/// External value custody used by the session.
pub trait Ledger {
    /// Escrow `amount` from `from` on behalf of the session.
    fn deposit(&mut self, from: AccountId, amount: Amount) -> Result<(), LedgerError>;

    /// Release escrowed value according to `plan`.
    fn payout(&mut self, plan: &PayoutPlan) -> Result<(), LedgerError>;
}

impl<L: Ledger + ?Sized> Ledger for &mut L {
    fn deposit(&mut self, from: AccountId, amount: Amount) -> Result<(), LedgerError> {
        (**self).deposit(from, amount)
    }

    fn payout(&mut self, plan: &PayoutPlan) -> Result<(), LedgerError> {
        (**self).payout(plan)
    }
}

impl<L: Ledger + ?Sized> Ledger for Box<L> {
    fn deposit(&mut self, from: AccountId, amount: Amount) -> Result<(), LedgerError> {
        (**self).deposit(from, amount)
    }

    fn payout(&mut self, plan: &PayoutPlan) -> Result<(), LedgerError> {
        (**self).payout(plan)
    }
}

/// Split of a settled pot between the winner and the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutPlan {
    pub winner: AccountId,
    pub winner_amount: Amount,
    pub manager: AccountId,
    pub manager_fee: Amount,
}

impl PayoutPlan {
    /// Build the plan for `pot` with the fee taken in basis points.
    ///
    /// The fee rounds down; any remainder goes to the winner.
    pub fn split(pot: Amount, fee_bps: u16, winner: AccountId, manager: AccountId) -> Self {
        let fee = u128::from(pot) * u128::from(fee_bps) / u128::from(BPS_DENOMINATOR);
        // Clamped so an out-of-range fee_bps hands the whole pot to the manager
        let manager_fee = Amount::try_from(fee).unwrap_or(pot).min(pot);
        Self {
            winner,
            winner_amount: pot - manager_fee,
            manager,
            manager_fee,
        }
    }

    /// Total value released by this plan.
    pub fn total(&self) -> Amount {
        self.winner_amount + self.manager_fee
    }
}

/// Ledger that accepts everything and remembers what it was asked to do.
///
/// Used for replay verification and tests. Setting `reject_payouts` makes
/// every payout fail without recording it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingLedger {
    pub deposits: Vec<(AccountId, Amount)>,
    pub payouts: Vec<PayoutPlan>,
    pub reject_payouts: bool,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all recorded deposits.
    pub fn total_deposited(&self) -> Amount {
        self.deposits
            .iter()
            .fold(0, |total: Amount, &(_, amount)| total.saturating_add(amount))
    }
}

impl Ledger for RecordingLedger {
    fn deposit(&mut self, from: AccountId, amount: Amount) -> Result<(), LedgerError> {
        self.deposits.push((from, amount));
        Ok(())
    }

    fn payout(&mut self, plan: &PayoutPlan) -> Result<(), LedgerError> {
        if self.reject_payouts {
            return Err(LedgerError::PayoutRejected {
                reason: "payouts disabled".to_string(),
            });
        }
        self.payouts.push(plan.clone());
        Ok(())
    }
}
