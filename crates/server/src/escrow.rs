//! In-memory escrow ledger.
//!
//! Accounts must be funded before they can stake. Deposits move value from
//! the account into escrow; a payout releases escrow to the winner and the
//! manager in one step or not at all.

use std::collections::HashMap;

use jukebox_session::{AccountId, Amount, Ledger, LedgerError, PayoutPlan};

#[derive(Debug, Clone, Default)]
pub struct EscrowLedger {
    balances: HashMap<AccountId, Amount>,
    escrowed: Amount,
    offline: bool,
}

impl EscrowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `account` with `amount` of spendable value.
    pub fn fund(&mut self, account: AccountId, amount: Amount) {
        let balance = self.balances.entry(account).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn balance(&self, account: AccountId) -> Amount {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    /// Value currently held on behalf of the session.
    pub fn escrowed(&self) -> Amount {
        self.escrowed
    }

    /// While offline every request fails with [`LedgerError::Unavailable`].
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    fn ensure_online(&self) -> Result<(), LedgerError> {
        if self.offline {
            Err(LedgerError::Unavailable {
                reason: "escrow offline".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Ledger for EscrowLedger {
    fn deposit(&mut self, from: AccountId, amount: Amount) -> Result<(), LedgerError> {
        self.ensure_online()?;
        let balance = self.balance(from);
        if balance < amount {
            return Err(LedgerError::DepositRejected {
                reason: format!("account {from} holds {balance}, needs {amount}"),
            });
        }
        self.balances.insert(from, balance - amount);
        self.escrowed += amount;
        Ok(())
    }

    fn payout(&mut self, plan: &PayoutPlan) -> Result<(), LedgerError> {
        self.ensure_online()?;
        let total = plan.total();
        if total > self.escrowed {
            return Err(LedgerError::PayoutRejected {
                reason: format!("payout {total} exceeds escrow {}", self.escrowed),
            });
        }
        self.escrowed -= total;
        self.fund(plan.winner, plan.winner_amount);
        self.fund(plan.manager, plan.manager_fee);
        Ok(())
    }
}
