//! Jukebox Session Core
//!
//! This crate contains the deterministic state machine for a single Jukebox
//! session: players stake to enter, take turns holding the shared "playing"
//! slot, accrue held time while they occupy it, and once the session window
//! elapses the manager settles the pot to the player with the most held time.
//!
//! # Architecture Constraints
//!
//! The Session Core MUST NOT:
//! - Perform I/O operations (file, network, etc.)
//! - Read wall-clock time
//! - Use randomness
//! - Log
//!
//! Every operation receives the caller identity and the current timestamp as
//! explicit arguments. Value movement is requested through the [`Ledger`]
//! trait, which the host supplies.
//!
//! # Responsibilities
//!
//! - Entry (`entry`): admission while the session is pending
//! - Turns (`turn`): holder transfer and duration accounting
//! - Settlement (`settlement`): expiry detection, winner selection, payout
//! - Lifecycle (`lifecycle`): start and reset

#![deny(unsafe_code)]

pub mod entry;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod operation;
pub mod session;
pub mod settlement;
pub mod turn;

// ============================================================================
// Type Aliases
// ============================================================================

/// Identity of a participant or of the session manager.
pub type AccountId = u64;

/// A point on the shared logical clock, in whole seconds.
///
/// Also used for spans of time (session window, held durations).
pub type Timestamp = u64;

/// Value unit moved through the ledger.
pub type Amount = u64;

// ============================================================================
// Parameters
// ============================================================================

/// Default length of the active window.
pub const DEFAULT_SESSION_DURATION: Timestamp = 300;

/// Default number of turns each player may take per round.
pub const DEFAULT_MAX_MOVES_PER_PLAYER: u32 = 2;

/// Minimum stake accepted on entry (0.01 of a 1e9-unit coin).
pub const MIN_STAKE: Amount = 10_000_000;

/// Manager fee in basis points of the pot.
pub const DEFAULT_MANAGER_FEE_BPS: u16 = 2_000;

/// Fee ceiling: the winner must always receive the majority of the pot.
pub const MAX_MANAGER_FEE_BPS: u16 = 4_999;

/// Basis-point denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

pub use error::{
    AuthorizationError, LedgerError, ParamsError, RestoreError, SessionError, StateError,
    TimingError, ValidationError,
};
pub use ledger::{Ledger, PayoutPlan, RecordingLedger};
pub use operation::{Operation, Outcome};
pub use session::{
    Holder, Player, STATE_DIGEST_ALGO_ID, Session, SessionParams, SessionParts, SessionState,
};
pub use settlement::Settlement;
pub use turn::{Handoff, HolderMetadata};
