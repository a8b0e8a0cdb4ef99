//! The session record shared by entry, turns, settlement and lifecycle.

use crate::error::{AuthorizationError, ParamsError, RestoreError};
use crate::{
    AccountId, Amount, DEFAULT_MANAGER_FEE_BPS, DEFAULT_MAX_MOVES_PER_PLAYER,
    DEFAULT_SESSION_DURATION, MAX_MANAGER_FEE_BPS, MIN_STAKE, Timestamp,
};

// ============================================================================
// Parameters
// ============================================================================

/// Tunable rules of a session.
///
/// `session_duration` and `max_moves_per_player` are replaced on reset;
/// `min_stake` and `manager_fee_bps` are fixed for the life of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub session_duration: Timestamp,
    pub max_moves_per_player: u32,
    pub min_stake: Amount,
    pub manager_fee_bps: u16,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            session_duration: DEFAULT_SESSION_DURATION,
            max_moves_per_player: DEFAULT_MAX_MOVES_PER_PLAYER,
            min_stake: MIN_STAKE,
            manager_fee_bps: DEFAULT_MANAGER_FEE_BPS,
        }
    }
}

impl SessionParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.session_duration == 0 {
            return Err(ParamsError::ZeroDuration);
        }
        self.validate_fixed()
    }

    /// Checks only the fields that `reset` cannot change.
    pub(crate) fn validate_fixed(&self) -> Result<(), ParamsError> {
        if self.manager_fee_bps > MAX_MANAGER_FEE_BPS {
            return Err(ParamsError::FeeTooHigh {
                bps: self.manager_fee_bps,
                max: MAX_MANAGER_FEE_BPS,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Record Types
// ============================================================================

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Pending,
    Active,
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Active => 1,
            Self::Ended => 2,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An admitted participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: AccountId,
    pub picture_ref: String,
    pub media_ref: String,
    /// Turns left this round. Only decreases, except on reset.
    pub remaining_moves: u32,
    /// Settled held time. Excludes the in-progress turn.
    pub accumulated_duration: Timestamp,
}

/// The player currently occupying the slot and when they took it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Holder {
    pub player: AccountId,
    pub since: Timestamp,
}

/// Plain view of every field of a session, used for persistence.
///
/// [`Session::restore`] re-checks the record invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParts {
    pub manager: AccountId,
    pub state: SessionState,
    pub params: SessionParams,
    pub started_at: Option<Timestamp>,
    pub players: Vec<Player>,
    pub holder: Option<Holder>,
    pub winner: Option<AccountId>,
    pub pot: Amount,
}

// ============================================================================
// Session
// ============================================================================

/// One Jukebox round and everything needed to run the next.
///
/// Mutated only through `enter`, `start`, `move_turn`, `settle` and `reset`;
/// each either applies fully or returns an error leaving the record as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub(crate) manager: AccountId,
    pub(crate) state: SessionState,
    pub(crate) params: SessionParams,
    pub(crate) started_at: Option<Timestamp>,
    /// Entry order, used as the settlement tie-break.
    pub(crate) players: Vec<Player>,
    pub(crate) holder: Option<Holder>,
    pub(crate) winner: Option<AccountId>,
    /// Stakes escrowed since the last payout.
    pub(crate) pot: Amount,
}

impl Session {
    /// Create a pending session owned by `manager`.
    pub fn new(manager: AccountId, params: SessionParams) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self {
            manager,
            state: SessionState::Pending,
            params,
            started_at: None,
            players: Vec::new(),
            holder: None,
            winner: None,
            pot: 0,
        })
    }

    /// Rebuild a session from persisted parts.
    pub fn restore(parts: SessionParts) -> Result<Self, RestoreError> {
        parts.params.validate_fixed()?;

        for (i, player) in parts.players.iter().enumerate() {
            if parts.players[..i].iter().any(|p| p.id == player.id) {
                return Err(RestoreError::DuplicatePlayer { player: player.id });
            }
        }
        let is_player = |id: AccountId| parts.players.iter().any(|p| p.id == id);

        match (parts.state, parts.started_at) {
            (SessionState::Pending, Some(_)) => {
                return Err(RestoreError::Inconsistent {
                    reason: "pending session has a start time",
                });
            }
            (SessionState::Active | SessionState::Ended, None) => {
                return Err(RestoreError::Inconsistent {
                    reason: "started session has no start time",
                });
            }
            _ => {}
        }

        if let Some(holder) = parts.holder {
            if parts.state != SessionState::Active {
                return Err(RestoreError::Inconsistent {
                    reason: "holder outside the active state",
                });
            }
            if !is_player(holder.player) {
                return Err(RestoreError::UnknownHolder {
                    player: holder.player,
                });
            }
        }

        if let Some(winner) = parts.winner {
            if parts.state != SessionState::Ended {
                return Err(RestoreError::Inconsistent {
                    reason: "winner outside the ended state",
                });
            }
            if !is_player(winner) {
                return Err(RestoreError::UnknownWinner { player: winner });
            }
        }

        Ok(Self {
            manager: parts.manager,
            state: parts.state,
            params: parts.params,
            started_at: parts.started_at,
            players: parts.players,
            holder: parts.holder,
            winner: parts.winner,
            pot: parts.pot,
        })
    }

    /// Copy every field out for persistence.
    pub fn to_parts(&self) -> SessionParts {
        SessionParts {
            manager: self.manager,
            state: self.state,
            params: self.params,
            started_at: self.started_at,
            players: self.players.clone(),
            holder: self.holder,
            winner: self.winner,
            pot: self.pot,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn manager(&self) -> AccountId {
        self.manager
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn session_duration(&self) -> Timestamp {
        self.params.session_duration
    }

    pub fn max_moves_per_player(&self) -> u32 {
        self.params.max_moves_per_player
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.started_at
    }

    /// End of the active window, once started.
    pub fn ends_at(&self) -> Option<Timestamp> {
        self.started_at
            .map(|start| start.saturating_add(self.params.session_duration))
    }

    /// Players in entry order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: AccountId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn is_player(&self, id: AccountId) -> bool {
        self.player(id).is_some()
    }

    /// Remaining turns for `id`; 0 for non-players.
    pub fn remaining_moves(&self, id: AccountId) -> u32 {
        self.player(id).map_or(0, |p| p.remaining_moves)
    }

    /// Settled held time for `id`; 0 for non-players.
    pub fn accumulated_duration(&self, id: AccountId) -> Timestamp {
        self.player(id).map_or(0, |p| p.accumulated_duration)
    }

    pub fn holder(&self) -> Option<Holder> {
        self.holder
    }

    pub fn current_holder(&self) -> Option<AccountId> {
        self.holder.map(|h| h.player)
    }

    pub fn winner(&self) -> Option<AccountId> {
        self.winner
    }

    /// Value escrowed for this round and not yet paid out.
    pub fn pot(&self) -> Amount {
        self.pot
    }

    pub(crate) fn require_manager(&self, caller: AccountId) -> Result<(), AuthorizationError> {
        if caller == self.manager {
            Ok(())
        } else {
            Err(AuthorizationError::NotManager { caller })
        }
    }

    pub(crate) fn player_mut(&mut self, id: AccountId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// True once `now` has reached the end of the active window.
    pub(crate) fn window_elapsed(&self, now: Timestamp) -> bool {
        self.ends_at().is_some_and(|end| now >= end)
    }

    // ------------------------------------------------------------------------
    // State Digest
    // ------------------------------------------------------------------------

    /// Deterministic digest of the whole record.
    ///
    /// Algorithm: FNV-1a 64-bit over little-endian fields, players in entry
    /// order, strings length-prefixed, optionals tagged with a presence byte.
    pub fn state_digest(&self) -> u64 {
        let mut hasher = Fnv1a64::new();

        hasher.update(&self.manager.to_le_bytes());
        hasher.update(&[self.state.tag()]);
        hasher.update(&self.params.session_duration.to_le_bytes());
        hasher.update(&self.params.max_moves_per_player.to_le_bytes());
        hasher.update(&self.params.min_stake.to_le_bytes());
        hasher.update(&self.params.manager_fee_bps.to_le_bytes());
        hasher.update_optional(self.started_at);

        hasher.update(&(self.players.len() as u64).to_le_bytes());
        for player in &self.players {
            hasher.update(&player.id.to_le_bytes());
            hasher.update_str(&player.picture_ref);
            hasher.update_str(&player.media_ref);
            hasher.update(&player.remaining_moves.to_le_bytes());
            hasher.update(&player.accumulated_duration.to_le_bytes());
        }

        hasher.update_optional(self.holder.map(|h| h.player));
        hasher.update_optional(self.holder.map(|h| h.since));
        hasher.update_optional(self.winner);
        hasher.update(&self.pot.to_le_bytes());

        hasher.finish()
    }
}

/// Digest algorithm identifier recorded in replay artifacts.
pub const STATE_DIGEST_ALGO_ID: &str = "sessiondigest-v1-fnv1a64-le-entryorder";

const FNV1A_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV1A_PRIME: u64 = 0x100000001b3;

#[derive(Debug, Clone)]
struct Fnv1a64 {
    state: u64,
}

impl Fnv1a64 {
    fn new() -> Self {
        Self {
            state: FNV1A_OFFSET_BASIS,
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u64::from(byte);
            self.state = self.state.wrapping_mul(FNV1A_PRIME);
        }
    }

    fn update_str(&mut self, s: &str) {
        self.update(&(s.len() as u64).to_le_bytes());
        self.update(s.as_bytes());
    }

    fn update_optional(&mut self, value: Option<u64>) {
        match value {
            Some(v) => {
                self.update(&[1]);
                self.update(&v.to_le_bytes());
            }
            None => self.update(&[0]),
        }
    }

    fn finish(self) -> u64 {
        self.state
    }
}
