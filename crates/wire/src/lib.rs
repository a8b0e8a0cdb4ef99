//! Jukebox Wire Types
//!
//! This crate defines the Protobuf messages shared by hosts and tooling:
//!
//! - **Session record**: the durable form of a session, written on snapshot
//!   and read back on restart
//! - **Operations**: the five mutations, used as request payloads and as the
//!   entries of a replay log
//! - **Replay artifact**: initial record, timestamped operation stream and
//!   the final anchor used for verification
//!
//! Conversions to and from `jukebox_session` types live here so that the
//! session core stays free of encoding concerns.

#![deny(unsafe_code)]

use jukebox_session::{
    Holder, Operation, Player, RestoreError, Session, SessionParams, SessionParts, SessionState,
};
use prost::Message;
use thiserror::Error;

/// Current version of [`SessionRecord`].
pub const RECORD_FORMAT_VERSION: u32 = 1;

/// Current version of [`ReplayArtifact`].
pub const REPLAY_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Errors
// ============================================================================

/// Failure to turn a wire message back into a session type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("unsupported record format version {0}")]
    UnsupportedVersion(u32),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("unknown session state {0}")]
    UnknownState(i32),
    #[error("value out of range: {0}")]
    OutOfRange(&'static str),
    #[error("holder and holder_since must be set together")]
    HolderMismatch,
    #[error("record digest mismatch: expected {expected:#x}, got {actual:#x}")]
    DigestMismatch { expected: u64, actual: u64 },
    #[error(transparent)]
    Restore(#[from] RestoreError),
}

impl From<prost::DecodeError> for WireError {
    fn from(e: prost::DecodeError) -> Self {
        Self::Decode(e.to_string())
    }
}

// ============================================================================
// Session Record
// ============================================================================

/// Lifecycle state on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SessionStateProto {
    Pending = 0,
    Active = 1,
    Ended = 2,
}

/// Session rules.
#[derive(Clone, PartialEq, Message)]
pub struct SessionParamsProto {
    #[prost(uint64, tag = "1")]
    pub session_duration: u64,

    #[prost(uint32, tag = "2")]
    pub max_moves_per_player: u32,

    #[prost(uint64, tag = "3")]
    pub min_stake: u64,

    /// Wire as u32 for protobuf compatibility; must fit in u16.
    #[prost(uint32, tag = "4")]
    pub manager_fee_bps: u32,
}

/// An admitted player.
#[derive(Clone, PartialEq, Message)]
pub struct PlayerProto {
    #[prost(uint64, tag = "1")]
    pub id: u64,

    #[prost(string, tag = "2")]
    pub picture_ref: String,

    #[prost(string, tag = "3")]
    pub media_ref: String,

    #[prost(uint32, tag = "4")]
    pub remaining_moves: u32,

    #[prost(uint64, tag = "5")]
    pub accumulated_duration: u64,
}

/// Durable form of a whole session.
#[derive(Clone, PartialEq, Message)]
pub struct SessionRecord {
    #[prost(uint32, tag = "1")]
    pub record_format_version: u32,

    #[prost(uint64, tag = "2")]
    pub manager: u64,

    #[prost(enumeration = "SessionStateProto", tag = "3")]
    pub state: i32,

    #[prost(message, optional, tag = "4")]
    pub params: Option<SessionParamsProto>,

    #[prost(uint64, optional, tag = "5")]
    pub started_at: Option<u64>,

    /// Entry order is significant.
    #[prost(message, repeated, tag = "6")]
    pub players: Vec<PlayerProto>,

    #[prost(uint64, optional, tag = "7")]
    pub holder: Option<u64>,

    #[prost(uint64, optional, tag = "8")]
    pub holder_since: Option<u64>,

    #[prost(uint64, optional, tag = "9")]
    pub winner: Option<u64>,

    #[prost(uint64, tag = "10")]
    pub pot: u64,

    /// `Session::state_digest()` at encode time; checked on decode.
    #[prost(uint64, tag = "11")]
    pub digest: u64,
}

impl From<SessionState> for SessionStateProto {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Pending => Self::Pending,
            SessionState::Active => Self::Active,
            SessionState::Ended => Self::Ended,
        }
    }
}

impl From<SessionStateProto> for SessionState {
    fn from(state: SessionStateProto) -> Self {
        match state {
            SessionStateProto::Pending => Self::Pending,
            SessionStateProto::Active => Self::Active,
            SessionStateProto::Ended => Self::Ended,
        }
    }
}

impl From<SessionParams> for SessionParamsProto {
    fn from(p: SessionParams) -> Self {
        Self {
            session_duration: p.session_duration,
            max_moves_per_player: p.max_moves_per_player,
            min_stake: p.min_stake,
            manager_fee_bps: u32::from(p.manager_fee_bps),
        }
    }
}

impl TryFrom<SessionParamsProto> for SessionParams {
    type Error = WireError;

    fn try_from(p: SessionParamsProto) -> Result<Self, Self::Error> {
        Ok(Self {
            session_duration: p.session_duration,
            max_moves_per_player: p.max_moves_per_player,
            min_stake: p.min_stake,
            manager_fee_bps: u16::try_from(p.manager_fee_bps)
                .map_err(|_| WireError::OutOfRange("manager_fee_bps"))?,
        })
    }
}

impl From<&Player> for PlayerProto {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            picture_ref: p.picture_ref.clone(),
            media_ref: p.media_ref.clone(),
            remaining_moves: p.remaining_moves,
            accumulated_duration: p.accumulated_duration,
        }
    }
}

impl From<PlayerProto> for Player {
    fn from(p: PlayerProto) -> Self {
        Self {
            id: p.id,
            picture_ref: p.picture_ref,
            media_ref: p.media_ref,
            remaining_moves: p.remaining_moves,
            accumulated_duration: p.accumulated_duration,
        }
    }
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        let parts = session.to_parts();
        Self {
            record_format_version: RECORD_FORMAT_VERSION,
            manager: parts.manager,
            state: SessionStateProto::from(parts.state) as i32,
            params: Some(parts.params.into()),
            started_at: parts.started_at,
            players: parts.players.iter().map(Into::into).collect(),
            holder: parts.holder.map(|h| h.player),
            holder_since: parts.holder.map(|h| h.since),
            winner: parts.winner,
            pot: parts.pot,
            digest: session.state_digest(),
        }
    }
}

impl TryFrom<SessionRecord> for Session {
    type Error = WireError;

    fn try_from(record: SessionRecord) -> Result<Self, Self::Error> {
        if record.record_format_version != RECORD_FORMAT_VERSION {
            return Err(WireError::UnsupportedVersion(record.record_format_version));
        }
        let state = SessionStateProto::try_from(record.state)
            .map_err(|_| WireError::UnknownState(record.state))?;
        let params = record
            .params
            .ok_or(WireError::MissingField("params"))?
            .try_into()?;
        let holder = match (record.holder, record.holder_since) {
            (Some(player), Some(since)) => Some(Holder { player, since }),
            (None, None) => None,
            _ => return Err(WireError::HolderMismatch),
        };

        let session = Session::restore(SessionParts {
            manager: record.manager,
            state: state.into(),
            params,
            started_at: record.started_at,
            players: record.players.into_iter().map(Into::into).collect(),
            holder,
            winner: record.winner,
            pot: record.pot,
        })?;

        let actual = session.state_digest();
        if actual != record.digest {
            return Err(WireError::DigestMismatch {
                expected: record.digest,
                actual,
            });
        }
        Ok(session)
    }
}

/// Encode a session as record bytes.
pub fn encode_session(session: &Session) -> Vec<u8> {
    SessionRecord::from(session).encode_to_vec()
}

/// Decode record bytes into a validated session.
pub fn decode_session(bytes: &[u8]) -> Result<Session, WireError> {
    SessionRecord::decode(bytes)?.try_into()
}

// ============================================================================
// Operations
// ============================================================================

#[derive(Clone, PartialEq, Message)]
pub struct EnterCmd {
    #[prost(uint64, tag = "1")]
    pub player: u64,

    #[prost(string, tag = "2")]
    pub picture_ref: String,

    #[prost(string, tag = "3")]
    pub media_ref: String,

    #[prost(uint64, tag = "4")]
    pub stake: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct StartCmd {
    #[prost(uint64, tag = "1")]
    pub caller: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct MoveCmd {
    #[prost(uint64, tag = "1")]
    pub player: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct SettleCmd {
    #[prost(uint64, tag = "1")]
    pub caller: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ResetCmd {
    #[prost(uint64, tag = "1")]
    pub caller: u64,

    #[prost(uint64, tag = "2")]
    pub session_duration: u64,

    #[prost(uint32, tag = "3")]
    pub max_moves_per_player: u32,

    #[prost(bool, tag = "4")]
    pub clear_players: bool,
}

/// One mutation request.
#[derive(Clone, PartialEq, Message)]
pub struct OperationProto {
    #[prost(oneof = "operation_proto::Kind", tags = "1, 2, 3, 4, 5")]
    pub kind: Option<operation_proto::Kind>,
}

pub mod operation_proto {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        Enter(super::EnterCmd),
        #[prost(message, tag = "2")]
        Start(super::StartCmd),
        #[prost(message, tag = "3")]
        Move(super::MoveCmd),
        #[prost(message, tag = "4")]
        Settle(super::SettleCmd),
        #[prost(message, tag = "5")]
        Reset(super::ResetCmd),
    }
}

impl From<&Operation> for OperationProto {
    fn from(op: &Operation) -> Self {
        use operation_proto::Kind;

        let kind = match op {
            Operation::Enter {
                player,
                picture_ref,
                media_ref,
                stake,
            } => Kind::Enter(EnterCmd {
                player: *player,
                picture_ref: picture_ref.clone(),
                media_ref: media_ref.clone(),
                stake: *stake,
            }),
            Operation::Start { caller } => Kind::Start(StartCmd { caller: *caller }),
            Operation::Move { player } => Kind::Move(MoveCmd { player: *player }),
            Operation::Settle { caller } => Kind::Settle(SettleCmd { caller: *caller }),
            Operation::Reset {
                caller,
                session_duration,
                max_moves_per_player,
                clear_players,
            } => Kind::Reset(ResetCmd {
                caller: *caller,
                session_duration: *session_duration,
                max_moves_per_player: *max_moves_per_player,
                clear_players: *clear_players,
            }),
        };
        Self { kind: Some(kind) }
    }
}

impl TryFrom<OperationProto> for Operation {
    type Error = WireError;

    fn try_from(proto: OperationProto) -> Result<Self, Self::Error> {
        use operation_proto::Kind;

        Ok(match proto.kind.ok_or(WireError::MissingField("kind"))? {
            Kind::Enter(cmd) => Operation::Enter {
                player: cmd.player,
                picture_ref: cmd.picture_ref,
                media_ref: cmd.media_ref,
                stake: cmd.stake,
            },
            Kind::Start(cmd) => Operation::Start { caller: cmd.caller },
            Kind::Move(cmd) => Operation::Move { player: cmd.player },
            Kind::Settle(cmd) => Operation::Settle { caller: cmd.caller },
            Kind::Reset(cmd) => Operation::Reset {
                caller: cmd.caller,
                session_duration: cmd.session_duration,
                max_moves_per_player: cmd.max_moves_per_player,
                clear_players: cmd.clear_players,
            },
        })
    }
}

// ============================================================================
// Replay Artifact
// ============================================================================

/// An accepted operation and the timestamp it was applied at.
#[derive(Clone, PartialEq, Message)]
pub struct RecordedOperationProto {
    #[prost(uint64, tag = "1")]
    pub at: u64,

    #[prost(message, optional, tag = "2")]
    pub operation: Option<OperationProto>,
}

/// Complete replay artifact for one hosted session.
#[derive(Clone, PartialEq, Message)]
pub struct ReplayArtifact {
    #[prost(uint32, tag = "1")]
    pub replay_format_version: u32,

    /// Digest algorithm identifier (`jukebox_session::STATE_DIGEST_ALGO_ID`).
    #[prost(string, tag = "2")]
    pub state_digest_algo_id: String,

    /// Record at the moment recording began.
    #[prost(message, optional, tag = "3")]
    pub initial_record: Option<SessionRecord>,

    /// Accepted operations in application order.
    #[prost(message, repeated, tag = "4")]
    pub operations: Vec<RecordedOperationProto>,

    /// Digest after the last operation.
    #[prost(uint64, tag = "5")]
    pub final_digest: u64,

    /// Winner of the most recent settlement, if any.
    #[prost(uint64, optional, tag = "6")]
    pub last_winner: Option<u64>,

    /// Hex SHA-256 over the artifact encoded with this field empty.
    #[prost(string, tag = "7")]
    pub content_sha256: String,
}

// ============================================================================
// Tests
// ============================================================================
