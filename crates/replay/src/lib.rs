//! Jukebox Replay
//!
//! Hosts record every accepted operation with the timestamp it was applied
//! at. Because the session core is deterministic, re-applying that stream to
//! the initial record must reproduce the final record bit for bit and the
//! same winner. This crate provides:
//!
//! - `ReplayRecorder`: collects accepted operations during hosting
//! - `verify_replay`: re-executes an artifact and checks its anchors
//! - Artifact content hashing and file I/O

#![deny(unsafe_code)]

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use jukebox_session::{
    AccountId, Operation, Outcome, RecordingLedger, STATE_DIGEST_ALGO_ID, Session, SessionError,
    Timestamp,
};
use jukebox_wire::{
    OperationProto, REPLAY_FORMAT_VERSION, RecordedOperationProto, ReplayArtifact, SessionRecord,
    WireError,
};
use prost::Message;
use sha2::{Digest, Sha256};
use thiserror::Error;

// ============================================================================
// Recorded Operation
// ============================================================================

/// An operation the session accepted, with its application time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOperation {
    pub at: Timestamp,
    pub operation: Operation,
}

impl From<&RecordedOperation> for RecordedOperationProto {
    fn from(r: &RecordedOperation) -> Self {
        Self {
            at: r.at,
            operation: Some(OperationProto::from(&r.operation)),
        }
    }
}

impl TryFrom<RecordedOperationProto> for RecordedOperation {
    type Error = WireError;

    fn try_from(proto: RecordedOperationProto) -> Result<Self, Self::Error> {
        let operation = proto
            .operation
            .ok_or(WireError::MissingField("operation"))?
            .try_into()?;
        Ok(Self {
            at: proto.at,
            operation,
        })
    }
}

// ============================================================================
// Replay Recorder
// ============================================================================

/// Collects the accepted operation stream of a hosted session.
#[derive(Debug, Clone)]
pub struct ReplayRecorder {
    initial_record: SessionRecord,
    operations: Vec<RecordedOperation>,
    last_winner: Option<AccountId>,
}

impl ReplayRecorder {
    /// Start recording from the current state of `session`.
    pub fn new(session: &Session) -> Self {
        Self {
            initial_record: SessionRecord::from(session),
            operations: Vec::new(),
            last_winner: None,
        }
    }

    /// Record an operation that was applied successfully.
    pub fn record(&mut self, at: Timestamp, operation: Operation, outcome: &Outcome) {
        if let Outcome::Settled(settlement) = outcome {
            self.last_winner = settlement.winner;
        }
        self.operations.push(RecordedOperation { at, operation });
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Build the artifact, anchored on the current state of `session`.
    pub fn finalize(&self, session: &Session) -> ReplayArtifact {
        let mut artifact = ReplayArtifact {
            replay_format_version: REPLAY_FORMAT_VERSION,
            state_digest_algo_id: STATE_DIGEST_ALGO_ID.to_string(),
            initial_record: Some(self.initial_record.clone()),
            operations: self.operations.iter().map(Into::into).collect(),
            final_digest: session.state_digest(),
            last_winner: self.last_winner,
            content_sha256: String::new(),
        };
        artifact.content_sha256 = artifact_sha256(&artifact);
        artifact
    }
}

/// Hex SHA-256 of `artifact` encoded with `content_sha256` cleared.
pub fn artifact_sha256(artifact: &ReplayArtifact) -> String {
    let mut unsigned = artifact.clone();
    unsigned.content_sha256.clear();

    let mut hasher = Sha256::new();
    hasher.update(unsigned.encode_to_vec());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Replay Verification
// ============================================================================

/// Replay verification error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("unsupported replay format version {0}")]
    UnsupportedVersion(u32),
    #[error("digest algorithm mismatch: expected {expected}, got {actual}")]
    DigestAlgoMismatch { expected: String, actual: String },
    #[error("content hash mismatch: expected {expected}, got {actual}")]
    ContentHashMismatch { expected: String, actual: String },
    #[error("missing initial record")]
    MissingInitialRecord,
    #[error("invalid initial record: {0}")]
    InvalidInitialRecord(WireError),
    #[error("invalid operation #{index}: {source}")]
    InvalidOperation { index: usize, source: WireError },
    #[error("operation #{index} was rejected on replay: {source}")]
    OperationRejected { index: usize, source: SessionError },
    #[error("final digest mismatch: expected {expected:#x}, got {actual:#x}")]
    FinalDigestMismatch { expected: u64, actual: u64 },
    #[error("winner mismatch: expected {expected:?}, got {actual:?}")]
    WinnerMismatch {
        expected: Option<AccountId>,
        actual: Option<AccountId>,
    },
}

/// Verify that an artifact reproduces its recorded outcome.
///
/// # Verification Steps
/// 1. Check format version, digest algorithm and content hash
/// 2. Decode and validate the initial record
/// 3. Re-apply every operation at its recorded time; each must succeed
/// 4. Assert the final digest and the last winner match
///
/// Returns the replayed session on success.
pub fn verify_replay(artifact: &ReplayArtifact) -> Result<Session, VerifyError> {
    // Step 1: envelope
    if artifact.replay_format_version != REPLAY_FORMAT_VERSION {
        return Err(VerifyError::UnsupportedVersion(
            artifact.replay_format_version,
        ));
    }
    if artifact.state_digest_algo_id != STATE_DIGEST_ALGO_ID {
        return Err(VerifyError::DigestAlgoMismatch {
            expected: STATE_DIGEST_ALGO_ID.to_string(),
            actual: artifact.state_digest_algo_id.clone(),
        });
    }
    let actual_hash = artifact_sha256(artifact);
    if actual_hash != artifact.content_sha256 {
        return Err(VerifyError::ContentHashMismatch {
            expected: artifact.content_sha256.clone(),
            actual: actual_hash,
        });
    }

    // Step 2: initial record
    let record = artifact
        .initial_record
        .clone()
        .ok_or(VerifyError::MissingInitialRecord)?;
    let mut session = Session::try_from(record).map_err(VerifyError::InvalidInitialRecord)?;

    // Step 3: re-apply
    let mut ledger = RecordingLedger::new();
    let mut last_winner = None;
    for (index, proto) in artifact.operations.iter().enumerate() {
        let recorded: RecordedOperation = proto
            .clone()
            .try_into()
            .map_err(|source| VerifyError::InvalidOperation { index, source })?;
        let outcome = session
            .apply(&recorded.operation, recorded.at, &mut ledger)
            .map_err(|source| VerifyError::OperationRejected { index, source })?;
        if let Outcome::Settled(settlement) = outcome {
            last_winner = settlement.winner;
        }
    }

    // Step 4: anchors
    let actual_digest = session.state_digest();
    if actual_digest != artifact.final_digest {
        return Err(VerifyError::FinalDigestMismatch {
            expected: artifact.final_digest,
            actual: actual_digest,
        });
    }
    if last_winner != artifact.last_winner {
        return Err(VerifyError::WinnerMismatch {
            expected: artifact.last_winner,
            actual: last_winner,
        });
    }

    Ok(session)
}

// ============================================================================
// Replay I/O
// ============================================================================

/// Write a replay artifact to a file. Refuses to overwrite.
pub fn write_replay(artifact: &ReplayArtifact, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("Replay artifact already exists at {}", path.display()),
                )
            } else {
                e
            }
        })?;
    file.write_all(&artifact.encode_to_vec())?;

    Ok(())
}

/// Read a replay artifact from a file.
pub fn read_replay(path: &Path) -> io::Result<ReplayArtifact> {
    let data = fs::read(path)?;
    ReplayArtifact::decode(data.as_slice()).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to decode replay: {e}"),
        )
    })
}

// ============================================================================
// Tests
// ============================================================================
