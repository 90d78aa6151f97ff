//! Error taxonomy for the join-split engine.
//!
//! Every component has its own error enum; [`Error`] gathers them for callers
//! that drive a whole transfer. None of the messages carry note values or
//! blinding factors.

use alloy::primitives::B256;
use thiserror::Error;

use crate::note::{NoteSide, NoteStatus};
use crate::proof::ProofStatus;

/// Errors raised while creating a note.
#[derive(Debug, Error)]
pub enum CommitmentError {
    /// The value does not fit the protocol's value field.
    #[error("note value exceeds the {bits}-bit value field")]
    ValueRange { bits: u32 },

    /// The random source could not provide a blinding factor.
    #[error("insufficient entropy for blinding factor: {0}")]
    Entropy(#[from] rand::Error),
}

/// Errors raised by the join-split proof builder.
#[derive(Debug, Error)]
pub enum ProofError {
    /// An input note is not spendable by the prover, or an output note has no
    /// valid opening.
    #[error("opening unknown or note not spendable for {side} note {index}")]
    UnknownOpening { side: NoteSide, index: usize },

    /// Inputs, outputs and public value do not balance.
    #[error("join-split does not balance")]
    BalanceMismatch,

    /// A transaction with neither inputs nor outputs.
    #[error("join-split has no notes")]
    EmptyTransaction,

    /// Too many notes on one side of the join-split.
    #[error("{side} notes exceed the limit of {max}")]
    TooManyNotes { side: NoteSide, max: usize },

    /// A commitment appears more than once in the join-split.
    #[error("{side} note {index} repeats an earlier note")]
    DuplicateNote { side: NoteSide, index: usize },

    /// The random source failed while drawing proof nonces.
    #[error("insufficient entropy for proof nonces: {0}")]
    Entropy(#[from] rand::Error),

    /// Illegal lifecycle move of a proof.
    #[error("proof cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: ProofStatus, to: ProofStatus },
}

/// Errors raised when producing or checking spend authorisations.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// One signing key is required per input note.
    #[error("expected {expected} signing keys, got {actual}")]
    SignatureCountMismatch { expected: usize, actual: usize },

    /// Signing key at `index` does not own input note `index`.
    #[error("signing key {index} does not own the matching input note")]
    SignerMismatch { index: usize },

    /// The underlying signer failed.
    #[error("signer failure: {0}")]
    Signer(#[from] alloy::signers::Error),

    /// The signature does not recover a valid key.
    #[error("signature recovery failed: {0}")]
    Recovery(#[from] alloy::primitives::SignatureError),

    /// The signature is bound to another proof, contract or signer.
    #[error("signature does not authorise proof {proof_hash}")]
    Invalid { proof_hash: B256 },
}

/// Errors raised by the ABI encoder.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// A field does not fit the width the verifier expects.
    #[error("{field} exceeds its {width} field width")]
    FieldWidth { field: &'static str, width: &'static str },

    /// ABI decoding failed.
    #[error("abi decoding failed: {0}")]
    Decode(#[from] alloy_sol_types::Error),

    /// Proof data has the wrong shape.
    #[error("malformed proof data: {0}")]
    Malformed(&'static str),
}

/// Errors raised by the note store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("note {0} not found")]
    NotFound(B256),

    #[error("note {0} already recorded")]
    AlreadyRecorded(B256),

    /// Another transaction holds, or already spent, the note.
    #[error("note {0} is already claimed")]
    AlreadyClaimed(B256),

    #[error("note {commitment} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        commitment: B256,
        from: NoteStatus,
        to: NoteStatus,
    },

    #[error("store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store format: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store record for {0} is corrupt")]
    Corrupt(B256),
}

/// Reasons a verifier rejects a join-split.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("proof data: {0}")]
    Encoding(#[from] EncodingError),

    #[error("{side} commitment {index} does not match its point and owner")]
    CommitmentMismatch { side: NoteSide, index: usize },

    #[error("range proof for {side} note {index} failed")]
    RangeProof { side: NoteSide, index: usize },

    #[error("{side} note {index} repeats an earlier note")]
    DuplicateNote { side: NoteSide, index: usize },

    #[error("balance proof failed")]
    Balance,

    #[error("join-split has no notes")]
    Empty,
}

/// Errors surfaced by a [`crate::submission::SubmissionClient`].
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The ledger reverted the transaction.
    #[error("transaction reverted: {reason}")]
    Reverted { reason: String },

    /// The client refused the request before it reached the ledger.
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The confirmation channel closed before an outcome arrived.
    #[error("confirmation channel closed")]
    Dropped,
}

/// Any error the engine can produce.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Commitment(#[from] CommitmentError),
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
