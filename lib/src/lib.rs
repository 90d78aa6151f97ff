//! Confidential join-split transaction engine.
//!
//! Notes are Pedersen commitments on BN254 G1 bound to an owner address.
//! A join-split consumes input notes and creates output notes, optionally
//! moving value to or from a public ERC-20 balance, and carries a proof that
//! values balance and stay in range. Input owners authorise the spend with
//! EIP-712 signatures over the proof hash, and the whole package is ABI
//! encoded for the zk asset contract.

pub mod abi;
pub mod commitment;
pub mod config;
pub mod crypto;
pub mod error;
pub mod note;
pub mod proof;
pub mod range;
pub mod signature;
pub mod store;
pub mod submission;
pub mod transfer;
pub mod verifier;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use note::{Note, NoteSide, NoteStatus, MAX_NOTE_VALUE, VALUE_BITS};
pub use proof::{JoinSplitBuilder, JoinSplitProof, ProofStatus, PublicInputs};
pub use signature::SpendSignature;
pub use store::NoteStore;
pub use submission::{SubmissionClient, TransactionHandle, TxOutcome};
pub use transfer::{JoinSplitEngine, PendingTransfer, PreparedTransfer};
pub use verifier::{verify_join_split, VerifiedJoinSplit};
