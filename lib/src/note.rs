use alloy::primitives::{Address, B256};
use ark_bn254::{Fr, G1Affine};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{keccak256, pedersen_commit, point_to_bytes, to_affine};

/// Width of the note value field in bits.
pub const VALUE_BITS: u32 = 32;

/// Largest value a single note can hold.
pub const MAX_NOTE_VALUE: u64 = (1u64 << VALUE_BITS) - 1;

/// Lifecycle of a note held by the [`crate::store::NoteStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteStatus {
    Unspent,
    /// Claimed as the input of an in-flight join-split.
    PendingSpend,
    Spent,
}

/// Which side of a join-split a note sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteSide {
    Input,
    Output,
}

impl NoteSide {
    pub(crate) fn tag(self) -> u64 {
        match self {
            NoteSide::Input => 0,
            NoteSide::Output => 1,
        }
    }
}

impl fmt::Display for NoteSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteSide::Input => f.write_str("input"),
            NoteSide::Output => f.write_str("output"),
        }
    }
}

/// The secret opening of a note's Pedersen point.
#[derive(Clone, PartialEq, Eq)]
pub struct NoteOpening {
    pub value: u64,
    pub blinding: Fr,
}

/// A confidential note: a commitment to a value owned by an address.
///
/// The Pedersen point hides the value; the 32-byte commitment binds the point
/// to its owner and is the note's public identifier on-chain.
#[derive(Clone, PartialEq, Eq)]
pub struct Note {
    commitment: B256,
    point: G1Affine,
    owner: Address,
    opening: Option<NoteOpening>,
    status: NoteStatus,
}

impl Note {
    /// Assemble a note from its opening. Used by the commitment engine.
    pub(crate) fn from_opening(owner: Address, value: u64, blinding: Fr) -> Self {
        let point = to_affine(pedersen_commit(Fr::from(value), blinding));
        Self {
            commitment: note_commitment(&point, &owner),
            point,
            owner,
            opening: Some(NoteOpening { value, blinding }),
            status: NoteStatus::Unspent,
        }
    }

    /// A note known only by its public data. It can be tracked but not spent.
    pub fn watch_only(point: G1Affine, owner: Address) -> Self {
        Self {
            commitment: note_commitment(&point, &owner),
            point,
            owner,
            opening: None,
            status: NoteStatus::Unspent,
        }
    }

    pub fn commitment(&self) -> B256 {
        self.commitment
    }

    pub fn point(&self) -> &G1Affine {
        &self.point
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn status(&self) -> NoteStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: NoteStatus) {
        self.status = status;
    }

    pub fn opening(&self) -> Option<&NoteOpening> {
        self.opening.as_ref()
    }

    /// The note value, if this party knows the opening.
    pub fn value(&self) -> Option<u64> {
        self.opening.as_ref().map(|o| o.value)
    }

    /// Returns the opening only if it reproduces the note's point.
    pub fn verified_opening(&self) -> Option<&NoteOpening> {
        let opening = self.opening.as_ref()?;
        if opening.value > MAX_NOTE_VALUE {
            return None;
        }
        let point = to_affine(pedersen_commit(Fr::from(opening.value), opening.blinding));
        (point == self.point).then_some(opening)
    }
}

/// Commitment of a note: `keccak256(V.x ‖ V.y ‖ owner)`.
pub fn note_commitment(point: &G1Affine, owner: &Address) -> B256 {
    let mut preimage = Vec::with_capacity(84);
    preimage.extend_from_slice(&point_to_bytes(point));
    preimage.extend_from_slice(owner.as_slice());
    keccak256(preimage)
}

/// Partial representation for display. Values and blinding factors are
/// never printed.
impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Note(commitment: 0x{}..., owner: {})",
            hex::encode(&self.commitment[0..4]),
            self.owner
        )
    }
}

impl fmt::Debug for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Note")
            .field("commitment", &self.commitment)
            .field("owner", &self.owner)
            .field("opening", &self.opening.as_ref().map(|_| "<redacted>"))
            .field("status", &self.status)
            .finish()
    }
}

impl fmt::Debug for NoteOpening {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NoteOpening(<redacted>)")
    }
}
