//! Commitment engine: creates fresh notes.

use alloy::primitives::Address;
use ark_bn254::{Fr, G1Affine};
use ark_ff::PrimeField;
use rand::{rngs::OsRng, CryptoRng, RngCore};
use tracing::debug;

use crate::error::CommitmentError;
use crate::note::{Note, MAX_NOTE_VALUE, VALUE_BITS};

/// Bytes of randomness reduced into one blinding factor. Twice the field
/// size keeps the modular bias negligible.
const BLINDING_ENTROPY: usize = 64;

/// Creates a new note for `owner` holding `value`, with a blinding factor
/// drawn from the operating system's entropy source.
pub fn create(owner: Address, value: u64) -> Result<Note, CommitmentError> {
    create_with_rng(&mut OsRng, owner, value)
}

/// Creates a new note using the supplied cryptographic RNG.
///
/// The note is returned unregistered; recording it is the caller's job.
pub fn create_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
    owner: Address,
    value: u64,
) -> Result<Note, CommitmentError> {
    if value > MAX_NOTE_VALUE {
        return Err(CommitmentError::ValueRange { bits: VALUE_BITS });
    }
    let blinding = random_scalar(rng)?;
    let note = Note::from_opening(owner, value, blinding);
    debug!(commitment = %note.commitment(), %owner, "created note");
    Ok(note)
}

/// Rebuilds a note someone else created from its public point and owner.
pub fn open(point: G1Affine, owner: Address) -> Note {
    Note::watch_only(point, owner)
}

/// Draws a uniformly distributed scalar.
pub(crate) fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Fr, rand::Error> {
    let mut bytes = [0u8; BLINDING_ENTROPY];
    rng.try_fill_bytes(&mut bytes)?;
    Ok(Fr::from_le_bytes_mod_order(&bytes))
}
