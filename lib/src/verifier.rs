//! Join-split verification.
//!
//! Performs the checks the on-chain verifier contract runs before a
//! join-split is accepted. Used by ledgers and by tests; the prover never
//! needs it.

use alloy::primitives::Address;
use ark_bn254::G1Affine;
use tracing::debug;

use crate::crypto::GENERATOR_H;
use crate::error::VerifyError;
use crate::note::{note_commitment, Note, NoteSide};
use crate::proof::{
    balance_challenge, balance_statement, first_duplicate, NoteProof, ProofData, PublicInputs,
};

/// What a successful verification reveals.
#[derive(Debug, Clone)]
pub struct VerifiedJoinSplit {
    /// Owner of each input note, in input order. Each must sign the proof.
    pub input_owners: Vec<Address>,
    /// The created notes, known by their public data only.
    pub output_notes: Vec<Note>,
}

/// Verify `proof_data` against the public inputs.
///
/// # Arguments
/// * `public` - Commitments, public owner and value of the join-split
/// * `proof_data` - Proof bytes as produced by the builder
///
/// # Returns
/// * The input owners and output notes on success
pub fn verify_join_split(
    public: &PublicInputs,
    proof_data: &[u8],
) -> Result<VerifiedJoinSplit, VerifyError> {
    if public.note_count() == 0 {
        return Err(VerifyError::Empty);
    }
    if let Some((side, index)) =
        first_duplicate(&public.input_commitments, &public.output_commitments)
    {
        return Err(VerifyError::DuplicateNote { side, index });
    }
    let data = ProofData::read(
        proof_data,
        public.input_commitments.len(),
        public.output_commitments.len(),
    )?;
    let transcript = public.transcript();

    let sides = [
        (NoteSide::Input, &data.inputs, &public.input_commitments),
        (NoteSide::Output, &data.outputs, &public.output_commitments),
    ];
    // Every commitment is checked before any range proof.
    for (side, notes, commitments) in sides {
        for (index, (note, commitment)) in notes.iter().zip(commitments).enumerate() {
            if note_commitment(&note.point, &note.owner) != *commitment {
                return Err(VerifyError::CommitmentMismatch { side, index });
            }
        }
    }
    for (side, notes, _) in sides {
        for (index, note) in notes.iter().enumerate() {
            if !note.range.verify(&transcript, side, index, &note.point) {
                return Err(VerifyError::RangeProof { side, index });
            }
        }
    }

    let points = |notes: &[NoteProof]| notes.iter().map(|n| n.point).collect::<Vec<G1Affine>>();
    let statement = balance_statement(
        &points(data.inputs.as_slice()),
        &points(data.outputs.as_slice()),
        public.public_value,
    );
    let challenge = balance_challenge(&transcript, &statement, &data.balance.nonce);
    let lhs = *GENERATOR_H * data.balance.response;
    let rhs = statement * challenge + data.balance.nonce;
    if lhs != rhs {
        return Err(VerifyError::Balance);
    }

    debug!(
        inputs = data.inputs.len(),
        outputs = data.outputs.len(),
        "join-split verified"
    );
    Ok(VerifiedJoinSplit {
        input_owners: data.inputs.iter().map(|n| n.owner).collect(),
        output_notes: data
            .outputs
            .iter()
            .map(|n| Note::watch_only(n.point, n.owner))
            .collect(),
    })
}
