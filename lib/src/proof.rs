//! Join-split proof construction.
//!
//! A join-split consumes input notes and creates output notes, moving
//! `public_value` between the shielded pool and a public balance. The proof
//! shows, without revealing any note value, that
//!
//! `sum(inputs) = sum(outputs) + public_value`
//!
//! and that every note value lies in `[0, 2^VALUE_BITS)`.
//!
//! Proof data layout (all fixed width, big-endian):
//!
//! ```text
//! per input note:   point (64) ‖ owner (20) ‖ range proof
//! per output note:  point (64) ‖ owner (20) ‖ range proof
//! balance proof:    nonce point (64) ‖ response scalar (32)
//! ```

use std::collections::HashSet;

use alloy::primitives::{Address, Bytes, B256};
use ark_bn254::{Fr, G1Affine};
use ark_ff::Zero;
use rand::{rngs::OsRng, CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::abi;
use crate::commitment::random_scalar;
use crate::crypto::{
    keccak256, point_from_bytes, point_to_bytes, scalar_from_bytes, scalar_to_bytes,
    signed_scalar, sum_points, to_affine, Transcript, GENERATOR_G, GENERATOR_H, POINT_LENGTH,
    SCALAR_LENGTH,
};
use crate::error::{EncodingError, ProofError};
use crate::note::{Note, NoteOpening, NoteSide, NoteStatus};
use crate::range::{RangeProof, RANGE_PROOF_LENGTH};
use crate::signature::SpendSignature;

/// Domain separator of the join-split transcript
pub const PROOF_DOMAIN: &[u8] = b"zkasset.join-split.v1";

/// Encoded length of one note's section of the proof data
pub const NOTE_PROOF_LENGTH: usize = POINT_LENGTH + ADDRESS_LENGTH + RANGE_PROOF_LENGTH;

/// Encoded length of the balance proof
pub const BALANCE_PROOF_LENGTH: usize = POINT_LENGTH + SCALAR_LENGTH;

const ADDRESS_LENGTH: usize = 20;

/// Lifecycle of a join-split proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofStatus {
    Built,
    Signed,
    Submitted,
    Confirmed,
    Reverted,
}

/// The public statement of a join-split, as the verifier contract sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicInputs {
    pub input_commitments: Vec<B256>,
    pub output_commitments: Vec<B256>,
    /// Account debited or credited with `public_value`
    pub public_owner: Address,
    /// Negative for a deposit, positive for a withdrawal
    pub public_value: i64,
    pub proof_owner: Address,
}

impl PublicInputs {
    pub fn note_count(&self) -> usize {
        self.input_commitments.len() + self.output_commitments.len()
    }

    /// Base transcript every sub-proof of this join-split derives from.
    pub(crate) fn transcript(&self) -> Transcript {
        let mut transcript = Transcript::new(PROOF_DOMAIN);
        transcript.append_bytes(b"public-inputs", &abi::encode_public_inputs(self));
        transcript
    }
}

/// Hash the signatures authorise: `keccak256(abi(public inputs) ‖ proof_data)`.
pub fn proof_hash(public: &PublicInputs, proof_data: &[u8]) -> B256 {
    let mut preimage = abi::encode_public_inputs(public);
    preimage.extend_from_slice(proof_data);
    keccak256(preimage)
}

/// Public part of one note in the proof data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NoteProof {
    pub point: G1Affine,
    pub owner: Address,
    pub range: RangeProof,
}

/// Schnorr proof of knowledge of `δ` with `statement = δ·H`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BalanceProof {
    pub nonce: G1Affine,
    pub response: Fr,
}

/// Decoded proof data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProofData {
    pub inputs: Vec<NoteProof>,
    pub outputs: Vec<NoteProof>,
    pub balance: BalanceProof,
}

impl ProofData {
    pub fn to_bytes(&self) -> Vec<u8> {
        let notes = self.inputs.len() + self.outputs.len();
        let mut out = Vec::with_capacity(notes * NOTE_PROOF_LENGTH + BALANCE_PROOF_LENGTH);
        for note in self.inputs.iter().chain(&self.outputs) {
            out.extend_from_slice(&point_to_bytes(&note.point));
            out.extend_from_slice(note.owner.as_slice());
            note.range.write(&mut out);
        }
        out.extend_from_slice(&point_to_bytes(&self.balance.nonce));
        out.extend_from_slice(&scalar_to_bytes(&self.balance.response));
        out
    }

    /// Parse proof data for a join-split with the given note counts.
    pub fn read(bytes: &[u8], inputs: usize, outputs: usize) -> Result<Self, EncodingError> {
        let expected = (inputs + outputs) * NOTE_PROOF_LENGTH + BALANCE_PROOF_LENGTH;
        if bytes.len() != expected {
            return Err(EncodingError::Malformed("proof data length"));
        }

        let mut notes = bytes
            .chunks_exact(NOTE_PROOF_LENGTH)
            .take(inputs + outputs)
            .map(|chunk| {
                let (point, rest) = chunk.split_at(POINT_LENGTH);
                let (owner, range) = rest.split_at(ADDRESS_LENGTH);
                Ok(NoteProof {
                    point: point_from_bytes(point)?,
                    owner: Address::from_slice(owner),
                    range: RangeProof::read(range)?,
                })
            })
            .collect::<Result<Vec<_>, EncodingError>>()?;
        let outputs = notes.split_off(inputs);

        let balance = &bytes[expected - BALANCE_PROOF_LENGTH..];
        let (nonce, response) = balance.split_at(POINT_LENGTH);
        Ok(Self {
            inputs: notes,
            outputs,
            balance: BalanceProof {
                nonce: point_from_bytes(nonce)?,
                response: scalar_from_bytes(response)?,
            },
        })
    }
}

/// First commitment that repeats an earlier one, inputs before outputs.
pub(crate) fn first_duplicate(inputs: &[B256], outputs: &[B256]) -> Option<(NoteSide, usize)> {
    let mut seen = HashSet::with_capacity(inputs.len() + outputs.len());
    let sides = [(NoteSide::Input, inputs), (NoteSide::Output, outputs)];
    sides.into_iter().find_map(|(side, commitments)| {
        commitments
            .iter()
            .position(|commitment| !seen.insert(*commitment))
            .map(|index| (side, index))
    })
}

/// The point the balance proof is about: `ΣV_in − ΣV_out − public_value·G`.
///
/// When the join-split balances this equals `δ·H` where `δ` is the difference
/// of the blinding sums.
pub(crate) fn balance_statement(
    inputs: &[G1Affine],
    outputs: &[G1Affine],
    public_value: i64,
) -> G1Affine {
    let public = *GENERATOR_G * signed_scalar(i128::from(public_value));
    to_affine(sum_points(inputs) - sum_points(outputs) - public)
}

pub(crate) fn balance_challenge(base: &Transcript, statement: &G1Affine, nonce: &G1Affine) -> Fr {
    let mut transcript = base.clone();
    transcript.append_point(b"balance-statement", statement);
    transcript.append_point(b"balance-nonce", nonce);
    transcript.challenge_scalar(b"balance-challenge")
}

/// A built join-split and its lifecycle state.
#[derive(Debug, Clone)]
pub struct JoinSplitProof {
    input_notes: Vec<Note>,
    output_notes: Vec<Note>,
    public: PublicInputs,
    proof_hash: B256,
    proof_data: Bytes,
    signatures: Vec<SpendSignature>,
    status: ProofStatus,
}

impl JoinSplitProof {
    pub fn input_notes(&self) -> &[Note] {
        &self.input_notes
    }

    pub fn output_notes(&self) -> &[Note] {
        &self.output_notes
    }

    pub fn public_inputs(&self) -> &PublicInputs {
        &self.public
    }

    pub fn public_owner(&self) -> Address {
        self.public.public_owner
    }

    pub fn public_value(&self) -> i64 {
        self.public.public_value
    }

    pub fn proof_owner(&self) -> Address {
        self.public.proof_owner
    }

    pub fn proof_hash(&self) -> B256 {
        self.proof_hash
    }

    pub fn proof_data(&self) -> &Bytes {
        &self.proof_data
    }

    pub fn signatures(&self) -> &[SpendSignature] {
        &self.signatures
    }

    pub fn status(&self) -> ProofStatus {
        self.status
    }

    /// Built → Signed.
    pub fn attach_signatures(&mut self, signatures: Vec<SpendSignature>) -> Result<(), ProofError> {
        self.advance(ProofStatus::Built, ProofStatus::Signed)?;
        self.signatures = signatures;
        Ok(())
    }

    /// Signed → Submitted.
    pub fn mark_submitted(&mut self) -> Result<(), ProofError> {
        self.advance(ProofStatus::Signed, ProofStatus::Submitted)
    }

    /// Submitted → Confirmed.
    pub fn mark_confirmed(&mut self) -> Result<(), ProofError> {
        self.advance(ProofStatus::Submitted, ProofStatus::Confirmed)
    }

    /// Submitted → Reverted.
    pub fn mark_reverted(&mut self) -> Result<(), ProofError> {
        self.advance(ProofStatus::Submitted, ProofStatus::Reverted)
    }

    fn advance(&mut self, from: ProofStatus, to: ProofStatus) -> Result<(), ProofError> {
        if self.status != from {
            return Err(ProofError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        debug!(proof_hash = %self.proof_hash, ?to, "proof status changed");
        self.status = to;
        Ok(())
    }
}

/// Builds join-split proofs.
#[derive(Debug, Clone, Copy)]
pub struct JoinSplitBuilder {
    max_notes: usize,
}

impl JoinSplitBuilder {
    /// # Arguments
    /// * `max_notes` - Largest number of notes allowed on either side
    pub fn new(max_notes: usize) -> Self {
        Self { max_notes }
    }

    /// Build a join-split proof with nonces from the operating system.
    ///
    /// # Arguments
    /// * `inputs` - Unspent notes to consume, with their openings
    /// * `outputs` - Fresh notes to create, with their openings
    /// * `public_owner` - Account whose public balance moves
    /// * `public_value` - Negative to deposit, positive to withdraw
    /// * `proof_owner` - Account allowed to submit the proof
    ///
    /// # Returns
    /// * A proof in the `Built` state
    pub fn build(
        &self,
        inputs: &[Note],
        outputs: &[Note],
        public_owner: Address,
        public_value: i64,
        proof_owner: Address,
    ) -> Result<JoinSplitProof, ProofError> {
        self.build_with_rng(&mut OsRng, inputs, outputs, public_owner, public_value, proof_owner)
    }

    pub fn build_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        inputs: &[Note],
        outputs: &[Note],
        public_owner: Address,
        public_value: i64,
        proof_owner: Address,
    ) -> Result<JoinSplitProof, ProofError> {
        if inputs.is_empty() && outputs.is_empty() {
            return Err(ProofError::EmptyTransaction);
        }
        for (side, notes) in [(NoteSide::Input, inputs), (NoteSide::Output, outputs)] {
            if notes.len() > self.max_notes {
                return Err(ProofError::TooManyNotes {
                    side,
                    max: self.max_notes,
                });
            }
        }

        let input_commitments: Vec<B256> = inputs.iter().map(Note::commitment).collect();
        let output_commitments: Vec<B256> = outputs.iter().map(Note::commitment).collect();
        if let Some((side, index)) = first_duplicate(&input_commitments, &output_commitments) {
            return Err(ProofError::DuplicateNote { side, index });
        }

        let input_openings = inputs
            .iter()
            .enumerate()
            .map(|(index, note)| {
                note.verified_opening()
                    .filter(|_| note.status() == NoteStatus::Unspent)
                    .ok_or(ProofError::UnknownOpening {
                        side: NoteSide::Input,
                        index,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let output_openings = outputs
            .iter()
            .enumerate()
            .map(|(index, note)| {
                note.verified_opening().ok_or(ProofError::UnknownOpening {
                    side: NoteSide::Output,
                    index,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let sum_in: i128 = input_openings.iter().map(|o| i128::from(o.value)).sum();
        let sum_out: i128 = output_openings.iter().map(|o| i128::from(o.value)).sum();
        if sum_in != sum_out + i128::from(public_value) {
            return Err(ProofError::BalanceMismatch);
        }

        let public = PublicInputs {
            input_commitments,
            output_commitments,
            public_owner,
            public_value,
            proof_owner,
        };
        let transcript = public.transcript();

        let mut note_proofs = |side: NoteSide, notes: &[Note], openings: &[&NoteOpening]| {
            notes
                .iter()
                .zip(openings)
                .enumerate()
                .map(|(index, (note, opening))| {
                    let range = RangeProof::prove(
                        &mut *rng,
                        &transcript,
                        side,
                        index,
                        opening.value,
                        opening.blinding,
                    )?;
                    Ok::<_, ProofError>(NoteProof {
                        point: *note.point(),
                        owner: note.owner(),
                        range,
                    })
                })
                .collect::<Result<Vec<_>, ProofError>>()
        };
        let input_proofs = note_proofs(NoteSide::Input, inputs, &input_openings)?;
        let output_proofs = note_proofs(NoteSide::Output, outputs, &output_openings)?;

        let blinding_in = input_openings.iter().fold(Fr::zero(), |acc, o| acc + o.blinding);
        let blinding_out = output_openings.iter().fold(Fr::zero(), |acc, o| acc + o.blinding);
        let delta = blinding_in - blinding_out;

        let input_points: Vec<G1Affine> = inputs.iter().map(|n| *n.point()).collect();
        let output_points: Vec<G1Affine> = outputs.iter().map(|n| *n.point()).collect();
        let statement = balance_statement(&input_points, &output_points, public_value);

        let k = random_scalar(rng)?;
        let nonce = to_affine(*GENERATOR_H * k);
        let challenge = balance_challenge(&transcript, &statement, &nonce);
        let balance = BalanceProof {
            nonce,
            response: k + challenge * delta,
        };

        let proof_data = ProofData {
            inputs: input_proofs,
            outputs: output_proofs,
            balance,
        }
        .to_bytes();
        let proof_hash = proof_hash(&public, &proof_data);

        info!(
            %proof_hash,
            inputs = inputs.len(),
            outputs = outputs.len(),
            public_value,
            "built join-split proof"
        );

        Ok(JoinSplitProof {
            input_notes: inputs.to_vec(),
            output_notes: outputs.to_vec(),
            public,
            proof_hash,
            proof_data: Bytes::from(proof_data),
            signatures: Vec::new(),
            status: ProofStatus::Built,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment;
    use crate::verifier::verify_join_split;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    const MAX_NOTES: usize = 4;

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }

    fn bob() -> Address {
        Address::repeat_byte(0xb0)
    }

    fn builder() -> JoinSplitBuilder {
        JoinSplitBuilder::new(MAX_NOTES)
    }

    fn note(owner: Address, value: u64) -> Note {
        commitment::create(owner, value).unwrap()
    }

    #[test]
    fn test_deposit_builds() {
        let output = note(bob(), 100);
        let proof = builder().build(&[], &[output], bob(), -100, bob()).unwrap();
        assert_eq!(proof.status(), ProofStatus::Built);
        assert!(proof.input_notes().is_empty());
        assert_eq!(proof.public_value(), -100);
        verify_join_split(proof.public_inputs(), proof.proof_data()).unwrap();
    }

    #[test]
    fn test_split_builds() {
        let input = note(bob(), 100);
        let outputs = [note(bob(), 20), note(alice(), 80), note(bob(), 0)];
        let proof = builder().build(&[input], &outputs, bob(), 0, bob()).unwrap();
        assert_eq!(proof.output_notes().len(), 3);
        verify_join_split(proof.public_inputs(), proof.proof_data()).unwrap();
    }

    #[test]
    fn test_withdraw_builds() {
        let input = note(alice(), 80);
        let change = note(alice(), 70);
        let proof = builder().build(&[input], &[change], alice(), 10, alice()).unwrap();
        verify_join_split(proof.public_inputs(), proof.proof_data()).unwrap();
    }

    #[test]
    fn test_unbalanced_rejected() {
        let input = note(bob(), 100);
        let outputs = [note(bob(), 20), note(alice(), 81)];
        let err = builder().build(&[input], &outputs, bob(), 0, bob()).unwrap_err();
        assert!(matches!(err, ProofError::BalanceMismatch));

        // Withdrawal with the sign flipped does not balance either.
        let input = note(alice(), 80);
        let change = note(alice(), 70);
        let err = builder().build(&[input], &[change], alice(), -10, alice()).unwrap_err();
        assert!(matches!(err, ProofError::BalanceMismatch));
    }

    #[test]
    fn test_empty_and_too_many() {
        let err = builder().build(&[], &[], bob(), 0, bob()).unwrap_err();
        assert!(matches!(err, ProofError::EmptyTransaction));

        let outputs: Vec<Note> = (0..=MAX_NOTES).map(|_| note(bob(), 0)).collect();
        let err = builder().build(&[], &outputs, bob(), 0, bob()).unwrap_err();
        assert!(matches!(
            err,
            ProofError::TooManyNotes {
                side: NoteSide::Output,
                max: MAX_NOTES
            }
        ));
    }

    #[test]
    fn test_unknown_opening() {
        let owned = note(bob(), 100);
        let watched = Note::watch_only(*owned.point(), owned.owner());
        let err = builder().build(&[watched], &[note(bob(), 100)], bob(), 0, bob()).unwrap_err();
        assert!(matches!(
            err,
            ProofError::UnknownOpening {
                side: NoteSide::Input,
                index: 0
            }
        ));

        let mut pending = note(bob(), 100);
        pending.set_status(NoteStatus::PendingSpend);
        let err = builder().build(&[pending], &[note(bob(), 100)], bob(), 0, bob()).unwrap_err();
        assert!(matches!(err, ProofError::UnknownOpening { .. }));

        let err = builder()
            .build(&[note(bob(), 100)], &[Note::watch_only(*owned.point(), bob())], bob(), 0, bob())
            .unwrap_err();
        assert!(matches!(
            err,
            ProofError::UnknownOpening {
                side: NoteSide::Output,
                index: 0
            }
        ));
    }

    #[test]
    fn test_duplicate_notes_rejected() {
        let n = note(bob(), 100_000);
        let err = builder()
            .build(&[n.clone(), n.clone()], &[], bob(), 200_000, bob())
            .unwrap_err();
        assert!(matches!(
            err,
            ProofError::DuplicateNote {
                side: NoteSide::Input,
                index: 1
            }
        ));

        let out = note(alice(), 50);
        let err = builder()
            .build(&[n.clone()], &[out.clone(), out], bob(), 0, bob())
            .unwrap_err();
        assert!(matches!(
            err,
            ProofError::DuplicateNote {
                side: NoteSide::Output,
                index: 1
            }
        ));

        // Spending a note into itself.
        let err = builder()
            .build(&[n.clone()], &[n], bob(), 0, bob())
            .unwrap_err();
        assert!(matches!(
            err,
            ProofError::DuplicateNote {
                side: NoteSide::Output,
                index: 0
            }
        ));
    }

    #[test]
    fn test_first_duplicate() {
        let a = B256::repeat_byte(1);
        let b = B256::repeat_byte(2);
        assert_eq!(first_duplicate(&[a, b], &[]), None);
        assert_eq!(first_duplicate(&[a], &[b, a]), Some((NoteSide::Output, 1)));
        assert_eq!(first_duplicate(&[b, a, b], &[a]), Some((NoteSide::Input, 2)));
    }

    #[test]
    fn test_proof_hash_binds_public_inputs() {
        let proof = builder().build(&[], &[note(bob(), 100)], bob(), -100, bob()).unwrap();
        let public = proof.public_inputs().clone();
        let data = proof.proof_data();
        assert_eq!(proof_hash(&public, data), proof.proof_hash());

        let mut changed = public.clone();
        changed.public_value = -101;
        assert_ne!(proof_hash(&changed, data), proof.proof_hash());

        let mut changed = public.clone();
        changed.public_owner = alice();
        assert_ne!(proof_hash(&changed, data), proof.proof_hash());

        let mut changed = public.clone();
        changed.output_commitments[0] = B256::repeat_byte(1);
        assert_ne!(proof_hash(&changed, data), proof.proof_hash());

        let mut changed = public;
        changed.input_commitments.push(B256::repeat_byte(2));
        assert_ne!(proof_hash(&changed, data), proof.proof_hash());
    }

    #[test]
    fn test_seeded_build_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(3);
        let output = commitment::create_with_rng(&mut rng, bob(), 100).unwrap();
        let a = builder()
            .build_with_rng(
                &mut StdRng::seed_from_u64(4),
                &[],
                &[output.clone()],
                bob(),
                -100,
                bob(),
            )
            .unwrap();
        let b = builder()
            .build_with_rng(&mut StdRng::seed_from_u64(4), &[], &[output], bob(), -100, bob())
            .unwrap();
        assert_eq!(a.proof_hash(), b.proof_hash());
        assert_eq!(a.proof_data(), b.proof_data());
    }

    #[test]
    fn test_proof_data_layout() {
        let input = note(bob(), 100);
        let outputs = [note(bob(), 20), note(alice(), 80)];
        let proof = builder().build(&[input], &outputs, bob(), 0, bob()).unwrap();
        assert_eq!(
            proof.proof_data().len(),
            3 * NOTE_PROOF_LENGTH + BALANCE_PROOF_LENGTH
        );
        let data = ProofData::read(proof.proof_data(), 1, 2).unwrap();
        assert_eq!(data.outputs[1].owner, alice());
        assert_eq!(data.to_bytes(), proof.proof_data().to_vec());
        assert!(ProofData::read(proof.proof_data(), 2, 2).is_err());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut proof = builder().build(&[], &[note(bob(), 1)], bob(), -1, bob()).unwrap();
        assert!(matches!(
            proof.mark_submitted(),
            Err(ProofError::InvalidTransition {
                from: ProofStatus::Built,
                to: ProofStatus::Submitted
            })
        ));
        proof.attach_signatures(Vec::new()).unwrap();
        assert!(proof.attach_signatures(Vec::new()).is_err());
        assert!(proof.mark_confirmed().is_err());
        proof.mark_submitted().unwrap();
        proof.mark_reverted().unwrap();
        assert_eq!(proof.status(), ProofStatus::Reverted);
        assert!(proof.mark_confirmed().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_balanced_builds_unbalanced_fails(
            a in 0u64..1_000_000,
            b in 0u64..1_000_000,
            public_value in -1_000_000i64..1_000_000,
            skew in 1u64..1000,
        ) {
            // inputs a + b, outputs chosen so the equation holds
            let total = i128::from(a) + i128::from(b) - i128::from(public_value);
            prop_assume!(total >= 0);
            let out_value = u64::try_from(total).unwrap();
            prop_assume!(out_value + skew <= crate::note::MAX_NOTE_VALUE);

            let inputs = [note(bob(), a), note(bob(), b)];
            let balanced = builder()
                .build(&inputs, &[note(alice(), out_value)], bob(), public_value, bob());
            prop_assert!(balanced.is_ok());

            let unbalanced = builder()
                .build(&inputs, &[note(alice(), out_value + skew)], bob(), public_value, bob());
            prop_assert!(matches!(unbalanced, Err(ProofError::BalanceMismatch)));
        }
    }
}
