//! Range sub-proofs for note values.
//!
//! A note point `V = v·G + r·H` is split into bit commitments
//! `C_i = b_i·G + r_i·H` with `Σ 2^i·C_i = V`. Each `C_i` carries a
//! disjunctive Schnorr proof that it commits to 0 or to 1, so the verifier
//! learns that `0 ≤ v < 2^VALUE_BITS` and that the prover knows the opening,
//! and nothing else.

use ark_bn254::{Fr, G1Affine, G1Projective};
use ark_ff::{One, Zero};
use rand::{CryptoRng, RngCore};

use crate::commitment::random_scalar;
use crate::crypto::{
    point_from_bytes, point_to_bytes, scalar_from_bytes, scalar_to_bytes, to_affine, Transcript,
    GENERATOR_G, GENERATOR_H, POINT_LENGTH, SCALAR_LENGTH,
};
use crate::error::EncodingError;
use crate::note::{NoteSide, VALUE_BITS};

/// Encoded size of one bit proof.
pub const BIT_PROOF_LENGTH: usize = POINT_LENGTH + 4 * SCALAR_LENGTH;

/// Encoded size of a range proof.
pub const RANGE_PROOF_LENGTH: usize = VALUE_BITS as usize * BIT_PROOF_LENGTH;

/// Proof that `commitment` opens to 0 or to 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitProof {
    commitment: G1Affine,
    e0: Fr,
    e1: Fr,
    s0: Fr,
    s1: Fr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeProof {
    bits: Vec<BitProof>,
}

fn bit_transcript(
    base: &Transcript,
    side: NoteSide,
    index: usize,
    bit: usize,
    commitment: &G1Affine,
) -> Transcript {
    let mut transcript = base.clone();
    transcript.append_u64(b"side", side.tag());
    transcript.append_u64(b"note", index as u64);
    transcript.append_u64(b"bit", bit as u64);
    transcript.append_point(b"commitment", commitment);
    transcript
}

impl RangeProof {
    /// Proves that the note `(value, blinding)` lies in range.
    pub fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        base: &Transcript,
        side: NoteSide,
        index: usize,
        value: u64,
        blinding: Fr,
    ) -> Result<Self, rand::Error> {
        let n = VALUE_BITS as usize;

        // r_1..r_{n-1} are random; r_0 absorbs the rest so the weighted sum
        // of bit blindings equals the note blinding.
        let mut blindings = vec![Fr::zero(); n];
        let mut weighted = Fr::zero();
        let mut weight = Fr::one();
        for r in blindings.iter_mut().skip(1) {
            weight = weight + weight;
            *r = random_scalar(rng)?;
            weighted += weight * *r;
        }
        blindings[0] = blinding - weighted;

        let mut bits = Vec::with_capacity(n);
        for (i, r) in blindings.into_iter().enumerate() {
            let bit = (value >> i) & 1 == 1;
            bits.push(prove_bit(rng, base, side, index, i, bit, r)?);
        }
        Ok(Self { bits })
    }

    /// Checks every bit proof and that the bits recombine to `point`.
    pub fn verify(
        &self,
        base: &Transcript,
        side: NoteSide,
        index: usize,
        point: &G1Affine,
    ) -> bool {
        if self.bits.len() != VALUE_BITS as usize {
            return false;
        }
        let mut recombined = G1Projective::zero();
        let mut weight = Fr::one();
        for (i, bit) in self.bits.iter().enumerate() {
            if !verify_bit(base, side, index, i, bit) {
                return false;
            }
            recombined = recombined + bit.commitment * weight;
            weight = weight + weight;
        }
        to_affine(recombined) == *point
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        for bit in &self.bits {
            out.extend_from_slice(&point_to_bytes(&bit.commitment));
            for scalar in [&bit.e0, &bit.e1, &bit.s0, &bit.s1] {
                out.extend_from_slice(&scalar_to_bytes(scalar));
            }
        }
    }

    pub fn read(bytes: &[u8]) -> Result<Self, EncodingError> {
        if bytes.len() != RANGE_PROOF_LENGTH {
            return Err(EncodingError::Malformed("range proof length"));
        }
        let bits = bytes
            .chunks_exact(BIT_PROOF_LENGTH)
            .map(|chunk| {
                let scalar = |k: usize| {
                    let start = POINT_LENGTH + k * SCALAR_LENGTH;
                    scalar_from_bytes(&chunk[start..start + SCALAR_LENGTH])
                };
                Ok(BitProof {
                    commitment: point_from_bytes(&chunk[..POINT_LENGTH])?,
                    e0: scalar(0)?,
                    e1: scalar(1)?,
                    s0: scalar(2)?,
                    s1: scalar(3)?,
                })
            })
            .collect::<Result<Vec<_>, EncodingError>>()?;
        Ok(Self { bits })
    }
}

/// CDS OR-proof: the real branch is a Schnorr proof of `C - b·G = r·H`, the
/// other branch is simulated from a chosen challenge and response.
fn prove_bit<R: RngCore + CryptoRng>(
    rng: &mut R,
    base: &Transcript,
    side: NoteSide,
    index: usize,
    bit_index: usize,
    bit: bool,
    r: Fr,
) -> Result<BitProof, rand::Error> {
    let g = *GENERATOR_G;
    let h = *GENERATOR_H;
    let value = if bit { Fr::one() } else { Fr::zero() };
    let commitment = to_affine(g * value + h * r);
    let shifted = to_affine(G1Projective::from(commitment) - g);

    let k = random_scalar(rng)?;
    let fake_e = random_scalar(rng)?;
    let fake_s = random_scalar(rng)?;

    let (a0, a1) = if bit {
        let a0 = to_affine(h * fake_s - commitment * fake_e);
        (a0, to_affine(h * k))
    } else {
        let a1 = to_affine(h * fake_s - shifted * fake_e);
        (to_affine(h * k), a1)
    };

    let mut transcript = bit_transcript(base, side, index, bit_index, &commitment);
    transcript.append_point(b"a0", &a0);
    transcript.append_point(b"a1", &a1);
    let e = transcript.challenge_scalar(b"bit-challenge");

    let real_e = e - fake_e;
    let real_s = k + real_e * r;
    let (e0, e1, s0, s1) = if bit {
        (fake_e, real_e, fake_s, real_s)
    } else {
        (real_e, fake_e, real_s, fake_s)
    };
    Ok(BitProof {
        commitment,
        e0,
        e1,
        s0,
        s1,
    })
}

fn verify_bit(
    base: &Transcript,
    side: NoteSide,
    index: usize,
    bit_index: usize,
    proof: &BitProof,
) -> bool {
    let g = *GENERATOR_G;
    let h = *GENERATOR_H;
    let shifted = to_affine(G1Projective::from(proof.commitment) - g);
    let a0 = to_affine(h * proof.s0 - proof.commitment * proof.e0);
    let a1 = to_affine(h * proof.s1 - shifted * proof.e1);

    let mut transcript = bit_transcript(base, side, index, bit_index, &proof.commitment);
    transcript.append_point(b"a0", &a0);
    transcript.append_point(b"a1", &a1);
    proof.e0 + proof.e1 == transcript.challenge_scalar(b"bit-challenge")
}
