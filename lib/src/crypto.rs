//! Cryptographic utilities for zkasset
//!
//! This module provides the primitives the join-split engine is built on:
//! Keccak-256 hashing, the Pedersen generators on BN254 G1, fixed-width
//! encodings of points and scalars, the Fiat-Shamir transcript and the
//! Poseidon-based note nullifier.

use alloy::primitives::B256;
use ark_bn254::{Fq, Fr, G1Affine, G1Projective};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{BigInteger, Field, PrimeField, Zero};
use light_poseidon::{Poseidon, PoseidonError, PoseidonHasher};
use once_cell::sync::Lazy;
use tiny_keccak::{Hasher, Keccak};

use crate::error::EncodingError;

/// Hash length in bytes
pub const HASH_LENGTH: usize = 32;

/// Encoded scalar length in bytes
pub const SCALAR_LENGTH: usize = 32;

/// Encoded G1 point length in bytes (x and y, big-endian)
pub const POINT_LENGTH: usize = 64;

/// Domain tag for deriving the blinding generator
const GENERATOR_H_DOMAIN: &[u8] = b"zkasset.pedersen.generator.h.v1";

/// Value generator `G`, the standard BN254 G1 generator `(1, 2)`.
pub static GENERATOR_G: Lazy<G1Affine> = Lazy::new(G1Affine::generator);

/// Blinding generator `H`, hashed onto the curve so that nobody knows
/// `log_G(H)`.
pub static GENERATOR_H: Lazy<G1Affine> = Lazy::new(|| hash_to_curve(GENERATOR_H_DOMAIN));

/// Compute Keccak-256 hash of input data
///
/// Used for Ethereum-compatible hashing operations.
///
/// # Arguments
/// * `input` - Input data to hash
///
/// # Returns
/// * Keccak-256 hash as B256
pub fn keccak256<T: AsRef<[u8]>>(input: T) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; HASH_LENGTH];

    hasher.update(input.as_ref());
    hasher.finalize(&mut output);

    B256::from(output)
}

/// Try-and-increment hash onto BN254 G1.
///
/// G1 has cofactor one, so every point on `y^2 = x^3 + 3` is in the prime
/// order subgroup.
fn hash_to_curve(domain: &[u8]) -> G1Affine {
    let mut counter: u32 = 0;
    loop {
        let mut input = domain.to_vec();
        input.extend_from_slice(&counter.to_be_bytes());
        let x = Fq::from_be_bytes_mod_order(keccak256(&input).as_slice());
        let rhs = x.square() * x + Fq::from(3u64);
        if let Some(y) = rhs.sqrt() {
            return G1Affine::new_unchecked(x, y);
        }
        counter += 1;
    }
}

/// Pedersen commitment `value·G + blinding·H`.
pub fn pedersen_commit(value: Fr, blinding: Fr) -> G1Projective {
    *GENERATOR_G * value + *GENERATOR_H * blinding
}

/// Map a signed public amount into the scalar field.
pub fn signed_scalar(value: i128) -> Fr {
    let magnitude = Fr::from(value.unsigned_abs());
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Encode a scalar as 32 big-endian bytes.
pub fn scalar_to_bytes(scalar: &Fr) -> [u8; SCALAR_LENGTH] {
    let mut out = [0u8; SCALAR_LENGTH];
    out.copy_from_slice(&scalar.into_bigint().to_bytes_be());
    out
}

/// Decode a canonical 32-byte big-endian scalar.
pub fn scalar_from_bytes(bytes: &[u8]) -> Result<Fr, EncodingError> {
    if bytes.len() != SCALAR_LENGTH {
        return Err(EncodingError::Malformed("scalar length"));
    }
    let scalar = Fr::from_be_bytes_mod_order(bytes);
    if scalar_to_bytes(&scalar) != bytes {
        return Err(EncodingError::Malformed("non-canonical scalar"));
    }
    Ok(scalar)
}

/// Encode a G1 point as `x ‖ y` big-endian, the identity as 64 zero bytes
/// (the EVM precompile convention).
pub fn point_to_bytes(point: &G1Affine) -> [u8; POINT_LENGTH] {
    let mut out = [0u8; POINT_LENGTH];
    if point.infinity {
        return out;
    }
    out[..32].copy_from_slice(&point.x.into_bigint().to_bytes_be());
    out[32..].copy_from_slice(&point.y.into_bigint().to_bytes_be());
    out
}

/// Decode a 64-byte G1 point, rejecting non-canonical coordinates and points
/// off the curve.
pub fn point_from_bytes(bytes: &[u8]) -> Result<G1Affine, EncodingError> {
    if bytes.len() != POINT_LENGTH {
        return Err(EncodingError::Malformed("point length"));
    }
    if bytes.iter().all(|b| *b == 0) {
        return Ok(G1Affine::identity());
    }
    let x = Fq::from_be_bytes_mod_order(&bytes[..32]);
    let y = Fq::from_be_bytes_mod_order(&bytes[32..]);
    let point = G1Affine::new_unchecked(x, y);
    if point_to_bytes(&point) != bytes {
        return Err(EncodingError::Malformed("non-canonical point"));
    }
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(EncodingError::Malformed("point not on curve"));
    }
    Ok(point)
}

/// Fiat-Shamir transcript over Keccak-256.
///
/// A base transcript absorbs the statement once; each sub-proof clones it and
/// absorbs its own messages before squeezing a challenge.
#[derive(Clone)]
pub struct Transcript {
    hasher: Keccak,
}

impl Transcript {
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Keccak::v256();
        hasher.update(&(domain.len() as u64).to_be_bytes());
        hasher.update(domain);
        Self { hasher }
    }

    pub fn append_bytes(&mut self, label: &[u8], bytes: &[u8]) {
        self.hasher.update(label);
        self.hasher.update(&(bytes.len() as u64).to_be_bytes());
        self.hasher.update(bytes);
    }

    pub fn append_u64(&mut self, label: &[u8], value: u64) {
        self.append_bytes(label, &value.to_be_bytes());
    }

    pub fn append_point(&mut self, label: &[u8], point: &G1Affine) {
        self.append_bytes(label, &point_to_bytes(point));
    }

    /// Squeeze a challenge scalar without consuming the transcript.
    pub fn challenge_scalar(&self, label: &[u8]) -> Fr {
        let mut hasher = self.hasher.clone();
        hasher.update(label);
        let mut output = [0u8; HASH_LENGTH];
        hasher.finalize(&mut output);
        Fr::from_be_bytes_mod_order(&output)
    }
}

/// Compute Poseidon hash of two field elements
///
/// # Arguments
/// * `left` - Left input field element
/// * `right` - Right input field element
///
/// # Returns
/// * Poseidon hash as a field element
pub fn poseidon_hash(left: Fr, right: Fr) -> Result<Fr, PoseidonError> {
    let mut poseidon = Poseidon::<Fr>::new_circom(2)?;
    poseidon.hash(&[left, right])
}

/// Derive the nullifier a verifier records when a note is spent.
///
/// The commitment is split into two 128-bit halves so each fits the field.
pub fn note_nullifier(commitment: &B256) -> Result<B256, PoseidonError> {
    let high = Fr::from_be_bytes_mod_order(&commitment[..16]);
    let low = Fr::from_be_bytes_mod_order(&commitment[16..]);
    let nullifier = poseidon_hash(high, low)?;
    Ok(B256::from(scalar_to_bytes(&nullifier)))
}

/// Sum a sequence of affine points.
pub fn sum_points<'a, I>(points: I) -> G1Projective
where
    I: IntoIterator<Item = &'a G1Affine>,
{
    points
        .into_iter()
        .fold(G1Projective::zero(), |acc, point| acc + point)
}

/// Normalise a projective point.
pub fn to_affine(point: G1Projective) -> G1Affine {
    point.into_affine()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty_vector() {
        let hash = keccak256(b"");
        assert_eq!(
            hex::encode(hash),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_generator_h_is_valid_and_independent() {
        let h = *GENERATOR_H;
        assert!(h.is_on_curve());
        assert!(h.is_in_correct_subgroup_assuming_on_curve());
        assert_ne!(h, *GENERATOR_G);
        assert_eq!(h, hash_to_curve(GENERATOR_H_DOMAIN));
    }

    #[test]
    fn test_point_encoding_round_trip() {
        let point = to_affine(pedersen_commit(Fr::from(42u64), Fr::from(7u64)));
        let bytes = point_to_bytes(&point);
        assert_eq!(point_from_bytes(&bytes).unwrap(), point);

        let identity = G1Affine::identity();
        assert_eq!(point_to_bytes(&identity), [0u8; POINT_LENGTH]);
        assert!(point_from_bytes(&[0u8; POINT_LENGTH]).unwrap().infinity);
    }

    #[test]
    fn test_point_decoding_rejects_off_curve() {
        let mut bytes = point_to_bytes(&GENERATOR_G);
        bytes[63] ^= 1;
        assert!(point_from_bytes(&bytes).is_err());
        assert!(point_from_bytes(&bytes[..10]).is_err());
    }

    #[test]
    fn test_scalar_decoding_rejects_non_canonical() {
        assert!(scalar_from_bytes(&[0xff; SCALAR_LENGTH]).is_err());
        let scalar = Fr::from(123456u64);
        assert_eq!(scalar_from_bytes(&scalar_to_bytes(&scalar)).unwrap(), scalar);
    }

    #[test]
    fn test_signed_scalar() {
        assert_eq!(signed_scalar(-5) + Fr::from(5u64), Fr::from(0u64));
        assert_eq!(signed_scalar(9), Fr::from(9u64));
    }

    #[test]
    fn test_pedersen_is_homomorphic() {
        let a = pedersen_commit(Fr::from(20u64), Fr::from(3u64));
        let b = pedersen_commit(Fr::from(80u64), Fr::from(4u64));
        assert_eq!(
            to_affine(a + b),
            to_affine(pedersen_commit(Fr::from(100u64), Fr::from(7u64)))
        );
    }

    #[test]
    fn test_transcript_challenges_depend_on_input() {
        let mut first = Transcript::new(b"test");
        first.append_u64(b"n", 1);
        let mut second = Transcript::new(b"test");
        second.append_u64(b"n", 2);
        assert_ne!(first.challenge_scalar(b"c"), second.challenge_scalar(b"c"));
        assert_eq!(first.challenge_scalar(b"c"), first.challenge_scalar(b"c"));
    }

    #[test]
    fn test_note_nullifier_deterministic() {
        let a = note_nullifier(&B256::repeat_byte(1)).unwrap();
        let b = note_nullifier(&B256::repeat_byte(1)).unwrap();
        let c = note_nullifier(&B256::repeat_byte(2)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
