//! ABI encoding of join-splits for the EVM contracts.
//!
//! The payload handed to the zk asset contract is the flat ABI tuple
//!
//! ```text
//! (address verifier, bytes32[] inputs, bytes32[] outputs, address publicOwner,
//!  int256 publicValue, address proofOwner, bytes proofData)
//! ```
//!
//! and a transfer is submitted as `confidentialTransfer(bytes,bytes)` with the
//! payload and the ABI-encoded signature list.

use alloy::primitives::{Address, Bytes, Signature, I256};
use alloy_sol_types::{sol, SolCall, SolValue};
use tracing::debug;

use crate::error::EncodingError;
use crate::proof::{JoinSplitProof, PublicInputs};
use crate::signature::SpendSignature;

sol! {
    /// Public inputs of a join-split in the verifier contract's layout.
    struct JoinSplitPublicInputs {
        bytes32[] inputCommitments;
        bytes32[] outputCommitments;
        address publicOwner;
        int256 publicValue;
        address proofOwner;
    }

    /// The proof payload consumed by the zk asset contract.
    struct JoinSplitPayload {
        address verifier;
        bytes32[] inputCommitments;
        bytes32[] outputCommitments;
        address publicOwner;
        int256 publicValue;
        address proofOwner;
        bytes proofData;
    }

    function confidentialTransfer(bytes proofData, bytes signatures);
}

/// A decoded proof payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub verifier: Address,
    pub public: PublicInputs,
    pub proof_data: Bytes,
}

/// ABI encoding of the public inputs. Hashed into the proof hash and absorbed
/// by the proof transcript.
pub fn encode_public_inputs(public: &PublicInputs) -> Vec<u8> {
    JoinSplitPublicInputs {
        inputCommitments: public.input_commitments.clone(),
        outputCommitments: public.output_commitments.clone(),
        publicOwner: public.public_owner,
        // any i64 fits in 256 bits
        publicValue: I256::unchecked_from(public.public_value),
        proofOwner: public.proof_owner,
    }
    .abi_encode_params()
}

/// Encode a proof for the contract at `target_contract`.
///
/// # Arguments
/// * `proof` - A built join-split proof
/// * `target_contract` - Verifier the payload is addressed to
///
/// # Returns
/// * The ABI payload, or `FieldWidth` if a count or length does not fit the
///   contract's fields
pub fn encode(proof: &JoinSplitProof, target_contract: Address) -> Result<Bytes, EncodingError> {
    let public = proof.public_inputs();
    check_field_widths(public, proof.proof_data().len())?;

    let payload = JoinSplitPayload {
        verifier: target_contract,
        inputCommitments: public.input_commitments.clone(),
        outputCommitments: public.output_commitments.clone(),
        publicOwner: public.public_owner,
        publicValue: I256::unchecked_from(public.public_value),
        proofOwner: public.proof_owner,
        proofData: proof.proof_data().clone(),
    }
    .abi_encode_params();
    debug!(proof_hash = %proof.proof_hash(), bytes = payload.len(), "encoded join-split payload");
    Ok(Bytes::from(payload))
}

fn check_field_widths(public: &PublicInputs, proof_data_len: usize) -> Result<(), EncodingError> {
    for (field, len) in [
        ("input note count", public.input_commitments.len()),
        ("output note count", public.output_commitments.len()),
    ] {
        u8::try_from(len).map_err(|_| EncodingError::FieldWidth { field, width: "uint8" })?;
    }
    u32::try_from(proof_data_len).map_err(|_| EncodingError::FieldWidth {
        field: "proof data length",
        width: "uint32",
    })?;
    Ok(())
}

/// Decode a payload produced by [`encode`].
pub fn decode(payload: &[u8]) -> Result<DecodedPayload, EncodingError> {
    let decoded = JoinSplitPayload::abi_decode_params(payload)?;
    let public_value = i64::try_from(decoded.publicValue).map_err(|_| EncodingError::FieldWidth {
        field: "public value",
        width: "int64",
    })?;
    Ok(DecodedPayload {
        verifier: decoded.verifier,
        public: PublicInputs {
            input_commitments: decoded.inputCommitments,
            output_commitments: decoded.outputCommitments,
            public_owner: decoded.publicOwner,
            public_value,
            proof_owner: decoded.proofOwner,
        },
        proof_data: decoded.proofData,
    })
}

/// ABI-encode the signatures as `bytes[]`, 65 bytes each, in input order.
pub fn encode_signatures(signatures: &[SpendSignature]) -> Bytes {
    let raw: Vec<Bytes> = signatures.iter().map(SpendSignature::to_bytes).collect();
    Bytes::from(raw.abi_encode())
}

pub fn decode_signatures(data: &[u8]) -> Result<Vec<Signature>, EncodingError> {
    Vec::<Bytes>::abi_decode(data)?
        .iter()
        .map(|raw| {
            Signature::try_from(raw.as_ref()).map_err(|_| EncodingError::Malformed("signature"))
        })
        .collect()
}

/// Calldata for `confidentialTransfer(bytes proofData, bytes signatures)`.
pub fn encode_transfer_call(payload: Bytes, signatures: Bytes) -> Bytes {
    let call = confidentialTransferCall {
        proofData: payload,
        signatures,
    };
    Bytes::from(call.abi_encode())
}

/// Split `confidentialTransfer` calldata into payload and signature list.
pub fn decode_transfer_call(calldata: &[u8]) -> Result<(Bytes, Bytes), EncodingError> {
    let call = confidentialTransferCall::abi_decode(calldata)?;
    Ok((call.proofData, call.signatures))
}
