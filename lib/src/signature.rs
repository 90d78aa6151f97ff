//! Spend authorisations.
//!
//! Every input note owner signs the proof hash as EIP-712 typed data, under a
//! domain naming the contract that will verify the join-split. A signature is
//! therefore useless for any other proof and any other contract.

use alloy::primitives::{Address, Bytes, Signature, B256};
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy_sol_types::{eip712_domain, sol, Eip712Domain, SolStruct};
use tracing::debug;

use crate::error::SignatureError;
use crate::proof::JoinSplitProof;

sol! {
    /// Typed data an input owner signs to authorise a join-split.
    struct JoinSplitSignature {
        bytes32 proofHash;
    }
}

/// EIP-712 domain of the verifying contract.
pub fn signing_domain(chain_id: u64, target_contract: Address) -> Eip712Domain {
    eip712_domain! {
        name: "ZkAsset",
        version: "1",
        chain_id: chain_id,
        verifying_contract: target_contract,
    }
}

/// The digest an input owner signs.
pub fn signing_hash(proof_hash: B256, target_contract: Address, chain_id: u64) -> B256 {
    JoinSplitSignature { proofHash: proof_hash }
        .eip712_signing_hash(&signing_domain(chain_id, target_contract))
}

/// A spend authorisation for one input note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendSignature {
    signer: Address,
    proof_hash: B256,
    target_contract: Address,
    signature: Signature,
}

impl SpendSignature {
    pub fn signer(&self) -> Address {
        self.signer
    }

    pub fn proof_hash(&self) -> B256 {
        self.proof_hash
    }

    pub fn target_contract(&self) -> Address {
        self.target_contract
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// The 65-byte `r ‖ s ‖ v` form the contracts expect.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.signature.as_bytes().to_vec())
    }
}

/// Sign a proof with one key per input note, in input order.
///
/// # Arguments
/// * `proof` - The built join-split
/// * `signing_keys` - Key of the owner of each input note
/// * `target_contract` - Contract that will verify the signatures
/// * `chain_id` - Chain the contract lives on
///
/// # Returns
/// * One signature per input note
pub fn sign(
    proof: &JoinSplitProof,
    signing_keys: &[PrivateKeySigner],
    target_contract: Address,
    chain_id: u64,
) -> Result<Vec<SpendSignature>, SignatureError> {
    let inputs = proof.input_notes();
    if signing_keys.len() != inputs.len() {
        return Err(SignatureError::SignatureCountMismatch {
            expected: inputs.len(),
            actual: signing_keys.len(),
        });
    }

    let digest = signing_hash(proof.proof_hash(), target_contract, chain_id);
    let signatures = signing_keys
        .iter()
        .zip(inputs)
        .enumerate()
        .map(|(index, (key, note))| {
            if key.address() != note.owner() {
                return Err(SignatureError::SignerMismatch { index });
            }
            Ok(SpendSignature {
                signer: key.address(),
                proof_hash: proof.proof_hash(),
                target_contract,
                signature: key.sign_hash_sync(&digest)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(proof_hash = %proof.proof_hash(), count = signatures.len(), "signed join-split");
    Ok(signatures)
}

/// Recover the address that signed `proof_hash` for `target_contract`.
pub fn recover_signer(
    signature: &Signature,
    proof_hash: B256,
    target_contract: Address,
    chain_id: u64,
) -> Result<Address, SignatureError> {
    let digest = signing_hash(proof_hash, target_contract, chain_id);
    Ok(signature.recover_address_from_prehash(&digest)?)
}

/// Check that `signature` authorises `proof_hash` on `target_contract`.
pub fn verify(
    signature: &SpendSignature,
    proof_hash: B256,
    target_contract: Address,
    chain_id: u64,
) -> Result<(), SignatureError> {
    let invalid = SignatureError::Invalid { proof_hash };
    if signature.proof_hash != proof_hash || signature.target_contract != target_contract {
        return Err(invalid);
    }
    let recovered = recover_signer(&signature.signature, proof_hash, target_contract, chain_id)?;
    if recovered != signature.signer {
        return Err(invalid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment;
    use crate::proof::JoinSplitBuilder;

    const CHAIN_ID: u64 = 4;

    fn contract() -> Address {
        Address::repeat_byte(0xc0)
    }

    fn transfer(owners: &[Address]) -> JoinSplitProof {
        let inputs: Vec<_> = owners
            .iter()
            .map(|owner| commitment::create(*owner, 10).unwrap())
            .collect();
        let total = 10 * owners.len() as u64;
        let output = commitment::create(Address::repeat_byte(9), total).unwrap();
        JoinSplitBuilder::new(4)
            .build(&inputs, &[output], owners[0], 0, owners[0])
            .unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let alice = PrivateKeySigner::random();
        let bob = PrivateKeySigner::random();
        let proof = transfer(&[alice.address(), bob.address()]);

        let signatures = sign(&proof, &[alice.clone(), bob.clone()], contract(), CHAIN_ID).unwrap();
        assert_eq!(signatures.len(), 2);
        assert_eq!(signatures[0].signer(), alice.address());
        assert_eq!(signatures[1].signer(), bob.address());
        assert_eq!(signatures[0].to_bytes().len(), 65);
        for signature in &signatures {
            verify(signature, proof.proof_hash(), contract(), CHAIN_ID).unwrap();
        }
    }

    #[test]
    fn test_signature_bound_to_proof_and_contract() {
        let alice = PrivateKeySigner::random();
        let proof = transfer(&[alice.address()]);
        let other_proof = transfer(&[alice.address()]);
        let signature = sign(&proof, &[alice.clone()], contract(), CHAIN_ID)
            .unwrap()
            .remove(0);

        let other_contract = Address::repeat_byte(0xc1);
        assert!(matches!(
            verify(&signature, proof.proof_hash(), other_contract, CHAIN_ID),
            Err(SignatureError::Invalid { .. })
        ));
        assert!(verify(&signature, other_proof.proof_hash(), contract(), CHAIN_ID).is_err());

        // Recovery under the wrong context yields some other address.
        let raw = signature.signature();
        let recovered = recover_signer(&raw, proof.proof_hash(), other_contract, CHAIN_ID).unwrap();
        assert_ne!(recovered, alice.address());
        let recovered =
            recover_signer(&raw, other_proof.proof_hash(), contract(), CHAIN_ID).unwrap();
        assert_ne!(recovered, alice.address());
        let recovered = recover_signer(&raw, proof.proof_hash(), contract(), CHAIN_ID + 1).unwrap();
        assert_ne!(recovered, alice.address());
        let recovered = recover_signer(&raw, proof.proof_hash(), contract(), CHAIN_ID).unwrap();
        assert_eq!(recovered, alice.address());
    }

    #[test]
    fn test_key_count_and_owner_checks() {
        let alice = PrivateKeySigner::random();
        let bob = PrivateKeySigner::random();
        let proof = transfer(&[alice.address(), bob.address()]);

        assert!(matches!(
            sign(&proof, &[alice.clone()], contract(), CHAIN_ID),
            Err(SignatureError::SignatureCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            sign(&proof, &[bob.clone(), alice.clone()], contract(), CHAIN_ID),
            Err(SignatureError::SignerMismatch { index: 0 })
        ));
    }

    #[test]
    fn test_deposit_needs_no_signatures() {
        let owner = Address::repeat_byte(5);
        let output = commitment::create(owner, 100).unwrap();
        let proof = JoinSplitBuilder::new(4)
            .build(&[], &[output], owner, -100, owner)
            .unwrap();
        assert!(sign(&proof, &[], contract(), CHAIN_ID).unwrap().is_empty());
    }
}
