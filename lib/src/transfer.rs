//! Join-split engine and transfer lifecycle.
//!
//! A transfer moves through
//!
//! ```text
//! prepare ──► submit ──► settle ─┬─► confirmed: inputs Spent, outputs recorded
//!    │                           └─► reverted:  inputs back to Unspent
//!    └──► cancel: inputs back to Unspent
//! ```
//!
//! Input notes are claimed (PendingSpend) during `prepare`, so two transfers
//! racing for the same note cannot both get past it.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256};
use alloy::signers::local::PrivateKeySigner;
use tracing::{info, warn};

use crate::abi;
use crate::commitment;
use crate::config::EngineConfig;
use crate::error::{Result, SubmissionError};
use crate::note::Note;
use crate::proof::{JoinSplitBuilder, JoinSplitProof};
use crate::signature;
use crate::store::NoteStore;
use crate::submission::{SubmissionClient, TransactionHandle, TxOutcome};

/// Entry point for creating notes and producing signed, encoded join-splits.
#[derive(Debug, Clone)]
pub struct JoinSplitEngine {
    config: EngineConfig,
    store: Arc<NoteStore>,
    builder: JoinSplitBuilder,
}

/// A signed and encoded join-split whose inputs are claimed.
#[derive(Debug)]
pub struct PreparedTransfer {
    proof: JoinSplitProof,
    payload: Bytes,
    signatures: Bytes,
}

impl PreparedTransfer {
    pub fn proof(&self) -> &JoinSplitProof {
        &self.proof
    }

    pub fn proof_hash(&self) -> B256 {
        self.proof.proof_hash()
    }

    /// The ABI payload for the zk asset contract.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The ABI-encoded signature list.
    pub fn signatures(&self) -> &Bytes {
        &self.signatures
    }

    /// Calldata for `confidentialTransfer(bytes,bytes)`.
    pub fn calldata(&self) -> Bytes {
        abi::encode_transfer_call(self.payload.clone(), self.signatures.clone())
    }
}

/// A submitted join-split awaiting its outcome.
#[derive(Debug)]
pub struct PendingTransfer {
    proof: JoinSplitProof,
    handle: TransactionHandle,
}

impl PendingTransfer {
    pub fn tx_hash(&self) -> B256 {
        self.handle.tx_hash()
    }

    pub fn proof(&self) -> &JoinSplitProof {
        &self.proof
    }
}

impl JoinSplitEngine {
    pub fn new(config: EngineConfig, store: Arc<NoteStore>) -> Self {
        let builder = JoinSplitBuilder::new(config.max_notes);
        Self {
            config,
            store,
            builder,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<NoteStore> {
        &self.store
    }

    /// Create a fresh note. It is not recorded until a transfer creating it
    /// confirms.
    pub fn create_note(&self, owner: Address, value: u64) -> Result<Note> {
        Ok(commitment::create(owner, value)?)
    }

    pub fn build_join_split_proof(
        &self,
        inputs: &[Note],
        outputs: &[Note],
        public_owner: Address,
        public_value: i64,
        proof_owner: Address,
    ) -> Result<JoinSplitProof> {
        Ok(self
            .builder
            .build(inputs, outputs, public_owner, public_value, proof_owner)?)
    }

    /// Sign for the zk asset contract and move the proof to `Signed`.
    pub fn sign_proof(
        &self,
        proof: &mut JoinSplitProof,
        signing_keys: &[PrivateKeySigner],
    ) -> Result<()> {
        let signatures =
            signature::sign(proof, signing_keys, self.config.zk_asset, self.config.chain_id)?;
        proof.attach_signatures(signatures)?;
        Ok(())
    }

    pub fn encode_proof(&self, proof: &JoinSplitProof) -> Result<Bytes> {
        Ok(abi::encode(proof, self.config.zk_asset)?)
    }

    /// Build, claim, sign and encode a join-split over stored input notes.
    ///
    /// # Arguments
    /// * `inputs` - Commitments of stored notes to spend
    /// * `outputs` - Fresh output notes
    /// * `public_owner` - Account whose public balance moves
    /// * `public_value` - Negative to deposit, positive to withdraw
    /// * `signing_keys` - Key of each input owner, in input order
    ///
    /// # Returns
    /// * The prepared transfer, with every input now `PendingSpend`
    pub fn prepare(
        &self,
        inputs: &[B256],
        outputs: &[Note],
        public_owner: Address,
        public_value: i64,
        signing_keys: &[PrivateKeySigner],
    ) -> Result<PreparedTransfer> {
        let input_notes = inputs
            .iter()
            .map(|commitment| self.store.find(commitment))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut proof =
            self.build_join_split_proof(
                &input_notes,
                outputs,
                public_owner,
                public_value,
                public_owner,
            )?;

        self.store.claim_all(inputs)?;
        let encoded = self
            .sign_proof(&mut proof, signing_keys)
            .and_then(|()| self.encode_proof(&proof))
            .map(|payload| (payload, abi::encode_signatures(proof.signatures())));
        let (payload, signatures) = match encoded {
            Ok(encoded) => encoded,
            Err(err) => {
                self.release(&proof);
                return Err(err);
            }
        };

        info!(proof_hash = %proof.proof_hash(), inputs = inputs.len(), "prepared transfer");
        Ok(PreparedTransfer {
            proof,
            payload,
            signatures,
        })
    }

    /// Abandon a prepared transfer and release its inputs.
    pub fn cancel(&self, prepared: PreparedTransfer) {
        info!(proof_hash = %prepared.proof_hash(), "cancelled transfer");
        self.release(&prepared.proof);
    }

    /// Submit a prepared transfer. Inputs are released if the client
    /// refuses it.
    pub async fn submit<C>(&self, client: &C, prepared: PreparedTransfer) -> Result<PendingTransfer>
    where
        C: SubmissionClient + ?Sized,
    {
        let PreparedTransfer {
            mut proof,
            payload,
            signatures,
        } = prepared;
        proof.mark_submitted()?;
        match client
            .confidential_transfer(proof.proof_owner(), payload, signatures)
            .await
        {
            Ok(handle) => {
                info!(
                    proof_hash = %proof.proof_hash(),
                    tx_hash = %handle.tx_hash(),
                    "submitted transfer"
                );
                Ok(PendingTransfer { proof, handle })
            }
            Err(err) => {
                self.release(&proof);
                Err(err.into())
            }
        }
    }

    /// Wait for a submitted transfer and apply its outcome to the store.
    ///
    /// On confirmation the inputs become `Spent` and the outputs are
    /// recorded. On revert the inputs are released and the revert reason is
    /// returned as an error. If the outcome is lost the inputs stay
    /// `PendingSpend`, since the transaction may still have landed.
    pub async fn settle(&self, pending: PendingTransfer) -> Result<JoinSplitProof> {
        let PendingTransfer { mut proof, handle } = pending;
        match handle.wait().await? {
            TxOutcome::Confirmed => {
                proof.mark_confirmed()?;
                for note in proof.input_notes() {
                    self.store.mark_spent(&note.commitment())?;
                }
                for note in proof.output_notes() {
                    self.store.record(note.clone())?;
                }
                info!(proof_hash = %proof.proof_hash(), "transfer confirmed");
                Ok(proof)
            }
            TxOutcome::Reverted { reason } => {
                proof.mark_reverted()?;
                self.release(&proof);
                warn!(proof_hash = %proof.proof_hash(), %reason, "transfer reverted");
                Err(SubmissionError::Reverted { reason }.into())
            }
        }
    }

    /// Submit and settle in one step.
    pub async fn execute<C>(&self, client: &C, prepared: PreparedTransfer) -> Result<JoinSplitProof>
    where
        C: SubmissionClient + ?Sized,
    {
        let pending = self.submit(client, prepared).await?;
        self.settle(pending).await
    }

    fn release(&self, proof: &JoinSplitProof) {
        for note in proof.input_notes() {
            if let Err(err) = self.store.revert_pending_spend(&note.commitment()) {
                warn!(commitment = %note.commitment(), %err, "failed to release input note");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ProofError, StoreError};
    use crate::note::NoteStatus;
    use async_trait::async_trait;

    /// Answers every submission with a fixed outcome.
    struct FixedClient {
        outcome: Option<TxOutcome>,
    }

    #[async_trait]
    impl SubmissionClient for FixedClient {
        async fn mint(
            &self,
            _to: Address,
            _value: u64,
        ) -> std::result::Result<(), SubmissionError> {
            Ok(())
        }

        async fn balance_of(&self, _owner: Address) -> std::result::Result<u64, SubmissionError> {
            Ok(0)
        }

        async fn approve(
            &self,
            _owner: Address,
            _spender: Address,
            _value: u64,
        ) -> std::result::Result<(), SubmissionError> {
            Ok(())
        }

        async fn public_approve(
            &self,
            _owner: Address,
            _registry: Address,
            _proof_hash: B256,
            _value: u64,
        ) -> std::result::Result<(), SubmissionError> {
            Ok(())
        }

        async fn confidential_transfer(
            &self,
            _sender: Address,
            _proof_data: Bytes,
            _signatures: Bytes,
        ) -> std::result::Result<TransactionHandle, SubmissionError> {
            match &self.outcome {
                Some(outcome) => Ok(TransactionHandle::settled(
                    B256::repeat_byte(0xee),
                    outcome.clone(),
                )),
                None => Err(SubmissionError::Rejected("offline".into())),
            }
        }
    }

    fn engine() -> JoinSplitEngine {
        JoinSplitEngine::new(EngineConfig::default(), Arc::new(NoteStore::new()))
    }

    /// Records a spendable note for `key` and returns its commitment.
    fn fund(engine: &JoinSplitEngine, key: &PrivateKeySigner, value: u64) -> B256 {
        let note = engine.create_note(key.address(), value).unwrap();
        let commitment = note.commitment();
        engine.store().record(note).unwrap();
        commitment
    }

    #[tokio::test]
    async fn test_confirmed_transfer_updates_store() {
        let engine = engine();
        let bob = PrivateKeySigner::random();
        let alice = Address::repeat_byte(0xa1);
        let input = fund(&engine, &bob, 100);
        let outputs = [
            engine.create_note(bob.address(), 20).unwrap(),
            engine.create_note(alice, 80).unwrap(),
        ];

        let prepared = engine
            .prepare(&[input], &outputs, bob.address(), 0, &[bob.clone()])
            .unwrap();
        assert_eq!(engine.store().find(&input).unwrap().status(), NoteStatus::PendingSpend);
        assert!(!prepared.calldata().is_empty());

        let client = FixedClient {
            outcome: Some(TxOutcome::Confirmed),
        };
        let proof = engine.execute(&client, prepared).await.unwrap();
        assert_eq!(proof.status(), crate::proof::ProofStatus::Confirmed);
        assert_eq!(engine.store().find(&input).unwrap().status(), NoteStatus::Spent);
        assert_eq!(engine.store().unspent_for(alice).len(), 1);
        assert_eq!(engine.store().unspent_for(bob.address()).len(), 1);
    }

    #[tokio::test]
    async fn test_reverted_transfer_releases_inputs() {
        let engine = engine();
        let bob = PrivateKeySigner::random();
        let input = fund(&engine, &bob, 50);
        let output = engine.create_note(bob.address(), 50).unwrap();
        let prepared = engine
            .prepare(&[input], &[output], bob.address(), 0, &[bob.clone()])
            .unwrap();

        let client = FixedClient {
            outcome: Some(TxOutcome::Reverted {
                reason: "bad proof".into(),
            }),
        };
        let err = engine.execute(&client, prepared).await.unwrap_err();
        assert!(matches!(err, Error::Submission(SubmissionError::Reverted { .. })));
        assert_eq!(engine.store().find(&input).unwrap().status(), NoteStatus::Unspent);
        assert_eq!(engine.store().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_submission_releases_inputs() {
        let engine = engine();
        let bob = PrivateKeySigner::random();
        let input = fund(&engine, &bob, 5);
        let output = engine.create_note(bob.address(), 5).unwrap();
        let prepared = engine
            .prepare(&[input], &[output], bob.address(), 0, &[bob.clone()])
            .unwrap();

        let client = FixedClient { outcome: None };
        assert!(engine.submit(&client, prepared).await.is_err());
        assert_eq!(engine.store().find(&input).unwrap().status(), NoteStatus::Unspent);
    }

    #[test]
    fn test_cancel_and_double_prepare() {
        let engine = engine();
        let bob = PrivateKeySigner::random();
        let input = fund(&engine, &bob, 10);
        let output = engine.create_note(bob.address(), 10).unwrap();

        let first = engine
            .prepare(&[input], &[output.clone()], bob.address(), 0, &[bob.clone()])
            .unwrap();
        let err = engine
            .prepare(&[input], &[output.clone()], bob.address(), 0, &[bob.clone()])
            .unwrap_err();
        assert!(matches!(err, Error::Proof(ProofError::UnknownOpening { .. })));

        engine.cancel(first);
        assert_eq!(engine.store().find(&input).unwrap().status(), NoteStatus::Unspent);
        assert!(engine
            .prepare(&[input], &[output], bob.address(), 0, &[bob.clone()])
            .is_ok());
    }

    #[test]
    fn test_failed_signing_releases_claims() {
        let engine = engine();
        let bob = PrivateKeySigner::random();
        let mallory = PrivateKeySigner::random();
        let input = fund(&engine, &bob, 10);
        let output = engine.create_note(bob.address(), 10).unwrap();

        let err = engine
            .prepare(&[input], &[output], bob.address(), 0, &[mallory])
            .unwrap_err();
        assert!(matches!(err, Error::Signature(_)));
        assert_eq!(engine.store().find(&input).unwrap().status(), NoteStatus::Unspent);
    }

    #[test]
    fn test_unknown_input() {
        let engine = engine();
        let err = engine
            .prepare(&[B256::ZERO], &[], Address::ZERO, 0, &[])
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::NotFound(_))));
    }
}
