//! In-process ledger.
//!
//! Plays the role of the deployed contracts: a public token, the approval
//! registry and the zk asset contract with its note registry. Every
//! `confidentialTransfer` is checked the way the verifier contract checks
//! it, and spent notes are tracked by Poseidon nullifier so a note can never
//! be spent twice.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zkasset_lib::{
    abi,
    crypto::{keccak256, note_nullifier},
    error::SubmissionError,
    proof::proof_hash,
    signature::recover_signer,
    verify_join_split, EngineConfig, SubmissionClient, TransactionHandle, TxOutcome,
};

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<Address, u64>,
    /// ERC-20 allowances, keyed by (owner, spender)
    allowances: HashMap<(Address, Address), u64>,
    /// Public-value approvals, keyed by (owner, proof hash)
    proof_approvals: HashMap<(Address, B256), u64>,
    notes: HashSet<B256>,
    nullifiers: HashSet<B256>,
    nonce: u64,
}

/// Token, approval registry and zk asset contract in one process.
#[derive(Debug)]
pub struct LocalLedger {
    config: EngineConfig,
    state: Mutex<LedgerState>,
    block_time: Duration,
}

impl LocalLedger {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LedgerState::default()),
            block_time: Duration::ZERO,
        }
    }

    /// Delay before a submitted transfer's outcome is delivered.
    pub fn with_block_time(mut self, block_time: Duration) -> Self {
        self.block_time = block_time;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether `commitment` is a live note in the registry.
    pub async fn has_note(&self, commitment: &B256) -> bool {
        self.state.lock().await.notes.contains(commitment)
    }

    pub async fn note_count(&self) -> usize {
        self.state.lock().await.notes.len()
    }

    /// Run the zk asset contract's checks and apply the transfer.
    fn execute(
        &self,
        state: &mut LedgerState,
        sender: Address,
        payload: &[u8],
        signatures: &[u8],
    ) -> Result<(), String> {
        let decoded = abi::decode(payload).map_err(|e| e.to_string())?;
        if decoded.verifier != self.config.zk_asset {
            return Err("proof addressed to another contract".into());
        }
        let public = &decoded.public;
        if public.proof_owner != sender {
            return Err("sender is not the proof owner".into());
        }
        let verified = verify_join_split(public, &decoded.proof_data).map_err(|e| e.to_string())?;

        let hash = proof_hash(public, &decoded.proof_data);
        let signatures = abi::decode_signatures(signatures).map_err(|e| e.to_string())?;
        if signatures.len() != verified.input_owners.len() {
            return Err("one signature per input note required".into());
        }
        let owners = &verified.input_owners;
        for (index, (signature, owner)) in signatures.iter().zip(owners).enumerate() {
            let signer = recover_signer(signature, hash, self.config.zk_asset, self.config.chain_id)
                .map_err(|e| e.to_string())?;
            if signer != *owner {
                return Err(format!("signature {index} is not from the note owner"));
            }
        }

        let nullifiers = input_nullifiers(state, &public.input_commitments)?;
        let existing = public.output_commitments.iter().find(|c| state.notes.contains(*c));
        if let Some(existing) = existing {
            return Err(format!("output note {existing} already exists"));
        }

        let owner = public.public_owner;
        let amount = public.public_value.unsigned_abs();
        if public.public_value < 0 {
            let approved = state.proof_approvals.get(&(owner, hash)).copied().unwrap_or(0);
            let allowance = state.allowances.get(&(owner, self.config.ace)).copied().unwrap_or(0);
            let balance = state.balances.get(&owner).copied().unwrap_or(0);
            if approved < amount {
                return Err("deposit not approved for this proof".into());
            }
            if allowance < amount {
                return Err("token allowance too low".into());
            }
            if balance < amount {
                return Err("insufficient public balance".into());
            }
            state.proof_approvals.remove(&(owner, hash));
            state.allowances.insert((owner, self.config.ace), allowance - amount);
            state.balances.insert(owner, balance - amount);
        } else if public.public_value > 0 {
            let balance = state.balances.get(&owner).copied().unwrap_or(0);
            let credited = balance
                .checked_add(amount)
                .ok_or_else(|| String::from("public balance overflow"))?;
            state.balances.insert(owner, credited);
        }

        for (commitment, nullifier) in public.input_commitments.iter().zip(nullifiers) {
            state.notes.remove(commitment);
            state.nullifiers.insert(nullifier);
        }
        state.notes.extend(verified.output_notes.iter().map(|note| note.commitment()));
        debug!(%hash, "applied join-split");
        Ok(())
    }
}

/// Nullifiers of the inputs of one transfer.
///
/// Each input must be a live note whose nullifier is neither recorded nor
/// repeated within the transfer.
fn input_nullifiers(state: &LedgerState, commitments: &[B256]) -> Result<Vec<B256>, String> {
    let mut fresh = HashSet::with_capacity(commitments.len());
    commitments
        .iter()
        .map(|commitment| {
            if !state.notes.contains(commitment) {
                return Err(format!("input note {commitment} does not exist"));
            }
            let nullifier = note_nullifier(commitment).map_err(|e| e.to_string())?;
            if state.nullifiers.contains(&nullifier) {
                return Err(format!("input note {commitment} already spent"));
            }
            if !fresh.insert(nullifier) {
                return Err(format!("input note {commitment} spent twice in one transfer"));
            }
            Ok(nullifier)
        })
        .collect()
}

#[async_trait]
impl SubmissionClient for LocalLedger {
    async fn mint(&self, to: Address, value: u64) -> Result<(), SubmissionError> {
        let mut state = self.state.lock().await;
        let balance = state.balances.entry(to).or_default();
        *balance = balance
            .checked_add(value)
            .ok_or_else(|| SubmissionError::Rejected("balance overflow".into()))?;
        info!(%to, value, "minted public tokens");
        Ok(())
    }

    async fn balance_of(&self, owner: Address) -> Result<u64, SubmissionError> {
        Ok(self.state.lock().await.balances.get(&owner).copied().unwrap_or(0))
    }

    async fn approve(
        &self,
        owner: Address,
        spender: Address,
        value: u64,
    ) -> Result<(), SubmissionError> {
        self.state.lock().await.allowances.insert((owner, spender), value);
        debug!(%owner, %spender, value, "approved spender");
        Ok(())
    }

    async fn public_approve(
        &self,
        owner: Address,
        registry: Address,
        proof_hash: B256,
        value: u64,
    ) -> Result<(), SubmissionError> {
        if registry != self.config.zk_asset {
            return Err(SubmissionError::Rejected(format!("unknown note registry {registry}")));
        }
        self.state.lock().await.proof_approvals.insert((owner, proof_hash), value);
        debug!(%owner, %proof_hash, value, "approved public value for proof");
        Ok(())
    }

    async fn confidential_transfer(
        &self,
        sender: Address,
        proof_data: Bytes,
        signatures: Bytes,
    ) -> Result<TransactionHandle, SubmissionError> {
        let calldata = abi::encode_transfer_call(proof_data.clone(), signatures.clone());
        let (tx_hash, outcome) = {
            let mut state = self.state.lock().await;
            state.nonce += 1;
            let mut preimage = calldata.to_vec();
            preimage.extend_from_slice(&state.nonce.to_be_bytes());
            let tx_hash = keccak256(preimage);
            let outcome = match self.execute(&mut state, sender, &proof_data, &signatures) {
                Ok(()) => TxOutcome::Confirmed,
                Err(reason) => {
                    warn!(%tx_hash, %reason, "confidential transfer reverted");
                    TxOutcome::Reverted { reason }
                }
            };
            (tx_hash, outcome)
        };

        let (handle, completer) = TransactionHandle::channel(tx_hash);
        let block_time = self.block_time;
        tokio::spawn(async move {
            tokio::time::sleep(block_time).await;
            let _ = completer.send(outcome);
        });
        Ok(handle)
    }
}
