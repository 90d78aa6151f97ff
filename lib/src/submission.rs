//! Submission interface.
//!
//! The engine never talks to a chain itself. A [`SubmissionClient`] moves
//! public tokens, grants approvals and submits join-splits; confirmation
//! arrives later through a [`TransactionHandle`].

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::SubmissionError;

/// Final outcome of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed,
    Reverted { reason: String },
}

/// Pending transaction. Resolves once the ledger settles it.
#[derive(Debug)]
pub struct TransactionHandle {
    tx_hash: B256,
    outcome: oneshot::Receiver<TxOutcome>,
}

impl TransactionHandle {
    /// A handle and the sender the client completes it with.
    pub fn channel(tx_hash: B256) -> (Self, oneshot::Sender<TxOutcome>) {
        let (sender, outcome) = oneshot::channel();
        (Self { tx_hash, outcome }, sender)
    }

    /// A handle for a transaction whose outcome is already known.
    pub fn settled(tx_hash: B256, outcome: TxOutcome) -> Self {
        let (handle, sender) = Self::channel(tx_hash);
        // The receiver is alive in `handle`, so the send cannot fail.
        let _ = sender.send(outcome);
        handle
    }

    pub fn tx_hash(&self) -> B256 {
        self.tx_hash
    }

    /// Wait for the outcome without blocking the runtime.
    pub async fn wait(self) -> Result<TxOutcome, SubmissionError> {
        self.outcome.await.map_err(|_| SubmissionError::Dropped)
    }
}

/// Access to the token, approval and zk asset contracts.
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    /// Mint public tokens to `to`.
    async fn mint(&self, to: Address, value: u64) -> Result<(), SubmissionError>;

    /// Public token balance of `owner`.
    async fn balance_of(&self, owner: Address) -> Result<u64, SubmissionError>;

    /// ERC-20 approval of `spender` by `owner`.
    async fn approve(
        &self,
        owner: Address,
        spender: Address,
        value: u64,
    ) -> Result<(), SubmissionError>;

    /// Allow the note registry of `registry` to move `value` public tokens
    /// of `owner` for the proof `proof_hash`.
    async fn public_approve(
        &self,
        owner: Address,
        registry: Address,
        proof_hash: B256,
        value: u64,
    ) -> Result<(), SubmissionError>;

    /// Submit `confidentialTransfer(proof_data, signatures)` from `sender`.
    async fn confidential_transfer(
        &self,
        sender: Address,
        proof_data: Bytes,
        signatures: Bytes,
    ) -> Result<TransactionHandle, SubmissionError>;
}
