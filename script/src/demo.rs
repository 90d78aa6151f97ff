//! The mint → deposit → transfer → withdraw scenario.
//!
//! Bob mints public tokens, deposits part of them into a note, splits that
//! note between himself and Alice, and Alice withdraws part of her note back
//! to a public balance, keeping the rest as a change note. Both parties share
//! one note store, standing in for the off-chain exchange of note openings.

use std::path::Path;

use alloy::primitives::{Address, Bytes, B256};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::info;
use zkasset_lib::{JoinSplitEngine, JoinSplitProof, Note, PreparedTransfer, SubmissionClient};

use crate::account::Account;
use crate::ledger::LocalLedger;

/// Amounts moved by each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DemoAmounts {
    /// Public tokens minted to Bob
    pub mint: u64,
    /// Public tokens Bob deposits into a note
    pub deposit: u64,
    /// Part of the deposit note Bob keeps
    pub bob_keeps: u64,
    /// Part of the deposit note sent to Alice
    pub alice_receives: u64,
    /// Public tokens Alice withdraws from her note
    pub withdraw: u64,
}

impl Default for DemoAmounts {
    fn default() -> Self {
        Self {
            mint: 200_000,
            deposit: 100_000,
            bob_keeps: 20_000,
            alice_receives: 80_000,
            withdraw: 10_000,
        }
    }
}

impl DemoAmounts {
    pub fn validate(&self) -> Result<()> {
        if self.deposit > self.mint {
            return Err(anyhow!("cannot deposit more than was minted"));
        }
        if self.bob_keeps.checked_add(self.alice_receives) != Some(self.deposit) {
            return Err(anyhow!("split amounts must add up to the deposit"));
        }
        if self.withdraw > self.alice_receives {
            return Err(anyhow!("cannot withdraw more than Alice received"));
        }
        Ok(())
    }
}

/// One executed join-split.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: String,
    pub proof_hash: B256,
    pub tx_hash: B256,
    pub public_value: i64,
    pub inputs: Vec<B256>,
    pub outputs: Vec<B256>,
    /// `confidentialTransfer` calldata as submitted
    pub calldata: Bytes,
}

/// Everything the demo did, written to disk by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct DemoTranscript {
    pub bob: Address,
    pub alice: Address,
    pub amounts: DemoAmounts,
    pub steps: Vec<StepRecord>,
    pub bob_public_balance: u64,
    pub alice_public_balance: u64,
    pub live_notes: usize,
}

impl DemoTranscript {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("writing {}", path.as_ref().display()))?;
        Ok(())
    }
}

pub struct Demo<'a> {
    engine: &'a JoinSplitEngine,
    ledger: &'a LocalLedger,
    bob: &'a Account,
    alice: &'a Account,
    amounts: DemoAmounts,
    deposit_note: Option<B256>,
    alice_note: Option<B256>,
    steps: Vec<StepRecord>,
}

impl<'a> Demo<'a> {
    pub fn new(
        engine: &'a JoinSplitEngine,
        ledger: &'a LocalLedger,
        bob: &'a Account,
        alice: &'a Account,
        amounts: DemoAmounts,
    ) -> Result<Self> {
        amounts.validate()?;
        Ok(Self {
            engine,
            ledger,
            bob,
            alice,
            amounts,
            deposit_note: None,
            alice_note: None,
            steps: Vec::new(),
        })
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Mint public tokens to Bob.
    pub async fn mint(&mut self) -> Result<()> {
        self.ledger.mint(self.bob.address(), self.amounts.mint).await?;
        info!(bob = %self.bob.address(), value = self.amounts.mint, "minted to Bob");
        Ok(())
    }

    /// Move Bob's public tokens into a single note.
    pub async fn deposit(&mut self) -> Result<StepRecord> {
        let bob = self.bob.address();
        let value = self.amounts.deposit;
        let note = self.engine.create_note(bob, value)?;
        let commitment = note.commitment();
        let prepared = self.engine.prepare(&[], &[note], bob, -i64::try_from(value)?, &[])?;

        let config = self.engine.config();
        self.ledger.approve(bob, config.ace, value).await?;
        self.ledger
            .public_approve(bob, config.zk_asset, prepared.proof_hash(), value)
            .await?;

        let record = self.execute("deposit", prepared).await?;
        self.deposit_note = Some(commitment);
        Ok(record)
    }

    /// Split Bob's deposit note between Bob and Alice.
    pub async fn split(&mut self) -> Result<StepRecord> {
        let input = self.deposit_note.context("deposit has not run")?;
        let bob = self.bob.address();
        let outputs = [
            self.engine.create_note(bob, self.amounts.bob_keeps)?,
            self.engine.create_note(self.alice.address(), self.amounts.alice_receives)?,
        ];
        let alice_note = outputs[1].commitment();
        let prepared = self
            .engine
            .prepare(&[input], &outputs, bob, 0, &[self.bob.signer().clone()])?;

        let record = self.execute("split", prepared).await?;
        self.alice_note = Some(alice_note);
        Ok(record)
    }

    /// Withdraw part of Alice's note to her public balance.
    pub async fn withdraw(&mut self) -> Result<StepRecord> {
        let input = self.alice_note.context("split has not run")?;
        let alice = self.alice.address();
        let change_value = self.amounts.alice_receives - self.amounts.withdraw;
        let change: Note = self.engine.create_note(alice, change_value)?;
        let prepared = self.engine.prepare(
            &[input],
            &[change],
            alice,
            i64::try_from(self.amounts.withdraw)?,
            &[self.alice.signer().clone()],
        )?;
        self.execute("withdraw", prepared).await
    }

    /// Run every step and summarise the result.
    pub async fn run(mut self) -> Result<DemoTranscript> {
        self.mint().await?;
        self.deposit().await?;
        self.split().await?;
        self.withdraw().await?;
        self.transcript().await
    }

    pub async fn transcript(&self) -> Result<DemoTranscript> {
        Ok(DemoTranscript {
            bob: self.bob.address(),
            alice: self.alice.address(),
            amounts: self.amounts,
            steps: self.steps.clone(),
            bob_public_balance: self.ledger.balance_of(self.bob.address()).await?,
            alice_public_balance: self.ledger.balance_of(self.alice.address()).await?,
            live_notes: self.ledger.note_count().await,
        })
    }

    async fn execute(&mut self, step: &str, prepared: PreparedTransfer) -> Result<StepRecord> {
        let calldata = prepared.calldata();
        let pending = self.engine.submit(self.ledger, prepared).await?;
        let tx_hash = pending.tx_hash();
        let proof = self.engine.settle(pending).await?;
        info!(step, %tx_hash, proof_hash = %proof.proof_hash(), "step confirmed");
        let record = step_record(step, &proof, tx_hash, calldata);
        self.steps.push(record.clone());
        Ok(record)
    }
}

fn step_record(step: &str, proof: &JoinSplitProof, tx_hash: B256, calldata: Bytes) -> StepRecord {
    StepRecord {
        step: step.to_string(),
        proof_hash: proof.proof_hash(),
        tx_hash,
        public_value: proof.public_value(),
        inputs: proof.public_inputs().input_commitments.clone(),
        outputs: proof.public_inputs().output_commitments.clone(),
        calldata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_amounts_are_consistent() {
        DemoAmounts::default().validate().unwrap();
    }

    #[test]
    fn test_inconsistent_amounts_rejected() {
        let amounts = DemoAmounts {
            bob_keeps: 1,
            ..DemoAmounts::default()
        };
        assert!(amounts.validate().is_err());

        let amounts = DemoAmounts {
            withdraw: 90_000,
            ..DemoAmounts::default()
        };
        assert!(amounts.validate().is_err());
    }
}
