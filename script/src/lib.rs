//! zkasset Script Library
//!
//! Client-side tooling around the join-split engine:
//!
//! - Accounts derived from mnemonics, seeds or private keys
//! - An in-process ledger standing in for the token and zk asset contracts
//! - The mint, deposit, transfer and withdraw demo
//! - CLI subcommands

pub mod account;
pub mod commands;
pub mod demo;
pub mod ledger;

pub use account::Account;
pub use demo::{Demo, DemoAmounts, DemoTranscript, StepRecord};
pub use ledger::LocalLedger;
