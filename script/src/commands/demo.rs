use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use zkasset_lib::{EngineConfig, JoinSplitEngine, NoteStore};

use crate::account::Account;
use crate::demo::{Demo, DemoAmounts, StepRecord};
use crate::ledger::LocalLedger;

/// Run the mint, deposit, transfer and withdraw scenario against a local ledger
#[derive(Args, Debug)]
pub struct DemoCommand {
    /// Bob's mnemonic (a deterministic local account is used if unset)
    #[arg(long, env = "BOB_MNEMONIC", hide_env_values = true)]
    pub bob_mnemonic: Option<String>,

    /// Alice's mnemonic (a deterministic local account is used if unset)
    #[arg(long, env = "ALICE_MNEMONIC", hide_env_values = true)]
    pub alice_mnemonic: Option<String>,

    /// Chain id used in the signature domain
    #[arg(long, env = "ZKASSET_CHAIN_ID", default_value_t = zkasset_lib::config::DEFAULT_CHAIN_ID)]
    pub chain_id: u64,

    /// Largest number of notes on either side of a join-split
    #[arg(
        long,
        env = "ZKASSET_MAX_NOTES",
        default_value_t = zkasset_lib::config::DEFAULT_MAX_NOTES
    )]
    pub max_notes: usize,

    /// Public tokens minted to Bob
    #[arg(long, default_value_t = 200_000)]
    pub mint: u64,

    /// Public tokens Bob deposits into a note
    #[arg(long, default_value_t = 100_000)]
    pub deposit: u64,

    /// Part of the deposit Bob keeps
    #[arg(long, default_value_t = 20_000)]
    pub bob_keeps: u64,

    /// Part of the deposit sent to Alice
    #[arg(long, default_value_t = 80_000)]
    pub alice_receives: u64,

    /// Public tokens Alice withdraws
    #[arg(long, short = 'w', default_value_t = 10_000)]
    pub withdraw: u64,

    /// Simulated block time of the local ledger in milliseconds
    #[arg(long, default_value_t = 250)]
    pub block_time_ms: u64,

    /// Where to write the run transcript
    #[arg(long, short = 'o', default_value = "demo.json")]
    pub output: PathBuf,

    /// Also save the note store (contains note openings)
    #[arg(long)]
    pub notes: Option<PathBuf>,

    /// Skip confirmation prompts
    #[arg(long, short = 'y')]
    pub yes: bool,
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.magenta} {msg}")?,
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn load_account(name: &str, mnemonic: Option<&str>) -> Result<Account> {
    match mnemonic {
        Some(phrase) => Account::from_mnemonic(phrase),
        None => {
            println!(
                "{} {}",
                "⚠️".bright_yellow(),
                format!("No mnemonic for {name}, using a deterministic local account")
                    .bright_yellow()
            );
            Account::from_seed(name.as_bytes())
        }
    }
}

fn print_step(record: &StepRecord) {
    println!(
        "   {} {}",
        "proof hash:".bright_white(),
        record.proof_hash.to_string().bright_cyan()
    );
    println!(
        "   {} {}",
        "tx hash:   ".bright_white(),
        record.tx_hash.to_string().bright_black()
    );
}

impl DemoCommand {
    fn amounts(&self) -> DemoAmounts {
        DemoAmounts {
            mint: self.mint,
            deposit: self.deposit,
            bob_keeps: self.bob_keeps,
            alice_receives: self.alice_receives,
            withdraw: self.withdraw,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        println!("{}", "🛡️  zkasset - Join-Split Demo".bright_magenta().bold());
        println!("{}", "═".repeat(50).bright_black());
        println!();

        let amounts = self.amounts();
        amounts.validate()?;

        let bob = load_account("bob", self.bob_mnemonic.as_deref())?;
        let alice = load_account("alice", self.alice_mnemonic.as_deref())?;

        let config = EngineConfig::default()
            .with_chain_id(self.chain_id)
            .with_max_notes(self.max_notes);

        println!();
        println!("{}", "📋 Demo Details".bright_green().bold());
        println!("{}", "─".repeat(35).bright_black());
        println!("{} {}", "Bob:".bright_white(), bob.address().to_string().bright_cyan());
        println!("{} {}", "Alice:".bright_white(), alice.address().to_string().bright_cyan());
        println!("{} {}", "Chain id:".bright_white(), config.chain_id);
        println!("{} {}", "zk asset:".bright_white(), config.zk_asset.to_string().bright_cyan());
        println!(
            "{} mint {}, deposit {}, split {} / {}, withdraw {}",
            "Amounts:".bright_white(),
            amounts.mint,
            amounts.deposit,
            amounts.bob_keeps,
            amounts.alice_receives,
            amounts.withdraw
        );

        if !self.yes {
            println!();
            let confirmed = Confirm::new()
                .with_prompt(format!("{} Run the demo?", "⚠️".bright_yellow()))
                .default(true)
                .interact()?;
            if !confirmed {
                println!("{} Operation cancelled by user", "🚫".bright_red());
                return Ok(());
            }
        }

        let store = Arc::new(NoteStore::new());
        let engine = JoinSplitEngine::new(config.clone(), Arc::clone(&store));
        let ledger =
            LocalLedger::new(config).with_block_time(Duration::from_millis(self.block_time_ms));
        let mut demo = Demo::new(&engine, &ledger, &bob, &alice, amounts)?;

        println!();
        let pb = spinner("Minting public tokens to Bob...")?;
        demo.mint()
            .await
            .inspect_err(|_| pb.abandon_with_message("❌ Mint failed"))?;
        pb.finish_with_message(format!("✅ Minted {} public tokens to Bob", amounts.mint));

        let pb = spinner("Depositing into a note (building proof)...")?;
        let record = demo
            .deposit()
            .await
            .inspect_err(|_| pb.abandon_with_message("❌ Deposit failed"))?;
        pb.finish_with_message(format!("✅ Deposited {} into Bob's note", amounts.deposit));
        print_step(&record);

        let pb = spinner("Splitting Bob's note between Bob and Alice...")?;
        let record = demo
            .split()
            .await
            .inspect_err(|_| pb.abandon_with_message("❌ Split failed"))?;
        pb.finish_with_message(format!(
            "✅ Split into {} (Bob) and {} (Alice)",
            amounts.bob_keeps, amounts.alice_receives
        ));
        print_step(&record);

        let pb = spinner("Withdrawing from Alice's note...")?;
        let record = demo
            .withdraw()
            .await
            .inspect_err(|_| pb.abandon_with_message("❌ Withdraw failed"))?;
        pb.finish_with_message(format!(
            "✅ Alice withdrew {} and kept {} in a change note",
            amounts.withdraw,
            amounts.alice_receives - amounts.withdraw
        ));
        print_step(&record);

        let transcript = demo.transcript().await?;
        transcript.save(&self.output)?;
        if let Some(path) = &self.notes {
            store.save(path)?;
        }

        println!();
        println!("{}", "📊 Final State".bright_blue().bold());
        println!("{}", "─".repeat(35).bright_black());
        println!(
            "{} {}",
            "Bob public balance:".bright_white(),
            transcript.bob_public_balance.to_string().bright_green()
        );
        println!(
            "{} {}",
            "Alice public balance:".bright_white(),
            transcript.alice_public_balance.to_string().bright_green()
        );
        println!(
            "{} {}",
            "Live notes:".bright_white(),
            transcript.live_notes.to_string().bright_green()
        );
        println!();
        println!(
            "{} {}",
            "💾".bright_blue(),
            format!("Transcript saved to '{}'", self.output.display()).bright_blue()
        );
        Ok(())
    }
}
