//! zkasset CLI - confidential join-split transfers from the terminal
//!
//! This tool allows you to:
//! - Run the mint, deposit, transfer and withdraw scenario on a local ledger
//! - Decode and check `confidentialTransfer` calldata
//!
//! Usage:
//! ```shell
//! # Run the demo with deterministic local accounts
//! cargo run --bin zkasset -- demo --yes
//!
//! # Inspect the calldata of a transfer
//! cargo run --bin zkasset -- inspect --calldata 0x...
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use console::Term;
use std::process;
use tracing_subscriber::EnvFilter;

use zkasset_script::commands::{DemoCommand, InspectCommand};

#[derive(Parser)]
#[command(
    name = "zkasset",
    about = "🛡️ zkasset - Confidential Join-Split Transfers",
    long_about = "zkasset builds, signs and checks confidential join-split transfers.\n\nFeatures:\n• Pedersen note commitments with range and balance proofs\n• EIP-712 spend authorisations from note owners\n• ABI encoded payloads for the zk asset contract\n• Local ledger for end-to-end runs",
    version = "0.1.0"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Do not clear the screen or print the banner
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 🎬 Mint, deposit, transfer and withdraw on a local ledger
    Demo(DemoCommand),
    /// 🔍 Decode and verify confidentialTransfer calldata
    Inspect(InspectCommand),
}

fn print_banner() {
    let term = Term::stdout();
    let _ = term.clear_screen();

    println!(
        "{}",
        r#"
    ███████╗██╗  ██╗ █████╗ ███████╗███████╗███████╗████████╗
    ╚══███╔╝██║ ██╔╝██╔══██╗██╔════╝██╔════╝██╔════╝╚══██╔══╝
      ███╔╝ █████╔╝ ███████║███████╗███████╗█████╗     ██║
     ███╔╝  ██╔═██╗ ██╔══██║╚════██║╚════██║██╔══╝     ██║
    ███████╗██║  ██╗██║  ██║███████║███████║███████╗   ██║
    ╚══════╝╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝╚══════╝╚══════╝   ╚═╝
    "#
        .bright_green()
        .bold()
    );

    println!("{}", "    Confidential Join-Split Transfers".bright_cyan().italic());
    println!(
        "{}",
        "    ═════════════════════════════════════════════".bright_black()
    );
    println!();
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if !cli.quiet {
        print_banner();
    }

    let result = match cli.command {
        Commands::Demo(demo_cmd) => demo_cmd.execute().await,
        Commands::Inspect(inspect_cmd) => inspect_cmd.execute().await,
    };

    match result {
        Ok(_) => {
            println!();
            println!(
                "{} {}",
                "✨".bright_green(),
                "Operation completed successfully!".bright_green().bold()
            );
        }
        Err(e) => {
            println!();
            eprintln!("{} {}", "💥".bright_red(), "Operation failed!".bright_red().bold());
            eprintln!("{} {}", "📋".bright_yellow(), "Error details:".bright_yellow());
            for cause in e.chain() {
                eprintln!("   {}", cause.to_string().bright_red());
            }
            println!();
            eprintln!("{} {}", "💡".bright_blue(), "Tips:".bright_blue().bold());
            eprintln!("   • Mnemonics are read from BOB_MNEMONIC and ALICE_MNEMONIC (or .env)");
            eprintln!("   • Calldata must be hex, with or without 0x");
            eprintln!("   • Run with --verbose for detailed logs");

            process::exit(1);
        }
    }
}
