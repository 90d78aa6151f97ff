use std::path::PathBuf;

use alloy::primitives::Address;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::*;
use zkasset_lib::{
    abi, proof::proof_hash, signature::recover_signer, verify_join_split, EngineConfig,
};

/// Decode and check `confidentialTransfer` calldata
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Calldata as 0x-prefixed hex
    #[arg(long, short = 'c', conflicts_with = "file")]
    pub calldata: Option<String>,

    /// File holding the calldata as hex
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Chain id used in the signature domain
    #[arg(long, env = "ZKASSET_CHAIN_ID", default_value_t = zkasset_lib::config::DEFAULT_CHAIN_ID)]
    pub chain_id: u64,

    /// zk asset contract the signatures must name
    #[arg(long)]
    pub zk_asset: Option<Address>,
}

impl InspectCommand {
    fn read_calldata(&self) -> Result<Vec<u8>> {
        let raw = match (&self.calldata, &self.file) {
            (Some(hex), _) => hex.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?,
            (None, None) => return Err(anyhow!("pass --calldata or --file")),
        };
        let raw = raw.trim();
        Ok(hex::decode(raw.strip_prefix("0x").unwrap_or(raw))?)
    }

    pub async fn execute(&self) -> Result<()> {
        println!("{}", "🔍 zkasset - Inspect Transfer".bright_magenta().bold());
        println!("{}", "═".repeat(50).bright_black());
        println!();

        let mut config = EngineConfig::default().with_chain_id(self.chain_id);
        if let Some(zk_asset) = self.zk_asset {
            config.zk_asset = zk_asset;
        }

        let calldata = self.read_calldata()?;
        let (payload, signatures) = abi::decode_transfer_call(&calldata)?;
        let decoded = abi::decode(&payload)?;
        let public = &decoded.public;
        let hash = proof_hash(public, &decoded.proof_data);

        println!("{}", "📋 Public Inputs".bright_green().bold());
        println!("{}", "─".repeat(35).bright_black());
        println!("{} {}", "Verifier:".bright_white(), decoded.verifier.to_string().bright_cyan());
        println!("{} {}", "Proof hash:".bright_white(), hash.to_string().bright_cyan());
        println!("{} {}", "Public owner:".bright_white(), public.public_owner);
        println!("{} {}", "Public value:".bright_white(), public.public_value);
        println!("{} {}", "Proof owner:".bright_white(), public.proof_owner);
        for commitment in &public.input_commitments {
            println!("{} {}", "Input: ".bright_white(), commitment.to_string().bright_red());
        }
        for commitment in &public.output_commitments {
            println!("{} {}", "Output:".bright_white(), commitment.to_string().bright_green());
        }
        println!();

        let verified = verify_join_split(public, &decoded.proof_data)?;
        println!("{} {}", "✅".bright_green(), "Proof verifies".bright_green());

        let signatures = abi::decode_signatures(&signatures)?;
        if signatures.len() != verified.input_owners.len() {
            return Err(anyhow!(
                "expected {} signatures, found {}",
                verified.input_owners.len(),
                signatures.len()
            ));
        }
        let owners = &verified.input_owners;
        for (index, (signature, owner)) in signatures.iter().zip(owners).enumerate() {
            let signer = recover_signer(signature, hash, config.zk_asset, config.chain_id)?;
            if signer != *owner {
                return Err(anyhow!("signature {index} recovers {signer}, expected owner {owner}"));
            }
            println!(
                "{} Signature {} from {}",
                "✅".bright_green(),
                index,
                signer.to_string().bright_cyan()
            );
        }
        Ok(())
    }
}
