//! Key/account provider.
//!
//! Thin adapter over alloy's local signers: an account is an address plus
//! the key that signs spend authorisations for notes owned by it.

use alloy::primitives::{keccak256, Address};
use alloy::signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};
use anyhow::{Context, Result};

/// An account able to own and spend notes.
#[derive(Debug, Clone)]
pub struct Account {
    address: Address,
    signer: PrivateKeySigner,
}

impl Account {
    /// Derive the first account (`m/44'/60'/0'/0/0`) of a BIP-39 mnemonic.
    ///
    /// # Arguments
    /// * `phrase` - English mnemonic phrase
    ///
    /// # Returns
    /// * The account, or an error if the phrase is not a valid mnemonic
    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(phrase.trim())
            .index(0)?
            .build()
            .context("invalid mnemonic")?;
        Ok(Self::from_signer(signer))
    }

    /// Deterministic account from an arbitrary seed, for local runs.
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let signer = PrivateKeySigner::from_bytes(&keccak256(seed))
            .context("seed does not give a valid key")?;
        Ok(Self::from_signer(signer))
    }

    /// Account from a hex private key, with or without `0x`.
    pub fn from_private_key(key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = key.trim().parse().context("invalid private key")?;
        Ok(Self::from_signer(signer))
    }

    pub fn random() -> Self {
        Self::from_signer(PrivateKeySigner::random())
    }

    fn from_signer(signer: PrivateKeySigner) -> Self {
        Self {
            address: signer.address(),
            signer,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hardhat/anvil default mnemonic and its first account.
    const MNEMONIC: &str = "test test test test test test test test test test test junk";
    const FIRST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const FIRST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_from_mnemonic() {
        let account = Account::from_mnemonic(MNEMONIC).unwrap();
        assert_eq!(account.address(), FIRST_ADDRESS.parse::<Address>().unwrap());
        assert_eq!(account.signer().address(), account.address());
    }

    #[test]
    fn test_from_private_key() {
        let account = Account::from_private_key(FIRST_KEY).unwrap();
        assert_eq!(account.address(), FIRST_ADDRESS.parse::<Address>().unwrap());
        assert!(Account::from_private_key("0x1234").is_err());
    }

    #[test]
    fn test_from_seed_is_deterministic() {
        let a = Account::from_seed(b"bob").unwrap();
        let b = Account::from_seed(b"bob").unwrap();
        let c = Account::from_seed(b"alice").unwrap();
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
    }

    #[test]
    fn test_invalid_mnemonic() {
        assert!(Account::from_mnemonic("not a mnemonic").is_err());
    }
}
