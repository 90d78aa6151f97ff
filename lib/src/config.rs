//! Engine configuration.

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};

/// Default chain: Rinkeby, where the reference contracts were deployed.
pub const DEFAULT_CHAIN_ID: u64 = 4;

/// Default limit on notes per side of a join-split.
pub const DEFAULT_MAX_NOTES: usize = 16;

/// Contract addresses and limits the engine works against.
///
/// Passed explicitly to whatever needs it; there is no global instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub chain_id: u64,
    /// The zk asset contract: verifies join-splits and holds the note registry
    pub zk_asset: Address,
    /// The cryptography engine granting public-value approvals
    pub ace: Address,
    /// The public token backing the zk asset
    pub erc20: Address,
    /// Largest number of notes on either side of a join-split
    pub max_notes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            zk_asset: address!("ae5fEB559F4486730333cabFaa407A9e10c0E874"),
            ace: address!("A3D1E4e451AB20EA33Dc0790b78fb666d66A650D"),
            erc20: address!("aa161FA77204c5fb0199026051ec781E64AD1217"),
            max_notes: DEFAULT_MAX_NOTES,
        }
    }
}

impl EngineConfig {
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_max_notes(mut self, max_notes: usize) -> Self {
        self.max_notes = max_notes;
        self
    }
}
