#![doc = include_str!("../README.md")]

pub mod bridge;
pub mod error;
pub mod nft;
pub mod vlan;

#[cfg(test)]
pub(crate) mod testutil;

// --- 주요 타입 re-export ---

pub use bridge::{BridgeManager, BRIDGE_NAME};
pub use error::NetctlError;
pub use nft::{build_command, NftManager, CHAIN_NAME, TABLE_NAME};
pub use vlan::{combine_and_sort_strings, normalize_mask, split_and_add_list, split_vlan_list};
