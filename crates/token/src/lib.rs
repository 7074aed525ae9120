pub mod asset;
pub mod ledger;
pub mod stablecoin;

pub use asset::{FungibleAsset, InMemoryAsset};
pub use stablecoin::{MintAuthority, Stablecoin, SyntheticAsset};
