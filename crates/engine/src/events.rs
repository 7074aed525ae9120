//! Events emitted by the engine, in EVM log form.
//!
//! Topics and data follow the Solidity ABI so the log can be consumed by the
//! same tooling as on-chain logs. Events are only recorded once the emitting
//! operation has committed.

use alloy::sol;

sol! {
    event CollateralDeposited(address indexed user, address indexed token, uint256 indexed amount);

    event CollateralRedeemed(
        address indexed redeemed_from,
        address indexed redeemed_to,
        address indexed token,
        uint256 amount
    );

    event DscMinted(address indexed user, uint256 amount);

    event DscBurned(address indexed on_behalf_of, address indexed dsc_from, uint256 amount);
}
