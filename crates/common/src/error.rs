use alloy::primitives::{Address, I256, U256};
use thiserror::Error;

/// Failures raised while reading or validating a price feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("Stale price from feed {feed}: updated at {updated_at}, now {now}")]
    StalePrice {
        feed: Address,
        updated_at: u64,
        now: u64,
    },

    #[error("Invalid price {answer} from feed {feed}")]
    InvalidPrice { feed: Address, answer: I256 },

    #[error("Unknown round {round_id} on feed {feed}")]
    UnknownRound { feed: Address, round_id: u128 },

    #[error("Feed {feed} unavailable: {reason}")]
    FeedUnavailable { feed: Address, reason: String },

    #[error("Unsupported feed precision: {0} decimals")]
    UnsupportedDecimals(u8),
}

/// Failures raised by a fungible asset ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Amount must be more than zero")]
    MustBeMoreThanZero,

    #[error("Zero address not allowed")]
    ZeroAddress,

    #[error("Insufficient balance for {owner}: have {balance}, need {needed}")]
    InsufficientBalance {
        owner: Address,
        balance: U256,
        needed: U256,
    },

    #[error("Insufficient allowance from {owner} to {spender}: have {allowance}, need {needed}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: U256,
        needed: U256,
    },

    #[error("Burn amount {amount} exceeds balance {balance}")]
    BurnAmountExceedsBalance { balance: U256, amount: U256 },

    #[error("Caller is not the mint authority of {token}")]
    Unauthorized { token: Address },

    #[error("Token arithmetic overflow")]
    Overflow,
}

/// Errors returned by the solvency engine. Every error aborts the whole
/// operation; no partial effect is ever committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Amount must be more than zero")]
    NeedsMoreThanZero,

    #[error("At least one collateral type is required")]
    EmptyCollateralConfig,

    #[error("Token and price feed lists differ in length: {tokens} tokens, {price_feeds} feeds")]
    ConfigLengthMismatch { tokens: usize, price_feeds: usize },

    #[error("Collateral {0} registered more than once")]
    DuplicateCollateral(Address),

    #[error("Feed {feed} reports {actual} decimals, expected {expected}")]
    FeedDecimalsMismatch {
        feed: Address,
        expected: u8,
        actual: u8,
    },

    #[error("Mint authority was not issued for this engine and stablecoin")]
    AuthorityMismatch,

    #[error("Token {0} is not allowed as collateral")]
    NotAllowedToken(Address),

    #[error("Health factor broken: {0}")]
    HealthFactorBroken(U256),

    #[error("Health factor ok: {0}")]
    HealthFactorOk(U256),

    #[error("Health factor not improved: before {before}, after {after}")]
    HealthFactorNotImproved { before: U256, after: U256 },

    #[error("Insufficient collateral {asset} for {user}: deposited {deposited}, requested {requested}")]
    InsufficientCollateral {
        user: Address,
        asset: Address,
        deposited: U256,
        requested: U256,
    },

    #[error("Insufficient debt for {user}: minted {minted}, requested {requested}")]
    InsufficientDebt {
        user: Address,
        minted: U256,
        requested: U256,
    },

    #[error("Transfer of {asset} failed")]
    TransferFailed { asset: Address },

    #[error("Mint failed")]
    MintFailed,

    #[error("Reentrant call rejected")]
    ReentrantCall,

    #[error("Arithmetic overflow")]
    Overflow,

    /// The operation failed and some of its completed interactions could not
    /// be undone. Their tokens are still in custody.
    #[error("{cause}; {} compensating transfer(s) failed during rollback", .stranded.len())]
    RollbackIncomplete {
        cause: Box<EngineError>,
        stranded: Vec<EngineError>,
    },

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Token(#[from] TokenError),
}
