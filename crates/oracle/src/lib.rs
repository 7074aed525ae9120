pub mod adapter;
pub mod clock;
pub mod feed;

pub use adapter::{OracleAdapter, OracleSettings};
pub use clock::{Clock, ManualClock, SystemClock};
pub use feed::{MockAggregator, PriceFeed};
