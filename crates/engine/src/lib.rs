pub mod engine;
pub mod events;
pub mod guard;
pub mod health;
pub mod positions;
pub mod registry;
pub mod tx;

pub use engine::DscEngine;
pub use positions::{InMemoryPositions, Journal, PositionStore};
pub use registry::{CollateralEntry, CollateralRegistry};
