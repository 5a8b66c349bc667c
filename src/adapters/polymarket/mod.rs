pub mod chain;
pub mod contracts;
pub mod positions;

pub use chain::{AlloyChain, ChainClient};
pub use positions::PositionsClient;
