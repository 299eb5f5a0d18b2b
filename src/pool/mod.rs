pub mod model;
pub mod registry;

#[cfg(test)]
mod proptest_properties;

pub use model::LiquidityPool;
pub use registry::{PoolHandle, PoolRegistry, SettlementGuard};
