pub mod swap_engine;

pub use swap_engine::{EngineStats, SwapEngine, SwapEngineBuilder};
