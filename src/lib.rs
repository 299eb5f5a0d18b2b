#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(unused_must_use)]
pub mod engine;
pub mod execution;
pub mod oracle;
pub mod pool;
pub mod quote;
pub mod types;
pub mod utils;
