pub mod common;
pub mod error;
pub mod execution;
pub mod pool;
pub mod quote;
pub mod snapshot;

pub use common::*;
pub use error::*;
pub use execution::*;
pub use pool::*;
pub use quote::*;
pub use snapshot::*;
