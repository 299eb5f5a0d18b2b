pub mod audit;
pub mod executor;
pub mod validator;

pub use audit::{AuditLog, InMemoryAuditLog, JsonlAuditLog};
pub use executor::{DefaultSwapExecutor, SwapExecutor};
pub use validator::{DefaultSwapValidator, SwapValidator};
