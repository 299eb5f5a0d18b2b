pub mod cache;
pub mod feed;
pub mod refresher;

pub use cache::OracleCache;
pub use feed::{HttpPriceFeed, PriceFeed};
pub use refresher::{OracleRefresher, RefreshStats};
