pub mod book;
pub mod engine;

pub use book::QuoteBook;
pub use engine::{DefaultQuoteEngine, QuoteEngine, get_quote};
