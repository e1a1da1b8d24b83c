pub mod crawl;
pub mod data;
pub mod diff;
pub mod error;
pub mod history;

pub use data::Database;
pub use error::DataError;
