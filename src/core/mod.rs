pub mod binder;
pub mod client;
pub mod limiter;
pub mod parser;
pub mod serializer;
pub mod session;
pub mod store;

pub use crate::domain::model::{BoundQuery, Dataset, ExtractionResult, Record, Schema};
pub use crate::domain::ports::{ConfigProvider, ExtractionService, Storage};
pub use crate::utils::error::Result;
