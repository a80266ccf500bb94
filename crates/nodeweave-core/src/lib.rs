pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{NodeweaveError, Result};
pub use traits::{DocumentProcessor, DocumentStore, LlmClient};
pub use types::*;
