pub mod extract;
pub mod loader;
pub mod store;

pub use extract::ContentExtractor;
pub use loader::load_documents_from_directory;
pub use store::SqliteDocumentStore;
