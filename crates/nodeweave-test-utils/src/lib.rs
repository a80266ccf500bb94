//! Fakes for every collaborator capability, plus filesystem fixtures.

mod fixtures;
mod llm;
mod processor;
mod store;

pub use fixtures::{temp_dir_with, write_files};
pub use llm::{FailingLlm, RecordingLlm};
pub use processor::{FailingProcessor, StubProcessor};
pub use store::{AddCall, RecordingStore};
