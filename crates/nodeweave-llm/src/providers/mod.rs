pub mod gemini;
pub mod mock;
pub mod openai;

pub use gemini::GeminiClient;
pub use mock::{CustomLlmClient, MockLlmClient};
pub use openai::OpenAiClient;
