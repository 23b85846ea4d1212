pub mod ollama;
pub mod openai;
mod translate;

pub use ollama::OllamaChatModel;
pub use openai::OpenAiChatModel;
