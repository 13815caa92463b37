pub mod generator;
pub mod openai;
pub mod retry;
pub mod streaming;

pub use generator::ChatGenerator;
pub use openai::OpenAiClient;
pub use retry::RetryPolicy;
