mod message;
mod openai;
mod traits;

pub use message::{Message, Role};
pub use openai::OpenAiCompatSource;
pub use traits::{CompletionSource, ProviderError, TextStream};
