//! AI generation: completion backend client, conversation state and the
//! streaming coordinator that relays completions to the interactive surface.

pub mod backend;
pub mod conversation;
pub mod coordinator;
pub mod prompts;
pub mod reasoning;

pub use backend::{CompletionBackend, OPENROUTER_BASE_URL, OpenRouterBackend};
pub use conversation::{Conversation, Role, Turn};
pub use coordinator::{GenerationHandle, GenerationPool, StreamUpdate};
pub use reasoning::split_reasoning;
