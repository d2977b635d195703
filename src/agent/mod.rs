//! 对话层：应答协作方、Prompt 构建、打断协调器

pub mod coordinator;
pub mod prompt;
pub mod responder;

pub use coordinator::{InterruptOutcome, Interruption, InterruptionCoordinator};
pub use responder::{LlmResponder, Reply, Responder, ResponseContext};
