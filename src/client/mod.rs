//! Generation client: HTTP transport, retry/fallback policy, and the
//! per-cell generation wrapper the dispatcher calls.

mod api;
mod generate;
mod retry;

pub use api::{ApiClient, Complete, CompletionResponse, Message};
pub use generate::{Generate, GenerationClient};
pub use retry::{Attempt, ModelChoice, RetryPolicy};
