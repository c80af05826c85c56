//! Per-cell generation: prompt construction, validation, and the walk
//! over the retry/fallback attempt plan.
//!
//! State machine per task: Pending → InFlight → {Succeeded, Failed}.
//! A Failed task returns a sentinel outcome, never an error — one bad
//! cell must not disturb its batch — and its key is never checkpointed,
//! so the next run re-discovers it.

use crate::client::{ApiClient, Complete, Message, ModelChoice, RetryPolicy};
use crate::models::{
    ApiError, GenerationOutcome, GlossfillError, ModelSpec, PipelineConfig, Result, Task,
};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are a glossary content assistant.";

/// Seam between the dispatcher and per-cell generation.
pub trait Generate: Send + Sync {
    fn generate<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, GenerationOutcome>;
}

/// Generation client: one call fills (or definitively fails) one cell.
pub struct GenerationClient<C = ApiClient> {
    api: Arc<C>,
    policy: RetryPolicy,
    primary: ModelSpec,
    fallback: ModelSpec,
    min_content_len: usize,
}

impl<C: Complete> GenerationClient<C> {
    pub fn new(api: Arc<C>, config: &PipelineConfig) -> Self {
        Self {
            api,
            policy: RetryPolicy::new(
                config.max_retries,
                Duration::from_secs(config.retry_delay_secs),
            ),
            primary: config.primary_model.clone(),
            fallback: config.fallback_model.clone(),
            min_content_len: config.min_content_len,
        }
    }

    /// Deterministic prompt for one (term, section) pair.
    fn build_prompt(term: &str, section: &str) -> String {
        format!(
            "For the term \"{term}\", write only the content for this section:\n\n\
             \"{section}\"\n\n\
             Do not include any extra headings or formatting, just the prose, \
             concise enough to fit in one spreadsheet cell."
        )
    }

    /// Trim and length-check generated content.
    fn validate(&self, content: &str) -> Result<String> {
        let trimmed = content.trim();
        if trimmed.len() <= self.min_content_len {
            return Err(GlossfillError::Api(ApiError::ContentTooShort {
                len: trimmed.len(),
                min: self.min_content_len,
            }));
        }
        Ok(trimmed.to_string())
    }

    async fn try_once(&self, model: &ModelSpec, task: &Task) -> Result<String> {
        let messages = vec![
            Message::system(SYSTEM_PROMPT),
            Message::user(Self::build_prompt(&task.term, &task.section)),
        ];
        let response = self.api.complete(model, messages).await?;
        self.validate(&response.content)
    }

    /// Fill one cell, walking the attempt plan until a validated response
    /// or terminal failure.
    pub async fn generate_cell(&self, task: &Task) -> GenerationOutcome {
        for attempt in self.policy.plan() {
            if attempt.delay > Duration::ZERO {
                tokio::time::sleep(attempt.delay).await;
            }

            let model = match attempt.model {
                ModelChoice::Primary => &self.primary,
                ModelChoice::Fallback => &self.fallback,
            };

            match self.try_once(model, task).await {
                Ok(content) => {
                    debug!(
                        row = task.key.row,
                        col = task.key.col,
                        term = %task.term,
                        model = %model.id,
                        attempt = attempt.number,
                        chars = content.len(),
                        "Cell generated"
                    );
                    return GenerationOutcome::Generated {
                        content,
                        model: model.id.clone(),
                    };
                }
                Err(e) => {
                    warn!(
                        row = task.key.row,
                        col = task.key.col,
                        term = %task.term,
                        model = %model.id,
                        attempt = attempt.number,
                        error = %e,
                        "Generation attempt failed"
                    );
                    if !e.is_retryable() {
                        break;
                    }
                }
            }
        }

        warn!(
            row = task.key.row,
            col = task.key.col,
            term = %task.term,
            "All attempts exhausted, leaving cell empty"
        );
        GenerationOutcome::Failed
    }
}

impl<C: Complete + 'static> Generate for GenerationClient<C> {
    fn generate<'a>(&'a self, task: &'a Task) -> BoxFuture<'a, GenerationOutcome> {
        Box::pin(self.generate_cell(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CompletionResponse;
    use crate::models::CellKey;
    use std::sync::Mutex;

    /// Scripted wire: records which model served each call and replays a
    /// fixed response per model.
    struct ScriptedApi {
        calls: Mutex<Vec<String>>,
        respond: fn(&ModelSpec) -> Result<CompletionResponse>,
    }

    impl ScriptedApi {
        fn new(respond: fn(&ModelSpec) -> Result<CompletionResponse>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                respond,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Complete for ScriptedApi {
        fn complete<'a>(
            &'a self,
            model: &'a ModelSpec,
            _messages: Vec<Message>,
        ) -> BoxFuture<'a, Result<CompletionResponse>> {
            self.calls.lock().unwrap().push(model.id.clone());
            let result = (self.respond)(model);
            Box::pin(async move { result })
        }
    }

    fn ok_response(model: &ModelSpec, content: &str) -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            content: content.to_string(),
            model: model.id.clone(),
            duration: Duration::from_millis(5),
        })
    }

    fn task() -> Task {
        Task {
            key: CellKey::new(1, 1),
            term: "Alpha".to_string(),
            section: "definition".to_string(),
        }
    }

    fn client(api: Arc<ScriptedApi>) -> GenerationClient<ScriptedApi> {
        GenerationClient::new(api, &PipelineConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_on_total_failure() {
        let api = Arc::new(ScriptedApi::new(|_| {
            Err(GlossfillError::Timeout(Duration::from_secs(60)))
        }));
        let outcome = client(Arc::clone(&api)).generate_cell(&task()).await;

        assert_eq!(outcome, GenerationOutcome::Failed);
        // Exactly max_retries primary attempts, then exactly one fallback
        assert_eq!(
            api.calls(),
            vec!["gpt-4.1-nano", "gpt-4.1-nano", "gpt-4.1-nano", "gpt-3.5-turbo"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_content_counts_as_failure() {
        let api = Arc::new(ScriptedApi::new(|m| ok_response(m, "too short")));
        let outcome = client(Arc::clone(&api)).generate_cell(&task()).await;

        assert_eq!(outcome, GenerationOutcome::Failed);
        assert_eq!(api.calls().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_short_circuits() {
        let api = Arc::new(ScriptedApi::new(|m| {
            ok_response(m, "a perfectly reasonable definition")
        }));
        let outcome = client(Arc::clone(&api)).generate_cell(&task()).await;

        match outcome {
            GenerationOutcome::Generated { content, model } => {
                assert_eq!(content, "a perfectly reasonable definition");
                assert_eq!(model, "gpt-4.1-nano");
            }
            GenerationOutcome::Failed => panic!("expected success"),
        }
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_stops_early() {
        let api = Arc::new(ScriptedApi::new(|_| {
            Err(GlossfillError::Api(ApiError::AuthenticationFailed))
        }));
        let outcome = client(Arc::clone(&api)).generate_cell(&task()).await;

        assert_eq!(outcome, GenerationOutcome::Failed);
        // Retrying a bad credential would only repeat the 401
        assert_eq!(api.calls().len(), 1);
    }
}
