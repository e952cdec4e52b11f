use tracing::{debug, info, trace, warn};

use crate::config::Limits;
use crate::error::{ClassifiedError, ErrorKind};
use crate::model::Oracle;
use crate::normalize::preview;
use crate::prompts::{payload_is_too_short, PromptEnvelope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub raw_text: String,
}

/// Single choke point for oracle calls. Performs no retries.
pub struct ModelGateway<O> {
    oracle: O,
    limits: Limits,
}

impl<O: Oracle> ModelGateway<O> {
    pub fn new(oracle: O, limits: Limits) -> Self {
        Self { oracle, limits }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub async fn complete(&self, envelope: &PromptEnvelope) -> Result<CompletionResult, ClassifiedError> {
        let task = envelope.task();
        if !self.oracle.has_credential() {
            warn!(task = task.name(), "no credential configured");
            return Err(ClassifiedError::missing_credential());
        }
        if payload_is_too_short(task, envelope.payload(), &self.limits) {
            return Err(ClassifiedError::empty_input("Input"));
        }

        let prompt = envelope.prompt_text();
        info!(
            task = task.name(),
            structured = task.is_structured(),
            prompt_chars = prompt.chars().count(),
            "sending prompt"
        );
        trace!(preview = %preview(&prompt, 200), "prompt");

        let raw_text = self.oracle.generate(&prompt).await.map_err(|err| {
            let classified = ClassifiedError::from(err);
            warn!(task = task.name(), kind = ?classified.kind, "oracle call failed");
            classified
        })?;

        if raw_text.trim().chars().count() < self.limits.min_output_chars {
            warn!(task = task.name(), "oracle returned an empty or very short response");
            return Err(ClassifiedError::new(
                ErrorKind::EmptyOutput,
                "The model returned an empty or very short response.",
            ));
        }
        debug!(task = task.name(), response_chars = raw_text.chars().count(), "response received");
        Ok(CompletionResult { raw_text })
    }
}
