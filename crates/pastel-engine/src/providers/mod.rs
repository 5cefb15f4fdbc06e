//! Action providers and the dispatch over the closed set of provider kinds.
pub mod ai;
pub mod math;
pub mod text;

use config::Ai;
use pastel_protocol::FailureKind;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub use self::{ai::AiProvider, math::MathProvider};
use crate::{
    command::{Command, Parameters},
    task::{TaskRequest, TaskResult},
};

/// One instance of every provider, selected by a command's parameters.
pub struct ProviderSet {
    /// Arithmetic evaluator with its result cache.
    math: MathProvider,
    /// HTTP client for AI-backed commands.
    ai: AiProvider,
}

impl ProviderSet {
    /// Build the provider set for the given AI settings.
    pub fn new(ai: Ai) -> Self {
        Self {
            math: MathProvider::new(),
            ai: AiProvider::new(ai),
        }
    }

    /// The AI provider.
    pub fn ai(&self) -> &AiProvider {
        &self.ai
    }

    /// Run `command` for `req`. Failures come back as `TaskResult::Failure`.
    pub async fn execute(
        &self,
        command: &Command,
        req: &TaskRequest,
        cancel: &CancellationToken,
    ) -> TaskResult {
        trace!(id = %command.id, kind = %command.provider_kind(), "provider_execute");
        let selection = req.selected_text.as_str();
        match &command.parameters {
            Parameters::Math { source } => self.math.execute(selection, req.query.as_deref(), *source),
            Parameters::Text { transform } => text::execute(selection, *transform),
            Parameters::Ai { prompt } => {
                let task = prompt.as_deref().or(req.query.as_deref()).unwrap_or_default();
                self.ai.execute(task, selection, cancel).await
            }
            Parameters::UserDefined {
                answer: Some(answer),
                ..
            } => TaskResult::single(answer.clone()),
            Parameters::UserDefined {
                query: Some(query),
                answer: None,
            } => self.ai.execute(query, selection, cancel).await,
            Parameters::UserDefined {
                query: None,
                answer: None,
            } => TaskResult::failure(FailureKind::EmptyInput, "Command has no query or answer"),
        }
    }
}
