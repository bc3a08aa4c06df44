//! In-process invoker for tests and `RAGVISION_MOCK_PROVIDER` mode.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ReasoningError, ReasoningInvoker, SamplingParams};
use crate::prompt::{PromptPart, PromptRequest};

#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Always return this transcript.
    Fixed(String),
    /// Flag the label of the top-ranked evidence image.
    TopEvidence,
    /// Always fail as an unavailable service.
    Unavailable,
    /// Sleep, then behave like [`MockBehavior::TopEvidence`].
    Delayed(Duration),
}

#[derive(Debug)]
pub struct MockInvoker {
    behavior: MockBehavior,
    calls: AtomicUsize,
}

impl MockInvoker {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fixed(transcript: impl Into<String>) -> Self {
        Self::new(MockBehavior::Fixed(transcript.into()))
    }

    pub fn top_evidence() -> Self {
        Self::new(MockBehavior::TopEvidence)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn top_evidence_transcript(prompt: &PromptRequest) -> String {
    let top = prompt
        .parts()
        .iter()
        .filter_map(|p| match p {
            PromptPart::EvidenceImage { label, rank, .. } => Some((*rank, label)),
            _ => None,
        })
        .min_by_key(|(rank, _)| *rank);

    match top {
        Some((_, label)) => format!(
            "Flag: {}\nExplanation: mock response over {} images; closest reference is {}.",
            label,
            prompt.image_count(),
            label
        ),
        None => format!(
            "Explanation: mock response over {} images; no reference patches.",
            prompt.image_count()
        ),
    }
}

#[async_trait]
impl ReasoningInvoker for MockInvoker {
    async fn generate(
        &self,
        prompt: &PromptRequest,
        params: &SamplingParams,
    ) -> Result<String, ReasoningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        params.validate()?;
        debug!(behavior = ?self.behavior, "Mock reasoning call");

        match &self.behavior {
            MockBehavior::Fixed(text) => Ok(text.clone()),
            MockBehavior::TopEvidence => Ok(top_evidence_transcript(prompt)),
            MockBehavior::Unavailable => Err(ReasoningError::Unavailable {
                reason: "mock invoker configured to fail".to_string(),
            }),
            MockBehavior::Delayed(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(top_evidence_transcript(prompt))
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
