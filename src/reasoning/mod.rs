//! Vision-language model invocation.
//!
//! A [`ReasoningInvoker`] turns an ordered [`PromptRequest`] into a raw transcript. The
//! transcript is opaque text; structure is recovered later by the postprocessor.

mod error;
mod mock;
mod openai;

#[cfg(test)]
mod tests;

pub use error::ReasoningError;
pub use mock::{MockBehavior, MockInvoker};
pub use openai::{OpenAiConfig, OpenAiInvoker};

use async_trait::async_trait;

use crate::prompt::PromptRequest;

/// Decoding parameters forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_new_tokens: u32,
}

impl SamplingParams {
    pub fn validate(&self) -> Result<(), ReasoningError> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ReasoningError::InvalidSampling {
                reason: format!("temperature must be >= 0, got {}", self.temperature),
            });
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(ReasoningError::InvalidSampling {
                reason: format!("top_p must be in (0, 1], got {}", self.top_p),
            });
        }
        if self.max_new_tokens == 0 {
            return Err(ReasoningError::InvalidSampling {
                reason: "max_new_tokens must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Generates a transcript for a multimodal prompt.
///
/// Calls may be non-deterministic (temperature > 0). Dropping the returned future
/// abandons the call.
#[async_trait]
pub trait ReasoningInvoker: Send + Sync + 'static {
    async fn generate(
        &self,
        prompt: &PromptRequest,
        params: &SamplingParams,
    ) -> Result<String, ReasoningError>;

    /// Short backend name for logs and readiness output.
    fn backend_name(&self) -> &'static str;
}
