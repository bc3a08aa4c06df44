use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_INPUT_RESOLUTION, DEFAULT_K_RETRIEVAL, DEFAULT_MAX_NEW_TOKENS,
    DEFAULT_MAX_PATCHES_PER_CLASS, DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
};
use crate::patch::SourceImage;
use crate::pipeline::{InferenceRequest, InferenceResult, ServiceSettings};
use crate::reasoning::SamplingParams;
use crate::retrieval::{ClassScores, EvidenceSummary};

/// Body of `POST /ragvision/invocations`. Omitted tuning fields take server defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    /// Base64 image, optionally with a `data:` URI prefix.
    pub encoded_image: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub k_retrieval: Option<usize>,
    pub max_patches_per_class: Option<usize>,
    pub max_new_tokens: Option<u32>,
    pub input_resolution: Option<u32>,
    pub support_res: Option<u32>,
    pub support_patch_size: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl InvocationRequest {
    /// Resolves defaults against the service's support geometry. `image` is the decoded
    /// `encoded_image`.
    pub fn into_inference(self, image: SourceImage, settings: &ServiceSettings) -> InferenceRequest {
        InferenceRequest {
            system_prompt: self.system_prompt,
            user_prompt: self.user_prompt,
            query_image: image,
            sampling: SamplingParams {
                temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                top_p: self.top_p.unwrap_or(DEFAULT_TOP_P),
                max_new_tokens: self.max_new_tokens.unwrap_or(DEFAULT_MAX_NEW_TOKENS),
            },
            k: self.k_retrieval.unwrap_or(DEFAULT_K_RETRIEVAL),
            max_patches_per_class: self
                .max_patches_per_class
                .unwrap_or(DEFAULT_MAX_PATCHES_PER_CLASS),
            input_resolution: self.input_resolution.unwrap_or(DEFAULT_INPUT_RESOLUTION),
            support_resolution: self.support_res.unwrap_or(settings.support_resolution),
            support_patch_size: self.support_patch_size.unwrap_or(settings.support_patch_size),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub success: bool,
    /// Per-request id.
    pub image_id: String,
    /// Content hash of the decoded query image.
    pub image_hash: String,
    pub flag: String,
    /// `recognized` or `default`.
    pub flag_source: &'static str,
    pub explanation: String,
    pub class_scores: ClassScores,
    pub raw_response: String,
    pub original_size: OriginalSize,
    pub evidence: Vec<EvidenceSummary>,
    pub elapsed_time_ms: u64,
}

impl From<InferenceResult> for InvocationResponse {
    fn from(result: InferenceResult) -> Self {
        Self {
            success: true,
            image_id: result.request_id.to_string(),
            image_hash: result.image_id,
            flag: result.decision.label().to_string(),
            flag_source: result.decision.source().as_str(),
            explanation: result.explanation,
            class_scores: result.class_scores,
            raw_response: result.raw_response,
            original_size: OriginalSize {
                width: result.original_size.0,
                height: result.original_size.1,
            },
            evidence: result.evidence,
            elapsed_time_ms: result.elapsed.as_millis() as u64,
        }
    }
}

/// Body of `POST /support/upload/image`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportUploadRequest {
    pub class_name: String,
    /// Every class the client knows about; must contain `class_name`.
    pub classes: Vec<String>,
    /// Upload position; `0` clears the support set first.
    pub index: u32,
    pub encoded_image: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportUploadResponse {
    pub success: bool,
    pub class_name: String,
    pub index: u32,
    pub patches: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub total_entries: usize,
    /// File written under the support root, when persistence is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}
