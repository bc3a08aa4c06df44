//! RagVision library crate (used by the server and integration tests).
//!
//! Retrieval-augmented visual classification: a query image is cut into patches, the
//! patches are matched against a labeled support set, and the best-matching support
//! patches are shown to a vision-language model as evidence.
//!
//! # Public API Surface
//!
//! ## Pipeline
//! - [`VisionRagService`] - inference and support-set management
//! - [`InferenceRequest`], [`InferenceResult`], [`PipelineError`]
//!
//! ## Building Blocks
//! - [`PatchExtractor`], [`SourceImage`] - image decoding and grid patching
//! - [`ClipEmbedder`], [`EmbeddingProvider`] - patch embeddings
//! - [`SupportIndex`], [`LabelSet`] - labeled support entries
//! - [`EvidenceRetriever`], [`ClassScores`] - ranking and class scores
//! - [`PromptAssembler`] - multimodal prompt construction
//! - [`ReasoningInvoker`], [`OpenAiInvoker`], [`MockInvoker`] - model backends
//! - [`ResponsePostprocessor`] - flag extraction from transcripts
//!
//! ## Server
//! - [`Config`] - environment configuration
//! - [`gateway`] - Axum router and handlers

pub mod config;
pub mod constants;
pub mod embedding;
pub mod gateway;
pub mod hashing;
pub mod index;
pub mod patch;
pub mod pipeline;
pub mod postprocess;
pub mod prompt;
pub mod reasoning;
pub mod retrieval;

pub use config::{Config, ConfigError};
pub use constants::{DimConfig, DimValidationError, validate_embedding_dim};
pub use embedding::{ClipConfig, ClipEmbedder, EmbeddingError, EmbeddingProvider};
pub use gateway::{HandlerState, create_router_with_state};
pub use hashing::hash_image;
pub use index::{ClassLabel, IndexError, LabelSet, SupportIndex};
pub use patch::{Patch, PatchError, PatchExtractor, SourceImage};
pub use pipeline::{
    InferenceRequest, InferenceResult, PipelineError, PipelineResult, ServiceSettings,
    StagedSupport, SupportIngest, SupportLoadReport, VisionRagService,
};
pub use postprocess::{FlagDecision, FlagSource, ParsedResponse, ResponsePostprocessor};
pub use prompt::{PromptAssembler, PromptPart, PromptRequest};
pub use reasoning::{
    MockBehavior, MockInvoker, OpenAiConfig, OpenAiInvoker, ReasoningError, ReasoningInvoker,
    SamplingParams,
};
pub use retrieval::{
    ClassScores, EvidenceItem, EvidenceRetriever, EvidenceSummary, RetrievalError,
    RetrievalParams,
};
