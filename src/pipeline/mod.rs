//! The end-to-end pipeline.
//!
//! [`VisionRagService`] owns the support index, the embedding provider, the reasoning
//! invoker and the postprocessor, and exposes:
//!
//! - [`run_inference`](VisionRagService::run_inference): image in, flag and evidence out
//! - [`add_support_image`](VisionRagService::add_support_image): grow the support set
//! - [`stage_support_image`](VisionRagService::stage_support_image) and
//!   [`commit_support`](VisionRagService::commit_support): embed first, apply later
//! - [`load_support_dir`](VisionRagService::load_support_dir) and
//!   [`reset_support`](VisionRagService::reset_support) for bulk rebuilds
//!
//! # Concurrency
//!
//! Embedding runs on the blocking pool; reasoning is an async call. Both are bounded by
//! the configured timeouts. Each request retrieves from one index snapshot, so its
//! results reflect a single consistent support state. Dropping a `run_inference` future
//! drops the in-flight reasoning call; a running embedding finishes on the blocking pool
//! and its output is discarded.

mod error;
mod service;
mod types;


pub use error::{PipelineError, PipelineResult};
pub use service::VisionRagService;
pub use types::{
    InferenceRequest, InferenceResult, ServiceSettings, StagedSupport, SupportIngest,
    SupportLoadReport,
};
