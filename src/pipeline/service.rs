use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use uuid::Uuid;

use super::error::{PipelineError, PipelineResult};
use super::types::{
    InferenceRequest, InferenceResult, ServiceSettings, StagedSupport, SupportIngest,
    SupportLoadReport,
};
use crate::constants::{DimConfig, SUPPORT_IMAGE_EXTENSIONS};
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::index::{IngestOutcome, LabelSet, SupportIndex};
use crate::patch::{Patch, PatchExtractor, SourceImage};
use crate::postprocess::ResponsePostprocessor;
use crate::prompt::PromptAssembler;
use crate::reasoning::{ReasoningError, ReasoningInvoker};
use crate::retrieval::{EvidenceRetriever, RetrievalParams};

/// Patches of one image and their embeddings, index-aligned.
struct EmbeddedPatches {
    patches: Vec<Patch>,
    embeddings: Vec<Vec<f32>>,
}

/// The retrieval-augmented classification pipeline.
///
/// Cheap to share behind an `Arc`; every method takes `&self`. The support index is the
/// only shared mutable state.
pub struct VisionRagService {
    index: Arc<SupportIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    invoker: Arc<dyn ReasoningInvoker>,
    retriever: EvidenceRetriever,
    assembler: PromptAssembler,
    postprocessor: ResponsePostprocessor,
    settings: ServiceSettings,
}

impl std::fmt::Debug for VisionRagService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionRagService")
            .field("index", &self.index)
            .field("embedder_dim", &self.embedder.dimension())
            .field("invoker", &self.invoker.backend_name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl VisionRagService {
    /// Wires the components together. Fails if the embedder and index disagree on dimension.
    pub fn new(
        index: Arc<SupportIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        invoker: Arc<dyn ReasoningInvoker>,
        postprocessor: ResponsePostprocessor,
        settings: ServiceSettings,
    ) -> PipelineResult<Self> {
        let expected = index.embedding_dim();
        let actual = embedder.dimension();
        if expected != actual {
            return Err(PipelineError::DimensionMismatch { expected, actual });
        }
        if postprocessor.labels() != index.all_labels() {
            return Err(PipelineError::InvalidRequest(
                "postprocessor and index use different label sets".to_string(),
            ));
        }
        validate_geometry(settings.support_resolution, settings.support_patch_size)?;
        let dims = DimConfig::new(expected);
        dims.validate()
            .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            retriever: EvidenceRetriever::new(dims),
            assembler: PromptAssembler::new(),
            index,
            embedder,
            invoker,
            postprocessor,
            settings,
        })
    }

    pub fn index(&self) -> &Arc<SupportIndex> {
        &self.index
    }

    pub fn labels(&self) -> &LabelSet {
        self.index.all_labels()
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn embedder_is_stub(&self) -> bool {
        self.embedder.is_stub()
    }

    pub fn invoker_backend(&self) -> &'static str {
        self.invoker.backend_name()
    }

    /// Classifies one query image against the current support set.
    pub async fn run_inference(&self, request: InferenceRequest) -> PipelineResult<InferenceResult> {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "run_inference",
            %request_id,
            image_id = %format!("{:016x}", request.query_image.id()),
            k = request.k,
            max_patches_per_class = request.max_patches_per_class,
        );
        self.run_inference_inner(request_id, request)
            .instrument(span)
            .await
    }

    async fn run_inference_inner(
        &self,
        request_id: Uuid,
        request: InferenceRequest,
    ) -> PipelineResult<InferenceResult> {
        let started = Instant::now();
        validate_geometry(request.support_resolution, request.support_patch_size)?;
        if request.input_resolution == 0 {
            return Err(PipelineError::InvalidRequest(
                "input resolution must be positive".to_string(),
            ));
        }
        request.sampling.validate()?;

        let original_size = request.query_image.dimensions();
        let image_id = format!("{:016x}", request.query_image.id());

        let query = self
            .embed_patches(
                request.query_image.clone(),
                request.support_resolution,
                request.support_patch_size,
            )
            .await?;
        debug!(query_patches = query.patches.len(), "Query embedded");

        let snapshot = self.index.snapshot();
        let outcome = self.retriever.retrieve(
            &snapshot,
            &query.embeddings,
            RetrievalParams {
                k: request.k,
                max_patches_per_class: request.max_patches_per_class,
            },
        )?;
        debug!(
            evidence = outcome.evidence.len(),
            merged = outcome.merged_candidates,
            "Evidence retrieved"
        );

        let prompt_image = {
            let image = request.query_image.clone();
            let side = request.input_resolution;
            tokio::task::spawn_blocking(move || image.resized_square(side))
                .await
                .map_err(|e| PipelineError::Internal(format!("resize task failed: {}", e)))??
        };

        let prompt = self.assembler.assemble(
            &request.system_prompt,
            &request.user_prompt,
            &prompt_image,
            &outcome.evidence,
            snapshot.labels(),
        );

        let timeout = self.settings.reasoning_timeout;
        let transcript =
            match tokio::time::timeout(timeout, self.invoker.generate(&prompt, &request.sampling))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "Reasoning call timed out");
                    return Err(PipelineError::UpstreamModel(ReasoningError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }));
                }
            };

        let parsed = self.postprocessor.process(&transcript, &outcome.class_scores);
        let elapsed = started.elapsed();

        info!(
            flag = %parsed.decision.label(),
            source = parsed.decision.source().as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Inference complete"
        );

        Ok(InferenceResult {
            request_id,
            image_id,
            explanation: parsed.explanation,
            class_scores: parsed.class_scores,
            raw_response: parsed.raw,
            decision: parsed.decision,
            original_size,
            evidence: outcome.evidence.iter().map(|e| e.summary()).collect(),
            elapsed,
        })
    }

    /// Cuts `image` into support patches, embeds them and stores them under `label`.
    ///
    /// The whole image lands in the index atomically.
    pub async fn add_support_image(
        &self,
        label: &str,
        image: SourceImage,
    ) -> PipelineResult<SupportIngest> {
        let staged = self.stage_support_image(label, image).await?;
        self.commit_support(staged, false)
    }

    /// Embeds a support image without touching the index.
    #[instrument(skip(self, image), fields(image_id = %format!("{:016x}", image.id())))]
    pub async fn stage_support_image(
        &self,
        label: &str,
        image: SourceImage,
    ) -> PipelineResult<StagedSupport> {
        let label = self.index.all_labels().get(label)?.clone();

        let embedded = self
            .embed_patches(
                image,
                self.settings.support_resolution,
                self.settings.support_patch_size,
            )
            .await?;

        let items = embedded
            .patches
            .into_iter()
            .zip(embedded.embeddings)
            .collect();
        Ok(StagedSupport { label, items })
    }

    /// Writes a staged image to the index.
    ///
    /// With `replace_all` the staged patches become the whole support set in one step;
    /// if they fail validation the previous set is kept.
    pub fn commit_support(
        &self,
        staged: StagedSupport,
        replace_all: bool,
    ) -> PipelineResult<SupportIngest> {
        let StagedSupport { label, items } = staged;
        let outcomes = if replace_all {
            self.index.replace_all(label.as_str(), items)?
        } else {
            self.index.ingest_batch(label.as_str(), items)?
        };

        let replaced = outcomes
            .iter()
            .filter(|o| **o == IngestOutcome::Replaced)
            .count();
        let ingest = SupportIngest {
            patches: outcomes.len(),
            inserted: outcomes.len() - replaced,
            replaced,
        };
        if replace_all {
            info!(label = %label, patches = ingest.patches, "Support set replaced");
        } else {
            debug!(label = %label, ?ingest, "Support image ingested");
        }
        Ok(ingest)
    }

    /// Ingests `<root>/<label>/*.{png,jpg,...}` for every configured label.
    ///
    /// Undecodable files are skipped with a warning; missing label directories are
    /// reported, not fatal.
    #[instrument(skip(self, root), fields(root = %root.as_ref().display()))]
    pub async fn load_support_dir(&self, root: impl AsRef<Path>) -> PipelineResult<SupportLoadReport> {
        let root = root.as_ref().to_path_buf();
        let labels: Vec<String> = self
            .index
            .all_labels()
            .iter()
            .map(|l| l.as_str().to_string())
            .collect();

        let listing = {
            let list_root = root.clone();
            tokio::task::spawn_blocking(move || list_support_files(&list_root, &labels))
                .await
                .map_err(|e| PipelineError::Internal(format!("listing task failed: {}", e)))?
                .map_err(|e| {
                    PipelineError::InvalidRequest(format!(
                        "cannot read support root {}: {}",
                        root.display(),
                        e
                    ))
                })?
        };

        let mut report = SupportLoadReport {
            missing_labels: listing.missing_labels,
            ..Default::default()
        };
        for label in &report.missing_labels {
            warn!(label = %label, "No support directory for class");
        }

        for (label, path) in listing.files {
            let opened = {
                let path = path.clone();
                tokio::task::spawn_blocking(move || SourceImage::open(&path))
                    .await
                    .map_err(|e| PipelineError::Internal(format!("decode task failed: {}", e)))?
            };

            let image = match opened {
                Ok(image) => image,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid support image skipped");
                    report.skipped += 1;
                    continue;
                }
            };

            match self.add_support_image(&label, image).await {
                Ok(ingest) => {
                    *report.images.entry(label).or_default() += 1;
                    report.patches += ingest.patches;
                }
                Err(e @ (PipelineError::InvalidImage(_) | PipelineError::Embedding(_))) => {
                    warn!(path = %path.display(), error = %e, "Support image skipped");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            images = report.total_images(),
            patches = report.patches,
            skipped = report.skipped,
            entries = self.index.len(),
            "Support set loaded"
        );
        Ok(report)
    }

    /// Drops every support entry.
    pub fn reset_support(&self) {
        self.index.clear();
        info!("Support set reset");
    }

    /// Resize, cut and embed on the blocking pool, bounded by the embedding timeout.
    async fn embed_patches(
        &self,
        image: SourceImage,
        resolution: u32,
        patch_size: u32,
    ) -> PipelineResult<EmbeddedPatches> {
        let embedder = Arc::clone(&self.embedder);
        let task = tokio::task::spawn_blocking(move || -> PipelineResult<EmbeddedPatches> {
            let resized = image.resized_square(resolution)?;
            let patches = PatchExtractor::new(patch_size)?.extract(&resized)?;
            let pixels: Vec<&RgbImage> = patches.iter().map(Patch::pixels).collect();
            let embeddings = embedder.embed_batch(&pixels)?;
            if embeddings.len() != patches.len() {
                return Err(PipelineError::Embedding(EmbeddingError::InferenceFailed {
                    reason: format!(
                        "provider returned {} embeddings for {} patches",
                        embeddings.len(),
                        patches.len()
                    ),
                }));
            }
            Ok(EmbeddedPatches {
                patches,
                embeddings,
            })
        });

        let timeout = self.settings.embedding_timeout;
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(PipelineError::Internal(format!(
                "embedding task failed: {}",
                join
            ))),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Embedding timed out");
                Err(PipelineError::Embedding(EmbeddingError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }))
            }
        }
    }
}

fn validate_geometry(resolution: u32, patch_size: u32) -> PipelineResult<()> {
    if resolution == 0 || patch_size == 0 {
        return Err(PipelineError::InvalidRequest(format!(
            "resolution and patch size must be positive, got {} / {}",
            resolution, patch_size
        )));
    }
    if patch_size > resolution {
        return Err(PipelineError::InvalidRequest(format!(
            "patch size {} exceeds resolution {}",
            patch_size, resolution
        )));
    }
    Ok(())
}

struct SupportListing {
    files: Vec<(String, PathBuf)>,
    missing_labels: Vec<String>,
}

/// Image files per label directory, sorted by file name for a stable insertion order.
fn list_support_files(root: &Path, labels: &[String]) -> std::io::Result<SupportListing> {
    if !root.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "not a directory",
        ));
    }

    let mut listing = SupportListing {
        files: Vec::new(),
        missing_labels: Vec::new(),
    };

    for label in labels {
        let dir = root.join(label);
        if !dir.is_dir() {
            listing.missing_labels.push(label.clone());
            continue;
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_support_image(p))
            .collect();
        paths.sort();
        listing
            .files
            .extend(paths.into_iter().map(|p| (label.clone(), p)));
    }

    Ok(listing)
}

fn is_support_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| SUPPORT_IMAGE_EXTENSIONS.contains(&e.as_str()))
}
