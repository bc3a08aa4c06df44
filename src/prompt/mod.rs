//! Prompt assembly.
//!
//! [`PromptAssembler::assemble`] is a pure function of its inputs. Part order:
//!
//! 1. system text
//! 2. user text
//! 3. query image
//! 4. evidence images, grouped by label in label enumeration order, each group in
//!    retrieval rank order

#[cfg(test)]
mod tests;

use std::sync::Arc;

use image::RgbImage;

use crate::index::{ClassLabel, LabelSet};
use crate::patch::SourceImage;
use crate::retrieval::EvidenceItem;

/// One ordered component of a multimodal request.
#[derive(Debug, Clone)]
pub enum PromptPart {
    SystemText(String),
    UserText(String),
    QueryImage {
        pixels: Arc<RgbImage>,
    },
    EvidenceImage {
        label: ClassLabel,
        /// Position in the retriever's ranked output (0 = most similar).
        rank: usize,
        similarity: f32,
        pixels: Arc<RgbImage>,
    },
}

impl PromptPart {
    pub fn is_image(&self) -> bool {
        matches!(self, Self::QueryImage { .. } | Self::EvidenceImage { .. })
    }

    pub fn pixels(&self) -> Option<&RgbImage> {
        match self {
            Self::QueryImage { pixels } | Self::EvidenceImage { pixels, .. } => Some(pixels),
            Self::SystemText(_) | Self::UserText(_) => None,
        }
    }
}

/// Ordered multimodal request handed to a [`ReasoningInvoker`](crate::reasoning::ReasoningInvoker).
#[derive(Debug, Clone)]
pub struct PromptRequest {
    parts: Vec<PromptPart>,
}

impl PromptRequest {
    pub fn parts(&self) -> &[PromptPart] {
        &self.parts
    }

    pub fn system_text(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            PromptPart::SystemText(t) => Some(t.as_str()),
            _ => None,
        })
    }

    pub fn user_text(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            PromptPart::UserText(t) => Some(t.as_str()),
            _ => None,
        })
    }

    pub fn image_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_image()).count()
    }

    pub fn evidence_labels(&self) -> impl Iterator<Item = &ClassLabel> {
        self.parts.iter().filter_map(|p| match p {
            PromptPart::EvidenceImage { label, .. } => Some(label),
            _ => None,
        })
    }
}

/// Builds [`PromptRequest`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler;

impl PromptAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        query_image: &SourceImage,
        evidence: &[EvidenceItem],
        labels: &LabelSet,
    ) -> PromptRequest {
        let mut parts = Vec::with_capacity(3 + evidence.len());
        parts.push(PromptPart::SystemText(system_prompt.trim().to_string()));
        parts.push(PromptPart::UserText(user_prompt.trim().to_string()));
        parts.push(PromptPart::QueryImage {
            pixels: query_image.shared_pixels(),
        });

        for label in labels {
            parts.extend(
                evidence
                    .iter()
                    .enumerate()
                    .filter(|(_, item)| item.label() == label)
                    .map(|(rank, item)| PromptPart::EvidenceImage {
                        label: label.clone(),
                        rank,
                        similarity: item.similarity,
                        pixels: item.entry.patch.shared_pixels(),
                    }),
            );
        }

        PromptRequest { parts }
    }
}
