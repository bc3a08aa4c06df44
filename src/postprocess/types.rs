use serde::Serialize;

use crate::index::ClassLabel;
use crate::retrieval::ClassScores;

/// Which path produced the flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagDecision {
    /// A vocabulary token was found in the transcript.
    Recognized {
        label: ClassLabel,
        /// The transcript text that matched, as written by the model.
        token: String,
    },
    /// Nothing matched; the label with the highest class score was used.
    Default { label: ClassLabel },
}

impl FlagDecision {
    pub fn label(&self) -> &ClassLabel {
        match self {
            Self::Recognized { label, .. } | Self::Default { label } => label,
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::Recognized { .. })
    }

    pub fn source(&self) -> FlagSource {
        match self {
            Self::Recognized { .. } => FlagSource::Recognized,
            Self::Default { .. } => FlagSource::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagSource {
    Recognized,
    Default,
}

impl FlagSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recognized => "recognized",
            Self::Default => "default",
        }
    }
}

/// Structured view of one model transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub decision: FlagDecision,
    pub explanation: String,
    /// Retrieval-stage scores, attached unchanged.
    pub class_scores: ClassScores,
    pub raw: String,
}
