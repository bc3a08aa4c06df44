pub const RAGVISION_STATUS_HEADER: &str = "X-RagVision-Status";
pub const RAGVISION_STATUS_HEALTHY: &str = "healthy";
pub const RAGVISION_STATUS_READY: &str = "ready";
pub const RAGVISION_STATUS_NOT_READY: &str = "not_ready";
pub const RAGVISION_STATUS_ERROR: &str = "error";

/// Outcome reported in the status header of a successful request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RagVisionStatus {
    FlagRecognized,
    FlagDefault,
    SupportStored,
    SupportReset,
}

impl RagVisionStatus {
    #[inline]
    pub fn as_header_value(&self) -> &'static str {
        match self {
            RagVisionStatus::FlagRecognized => "FLAG_RECOGNIZED",
            RagVisionStatus::FlagDefault => "FLAG_DEFAULT",
            RagVisionStatus::SupportStored => "SUPPORT_STORED",
            RagVisionStatus::SupportReset => "SUPPORT_RESET",
        }
    }
}

impl std::fmt::Display for RagVisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_header_value())
    }
}
