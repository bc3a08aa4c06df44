use std::path::PathBuf;
use std::sync::Arc;

use crate::pipeline::VisionRagService;

#[derive(Clone)]
pub struct HandlerState {
    pub service: Arc<VisionRagService>,

    /// When set, uploaded support images are also written to `<root>/<class>/`.
    pub support_root: Option<PathBuf>,
}

impl HandlerState {
    pub fn new(service: Arc<VisionRagService>) -> Self {
        Self {
            service,
            support_root: None,
        }
    }

    pub fn with_support_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.support_root = Some(root.into());
        self
    }
}
