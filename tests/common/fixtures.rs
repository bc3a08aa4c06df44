//! Image and service fixtures.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};

use ragvision::embedding::{ClipConfig, ClipEmbedder, EmbeddingProvider};
use ragvision::index::{LabelSet, SupportIndex};
use ragvision::patch::encode_png_base64;
use ragvision::pipeline::{ServiceSettings, VisionRagService};
use ragvision::postprocess::ResponsePostprocessor;
use ragvision::reasoning::ReasoningInvoker;
use ragvision::DimConfig;

pub const TEST_DIM: usize = 16;
pub const TEST_CLASSES: [&str; 2] = ["dirty", "clean"];
pub const BROWN: Rgb<u8> = Rgb([120, 80, 40]);
pub const BLUE: Rgb<u8> = Rgb([30, 60, 200]);

/// 64px support grid cut into 32px patches: four patches per image.
pub fn test_settings() -> ServiceSettings {
    ServiceSettings {
        support_resolution: 64,
        support_patch_size: 32,
        embedding_timeout: Duration::from_secs(10),
        reasoning_timeout: Duration::from_secs(10),
    }
}

pub fn build_service(invoker: Arc<dyn ReasoningInvoker>) -> Arc<VisionRagService> {
    let labels = LabelSet::new(TEST_CLASSES).expect("valid labels");
    let positive = labels.first().clone();
    let index = Arc::new(SupportIndex::new(labels.clone(), DimConfig::new(TEST_DIM)));
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(
        ClipEmbedder::load(ClipConfig::stub().with_embedding_dim(TEST_DIM))
            .expect("stub embedder"),
    );
    Arc::new(
        VisionRagService::new(
            index,
            embedder,
            invoker,
            ResponsePostprocessor::new(labels, &positive),
            test_settings(),
        )
        .expect("service wiring"),
    )
}

/// Solid 80x60 image; `marker` changes one pixel so images get distinct ids.
pub fn panel(color: Rgb<u8>, marker: u8) -> RgbImage {
    let mut pixels = RgbImage::from_pixel(80, 60, color);
    pixels.put_pixel(0, 0, Rgb([marker, marker, marker]));
    pixels
}

pub fn panel_base64(color: Rgb<u8>, marker: u8) -> String {
    encode_png_base64(&panel(color, marker)).expect("png encode")
}

/// Writes `count` panels per class under `root/<class>/`.
pub fn write_support_tree(root: &Path, count: u8) {
    for (class, color) in [("dirty", BROWN), ("clean", BLUE)] {
        let dir = root.join(class);
        std::fs::create_dir_all(&dir).expect("create class dir");
        for i in 0..count {
            panel(color, i + 1)
                .save(dir.join(format!("{}_{}.png", class, i)))
                .expect("write panel");
        }
    }
}
