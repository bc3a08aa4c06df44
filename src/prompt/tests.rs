use super::*;
use crate::index::SupportEntry;
use crate::patch::{PatchExtractor, SourceImage};
use image::Rgb;

fn labels() -> LabelSet {
    LabelSet::new(["dirty", "clean"]).unwrap()
}

fn query_image() -> SourceImage {
    SourceImage::new(RgbImage::from_pixel(4, 4, Rgb([9, 9, 9]))).unwrap()
}

/// Evidence in rank order, alternating labels: clean, dirty, clean, dirty.
fn evidence() -> Vec<EvidenceItem> {
    let labels = labels();
    let source = SourceImage::new(RgbImage::from_fn(2, 2, |x, y| {
        Rgb([x as u8 * 100, y as u8 * 100, 7])
    }))
    .unwrap();
    let patches = PatchExtractor::new(1).unwrap().extract(&source).unwrap();

    patches
        .into_iter()
        .enumerate()
        .map(|(i, patch)| {
            let label = if i % 2 == 0 { "clean" } else { "dirty" };
            EvidenceItem {
                entry: Arc::new(SupportEntry {
                    label: labels.get(label).unwrap().clone(),
                    patch,
                    embedding: vec![1.0, 0.0].into(),
                    seq: i as u64,
                }),
                similarity: 0.9 - i as f32 * 0.1,
                query_patch: 0,
            }
        })
        .collect()
}

#[test]
fn test_fixed_part_order() {
    let prompt = PromptAssembler::new().assemble(
        "  You inspect panels.  ",
        "Is it dirty?\n",
        &query_image(),
        &evidence(),
        &labels(),
    );
    let parts = prompt.parts();
    assert_eq!(parts.len(), 7);
    assert!(matches!(&parts[0], PromptPart::SystemText(t) if t == "You inspect panels."));
    assert!(matches!(&parts[1], PromptPart::UserText(t) if t == "Is it dirty?"));
    assert!(matches!(&parts[2], PromptPart::QueryImage { .. }));
    assert!(parts[3..].iter().all(|p| matches!(p, PromptPart::EvidenceImage { .. })));
    assert_eq!(prompt.image_count(), 5);
}

#[test]
fn test_evidence_grouped_by_label_order_then_rank() {
    let prompt = PromptAssembler::new().assemble(
        "sys",
        "user",
        &query_image(),
        &evidence(),
        &labels(),
    );

    let got: Vec<(&str, usize)> = prompt
        .parts()
        .iter()
        .filter_map(|p| match p {
            PromptPart::EvidenceImage { label, rank, .. } => Some((label.as_str(), *rank)),
            _ => None,
        })
        .collect();
    assert_eq!(
        got,
        vec![("dirty", 1), ("dirty", 3), ("clean", 0), ("clean", 2)]
    );
}

#[test]
fn test_evidence_pixels_come_from_patches() {
    let items = evidence();
    let prompt = PromptAssembler::new().assemble("s", "u", &query_image(), &items, &labels());

    let PromptPart::EvidenceImage { pixels, rank, .. } = &prompt.parts()[3] else {
        panic!("expected evidence image");
    };
    assert_eq!(&**pixels, items[*rank].entry.patch.pixels());
    assert_eq!(prompt.parts()[2].pixels(), Some(query_image().pixels()));
}

#[test]
fn test_no_evidence_yields_text_and_query_only() {
    let prompt = PromptAssembler::new().assemble("s", "u", &query_image(), &[], &labels());
    assert_eq!(prompt.parts().len(), 3);
    assert_eq!(prompt.image_count(), 1);
    assert_eq!(prompt.evidence_labels().count(), 0);
}

#[test]
fn test_assembly_is_deterministic() {
    let items = evidence();
    let render = |p: &PromptRequest| -> Vec<String> {
        p.parts()
            .iter()
            .map(|part| match part {
                PromptPart::SystemText(t) => format!("sys:{t}"),
                PromptPart::UserText(t) => format!("user:{t}"),
                PromptPart::QueryImage { pixels } => format!("query:{}", pixels.len()),
                PromptPart::EvidenceImage {
                    label,
                    rank,
                    similarity,
                    ..
                } => format!("ev:{label}:{rank}:{similarity}"),
            })
            .collect()
    };

    let assembler = PromptAssembler::new();
    let a = assembler.assemble("s", "u", &query_image(), &items, &labels());
    let b = assembler.assemble("s", "u", &query_image(), &items, &labels());
    assert_eq!(render(&a), render(&b));
    assert_eq!(a.system_text(), Some("s"));
    assert_eq!(a.user_text(), Some("u"));
}
