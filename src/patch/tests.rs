use super::*;
use image::Rgb;

fn gradient(width: u32, height: u32) -> SourceImage {
    let pixels = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    SourceImage::new(pixels).unwrap()
}

fn assert_exact_cover(image: &SourceImage, patches: &[Patch]) {
    let total: u64 = patches.iter().map(|p| p.bounds().area()).sum();
    assert_eq!(total, image.width() as u64 * image.height() as u64);

    for (i, a) in patches.iter().enumerate() {
        for b in &patches[i + 1..] {
            assert!(
                !a.bounds().intersects(&b.bounds()),
                "{:?} overlaps {:?}",
                a.bounds(),
                b.bounds()
            );
        }
    }
}

#[test]
fn test_even_grid_covers_image() {
    let image = gradient(224, 224);
    let extractor = PatchExtractor::new(32).unwrap();
    let patches = extractor.extract(&image).unwrap();

    assert_eq!(patches.len(), 49);
    assert!(patches.iter().all(|p| !p.is_clipped()));
    assert_exact_cover(&image, &patches);
}

#[test]
fn test_uneven_grid_clips_last_row_and_column() {
    let image = gradient(70, 45);
    let extractor = PatchExtractor::new(32).unwrap();
    let grid = extractor.grid(&image).unwrap();

    assert_eq!(grid.cols(), 3);
    assert_eq!(grid.rows(), 2);

    let patches: Vec<Patch> = grid.iter().collect();
    assert_eq!(patches.len(), 6);
    assert_exact_cover(&image, &patches);

    let last = patches.last().unwrap();
    assert_eq!(
        last.bounds(),
        PatchBounds {
            x: 64,
            y: 32,
            width: 6,
            height: 13
        }
    );
    assert!(last.is_clipped());
    assert_eq!(last.id().size, 32);
    assert_eq!(last.pixels().dimensions(), (6, 13));
}

#[test]
fn test_row_major_order() {
    let image = gradient(64, 64);
    let patches = PatchExtractor::new(32).unwrap().extract(&image).unwrap();
    let coords: Vec<(u32, u32)> = patches.iter().map(|p| (p.id().row, p.id().col)).collect();
    assert_eq!(coords, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
}

#[test]
fn test_grid_is_restartable() {
    let image = gradient(96, 64);
    let extractor = PatchExtractor::new(32).unwrap();
    let grid = extractor.grid(&image).unwrap();

    let first: Vec<PatchId> = grid.iter().map(|p| p.id()).collect();
    let second: Vec<PatchId> = (&grid).into_iter().map(|p| p.id()).collect();
    assert_eq!(first, second);
    assert_eq!(grid.iter().len(), 6);
}

#[test]
fn test_patch_pixels_match_source() {
    let image = gradient(64, 64);
    let patches = PatchExtractor::new(32).unwrap().extract(&image).unwrap();
    let patch = &patches[3];

    assert_eq!(patch.bounds().x, 32);
    assert_eq!(patch.bounds().y, 32);
    assert_eq!(patch.pixels().get_pixel(0, 0), image.pixels().get_pixel(32, 32));
    assert_eq!(patch.pixels().get_pixel(5, 7), image.pixels().get_pixel(37, 39));
}

#[test]
fn test_patch_larger_than_image_yields_single_clipped_patch() {
    let image = gradient(10, 10);
    let patches = PatchExtractor::new(32).unwrap().extract(&image).unwrap();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].bounds().width, 10);
    assert!(patches[0].is_clipped());
}

#[test]
fn test_patch_ids_carry_source_identity() {
    let image = gradient(64, 32);
    let patches = PatchExtractor::new(32).unwrap().extract(&image).unwrap();
    assert!(patches.iter().all(|p| p.id().source_id == image.id()));
}

#[test]
fn test_zero_patch_size_rejected() {
    assert_eq!(
        PatchExtractor::new(0).unwrap_err(),
        PatchError::ZeroPatchSize
    );
}

#[test]
fn test_empty_image_rejected() {
    let err = SourceImage::new(RgbImage::new(0, 12)).unwrap_err();
    assert_eq!(
        err,
        PatchError::EmptyImage {
            width: 0,
            height: 12
        }
    );
}

#[test]
fn test_resize_square_changes_identity() {
    let image = gradient(100, 50);
    let resized = image.resized_square(64).unwrap();
    assert_eq!(resized.dimensions(), (64, 64));
    assert_ne!(resized.id(), image.id());
    assert!(image.resized_square(0).is_err());
}

#[test]
fn test_base64_round_trip_with_data_uri() {
    let image = gradient(16, 16);
    let encoded = encode_png_base64(image.pixels()).unwrap();

    let plain = SourceImage::from_base64(&encoded).unwrap();
    let prefixed = SourceImage::from_base64(&format!("data:image/png;base64,{}", encoded)).unwrap();

    assert_eq!(plain.id(), image.id());
    assert_eq!(prefixed.id(), image.id());
}

#[test]
fn test_invalid_payloads_rejected() {
    assert!(matches!(
        SourceImage::from_base64("%%%not-base64%%%"),
        Err(PatchError::InvalidBase64 { .. })
    ));
    assert!(matches!(
        SourceImage::from_bytes(b"definitely not an image"),
        Err(PatchError::DecodeFailed { .. })
    ));
    assert!(matches!(
        SourceImage::from_bytes(&[]),
        Err(PatchError::DecodeFailed { .. })
    ));
}

#[test]
fn test_decode_base64_image_keeps_pixels() {
    let image = gradient(5, 3);
    let encoded = encode_png_base64(image.pixels()).unwrap();
    let decoded = decode_base64_image(&encoded).unwrap();
    assert_eq!(&decoded, image.pixels());
}
