use std::io::Cursor;

use docforge::{
    Compositor, DocumentKind, FontLibrary, GenOptions, MemoryAssetSource, RecordGenerator,
    RenderOptions,
};

fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn digest_u64(bytes: &[u8]) -> u64 {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    for chunk in bytes.chunks(8) {
        let mut v = 0u64;
        for (i, &b) in chunk.iter().enumerate() {
            v |= (b as u64) << (i * 8);
        }
        state = mix64(state ^ v);
    }
    state
}

fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn pinned_options() -> GenOptions {
    GenOptions {
        today: chrono::NaiveDate::from_ymd_opt(2026, 1, 15),
        min_age_years: 18,
        max_age_years: 60,
    }
}

fn source_with_assets() -> MemoryAssetSource {
    MemoryAssetSource {
        template: Some(png_bytes(64, 40, [120, 140, 180, 255])),
        hologram: Some(png_bytes(24, 24, [90, 200, 160, 180])),
    }
}

fn pixel(frame: &docforge::FrameRgba, x: u32, y: u32) -> [u8; 4] {
    let idx = ((y * frame.width + x) * 4) as usize;
    frame.data[idx..idx + 4].try_into().unwrap()
}

#[tokio::test]
async fn fixed_seed_renders_are_byte_identical() {
    let mut record = RecordGenerator::seeded(11)
        .generate(DocumentKind::IdCard, &pinned_options())
        .unwrap();
    record.photo = Some(png_bytes(30, 36, [180, 150, 120, 255]));
    let source = source_with_assets();
    let opts = RenderOptions {
        grain_seed: 99,
        with_post: true,
    };

    let mut compositor = Compositor::new(FontLibrary::empty()).unwrap();
    let a = compositor.render(&record, &source, &opts).await.unwrap();
    let b = compositor.render(&record, &source, &opts).await.unwrap();
    assert_eq!(a.width, 1200);
    assert_eq!(a.height, 756);
    assert_eq!(digest_u64(&a.data), digest_u64(&b.data));

    let other = RenderOptions {
        grain_seed: 100,
        with_post: true,
    };
    let c = compositor.render(&record, &source, &other).await.unwrap();
    assert_ne!(digest_u64(&a.data), digest_u64(&c.data));
}

#[tokio::test]
async fn missing_photo_draws_the_placeholder_slot() {
    let record = RecordGenerator::seeded(3)
        .generate(DocumentKind::IdCard, &pinned_options())
        .unwrap();
    assert!(record.photo.is_none());

    let source = source_with_assets();
    let opts = RenderOptions {
        grain_seed: 0,
        with_post: false,
    };
    let mut compositor = Compositor::new(FontLibrary::empty()).unwrap();
    let frame = compositor.render(&record, &source, &opts).await.unwrap();

    assert_eq!((frame.width, frame.height), (1200, 756));

    // Center of the photo slot carries the muted placeholder fill, not the
    // template color.
    let px = pixel(&frame, 1030, 450);
    for (got, want) in px.iter().zip([203u8, 209, 219, 255]) {
        assert!((i16::from(*got) - i16::from(want)).abs() <= 2, "{px:?}");
    }
}

#[tokio::test]
async fn supplied_photo_replaces_the_placeholder() {
    let mut record = RecordGenerator::seeded(3)
        .generate(DocumentKind::IdCard, &pinned_options())
        .unwrap();
    record.photo = Some(png_bytes(30, 36, [180, 150, 120, 255]));

    let source = source_with_assets();
    let opts = RenderOptions {
        grain_seed: 0,
        with_post: false,
    };
    let mut compositor = Compositor::new(FontLibrary::empty()).unwrap();
    let frame = compositor.render(&record, &source, &opts).await.unwrap();

    let px = pixel(&frame, 1030, 450);
    let placeholder = [203u8, 209, 219, 255];
    assert!(
        px.iter()
            .zip(placeholder)
            .any(|(got, want)| (i16::from(*got) - i16::from(want)).abs() > 8),
        "photo region still looks like the placeholder: {px:?}"
    );
}

#[tokio::test]
async fn corrupt_photo_degrades_to_the_placeholder_without_failing() {
    let mut record = RecordGenerator::seeded(5)
        .generate(DocumentKind::IdCard, &pinned_options())
        .unwrap();
    record.photo = Some(b"definitely not a png".to_vec());

    let source = source_with_assets();
    let opts = RenderOptions {
        grain_seed: 0,
        with_post: false,
    };
    let mut compositor = Compositor::new(FontLibrary::empty()).unwrap();
    let frame = compositor.render(&record, &source, &opts).await.unwrap();

    let px = pixel(&frame, 1030, 450);
    for (got, want) in px.iter().zip([203u8, 209, 219, 255]) {
        assert!((i16::from(*got) - i16::from(want)).abs() <= 2, "{px:?}");
    }
}

#[tokio::test]
async fn missing_template_still_produces_a_full_size_frame() {
    let record = RecordGenerator::seeded(8)
        .generate(DocumentKind::DrivingLicense, &pinned_options())
        .unwrap();

    let source = MemoryAssetSource::default();
    let opts = RenderOptions {
        grain_seed: 0,
        with_post: false,
    };
    let mut compositor = Compositor::new(FontLibrary::empty()).unwrap();
    let frame = compositor.render(&record, &source, &opts).await.unwrap();

    assert_eq!((frame.width, frame.height), (1800, 1200));

    // The degraded render carries the placeholder border frame.
    let border = pixel(&frame, 900, 18);
    for (got, want) in border.iter().zip([120u8, 128, 140, 255]) {
        assert!((i16::from(*got) - i16::from(want)).abs() <= 2, "{border:?}");
    }
}

#[tokio::test]
async fn template_pixels_survive_outside_decorations() {
    let record = RecordGenerator::seeded(21)
        .generate(DocumentKind::IdCard, &pinned_options())
        .unwrap();
    let source = MemoryAssetSource {
        template: Some(png_bytes(64, 40, [120, 140, 180, 255])),
        hologram: None,
    };
    let opts = RenderOptions {
        grain_seed: 0,
        with_post: false,
    };
    let mut compositor = Compositor::new(FontLibrary::empty()).unwrap();
    let frame = compositor.render(&record, &source, &opts).await.unwrap();

    // Top-right corner: outside the photo slot, watermark badge and any
    // text placement.
    let px = pixel(&frame, 1190, 6);
    for (got, want) in px.iter().zip([120u8, 140, 180, 255]) {
        assert!((i16::from(*got) - i16::from(want)).abs() <= 2, "{px:?}");
    }
}

#[tokio::test]
async fn passport_render_exercises_mrz_and_ghost_paths() {
    let mut record = RecordGenerator::seeded(17)
        .generate(DocumentKind::Passport, &pinned_options())
        .unwrap();
    record.photo = Some(png_bytes(40, 52, [150, 160, 170, 255]));

    let source = source_with_assets();
    let opts = RenderOptions {
        grain_seed: 1,
        with_post: false,
    };
    let mut compositor = Compositor::new(FontLibrary::empty()).unwrap();
    let frame = compositor.render(&record, &source, &opts).await.unwrap();
    assert_eq!((frame.width, frame.height), (3543, 2362));
}

#[tokio::test]
async fn malformed_record_date_fails_the_whole_passport_render() {
    let mut record = RecordGenerator::seeded(17)
        .generate(DocumentKind::Passport, &pinned_options())
        .unwrap();
    record.set("expiry_date", "31-12-2030");

    let source = source_with_assets();
    let mut compositor = Compositor::new(FontLibrary::empty()).unwrap();
    let err = compositor
        .render(&record, &source, &RenderOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, docforge::DocforgeError::Encoding(_)));
}

#[tokio::test]
async fn concurrent_renders_do_not_share_surfaces() {
    let record = RecordGenerator::seeded(2)
        .generate(DocumentKind::IdCard, &pinned_options())
        .unwrap();
    let source = source_with_assets();
    let opts = RenderOptions {
        grain_seed: 4,
        with_post: false,
    };

    let (a, b) = tokio::join!(
        async {
            let mut compositor = Compositor::new(FontLibrary::empty()).unwrap();
            compositor.render(&record, &source, &opts).await.unwrap()
        },
        async {
            let mut compositor = Compositor::new(FontLibrary::empty()).unwrap();
            compositor.render(&record, &source, &opts).await.unwrap()
        },
    );
    assert_eq!(digest_u64(&a.data), digest_u64(&b.data));
}
