use bg_removal_server::services::mask::{apply_fallback_mask, circular_mask};
use bg_removal_server::utils::file::validate_image_signature;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, ImageBuffer, RgbImage};
use std::io::Cursor;

fn create_test_image(width: u32, height: u32) -> DynamicImage {
    let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        let r = (x % 256) as u8;
        let g = (y % 256) as u8;
        let b = ((x + y) % 256) as u8;
        image::Rgb([r, g, b])
    });
    DynamicImage::ImageRgb8(img)
}

fn encode(img: &DynamicImage, format: image::ImageOutputFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, format).expect("Failed to encode test image");
    buffer.into_inner()
}

fn bench_circular_mask(c: &mut Criterion) {
    let mut group = c.benchmark_group("circular_mask");

    for (width, height) in [(640, 480), (1280, 720), (1920, 1080)] {
        let test_image = create_test_image(width, height);
        group.bench_with_input(
            BenchmarkId::new("mask", format!("{}x{}", width, height)),
            &test_image,
            |b, img| b.iter(|| circular_mask(black_box(img))),
        );
    }

    group.finish();
}

fn bench_fallback_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("fallback_end_to_end");
    group.sample_size(20);

    let test_image = create_test_image(1280, 720);
    let inputs = [
        ("png", encode(&test_image, image::ImageOutputFormat::Png)),
        ("jpeg", encode(&test_image, image::ImageOutputFormat::Jpeg(85))),
    ];

    for (name, data) in &inputs {
        group.bench_with_input(BenchmarkId::new("decode_mask_encode", name), data, |b, data| {
            b.iter(|| apply_fallback_mask(black_box(data)).expect("Fallback failed"))
        });
    }

    group.finish();
}

fn bench_signature_check(c: &mut Criterion) {
    let data = encode(&create_test_image(800, 600), image::ImageOutputFormat::Png);

    c.bench_function("validate_image_signature", |b| {
        b.iter(|| validate_image_signature(black_box(&data), black_box("image/png")))
    });
}

criterion_group!(
    benches,
    bench_circular_mask,
    bench_fallback_end_to_end,
    bench_signature_check
);
criterion_main!(benches);
