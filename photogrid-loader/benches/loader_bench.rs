use std::path::PathBuf;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use photogrid_core::{LoaderConfig, Thumbnail, ThumbnailCache};
use photogrid_loader::{sample_factor, Decode, ThumbnailDecoder};

fn bench_cache_churn(c: &mut Criterion) {
    let thumb = Arc::new(Thumbnail::solid(200, [90, 90, 90, 255]));
    let keys: Vec<PathBuf> = (0..2048).map(|i| format!("/photos/{i}.jpg").into()).collect();

    c.bench_function("cache_put_get_2048_over_512", |b| {
        b.iter(|| {
            let mut cache = ThumbnailCache::new(512 * thumb.byte_size());
            for key in &keys {
                if cache.get(key).is_none() {
                    cache.put(key.clone(), Arc::clone(&thumb));
                }
            }
            cache.stats()
        });
    });
}

fn bench_sample_factor(c: &mut Criterion) {
    c.bench_function("sample_factor", |b| {
        b.iter(|| {
            let mut acc = 0u32;
            for w in (1..4000).step_by(7) {
                acc = acc.wrapping_add(sample_factor(w, 3000, 200));
            }
            acc
        });
    });
}

fn bench_decode_thumbnail(c: &mut Criterion) {
    let path = std::env::temp_dir().join("photogrid_bench_source.png");
    image::RgbImage::from_fn(2400, 1600, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
        .save(&path)
        .expect("write bench image");
    let decoder = ThumbnailDecoder::from_config(&LoaderConfig::default());

    c.bench_function("decode_2400x1600_to_200", |b| {
        b.iter(|| decoder.decode(&path, 200).expect("decode"));
    });

    let _ = std::fs::remove_file(&path);
}

criterion_group!(
    benches,
    bench_cache_churn,
    bench_sample_factor,
    bench_decode_thumbnail
);
criterion_main!(benches);
