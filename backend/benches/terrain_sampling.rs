use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use medidrop_backend::models::{BBOX_MARGIN_DEG, BoundingBox, Coordinate};
use medidrop_backend::raster::{Raster, pixel_dimensions};
use medidrop_backend::terrain::{DEM_RESOLUTION_M, sample_raster, to_feature_collection};

fn benchmark_path_sampling(c: &mut Criterion) {
    let base = Coordinate { lat: 52.50, lon: 13.38 };
    let delivery = Coordinate { lat: 52.52, lon: 13.405 };
    let bbox = BoundingBox::around(delivery, BBOX_MARGIN_DEG);
    let (width, height) = pixel_dimensions(&bbox, DEM_RESOLUTION_M);
    let raster = Raster::from_fn(bbox, width as usize, height as usize, |r, c| {
        30.0 + (r as f64 * 0.7).sin() * 5.0 + c as f64 * 0.1
    })
    .expect("raster");

    let mut group = c.benchmark_group("terrain_path_sampling");
    for count in [20usize, 200, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let samples =
                    sample_raster(black_box(&raster), base, delivery, count).expect("samples");
                serde_json::to_vec(&to_feature_collection(&samples)).expect("geojson")
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_path_sampling);
criterion_main!(benches);
