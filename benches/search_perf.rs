use assay::search::canonicalize::canonicalize_for_embedding;
use assay::search::embedder::Embedder;
use assay::search::hash_embedder::HashEmbedder;
use assay::search::vector_index::{
    Quantization, VectorIndex, dot_product_scalar_bench, dot_product_simd_bench,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn synthetic_vectors(count: usize, dimension: usize) -> Vec<Vec<f32>> {
    (0..count)
        .map(|i| {
            let mut v: Vec<f32> = (0..dimension)
                .map(|j| ((i * 31 + j * 7) as f32 * 0.013).sin())
                .collect();
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            for x in &mut v {
                *x /= norm;
            }
            v
        })
        .collect()
}

/// Benchmark hash embedding over a synthetic catalog.
/// Target: well under 1ms per item.
fn bench_hash_embed_catalog(c: &mut Criterion) {
    let embedder = HashEmbedder::default();
    let docs: Vec<String> = (0..500)
        .map(|i| {
            format!(
                "Assessment {} | Test Type: Knowledge | Remote Support: Yes | Adaptive Support: No",
                i
            )
        })
        .collect();

    c.bench_function("hash_embed_500_items", |b| {
        b.iter(|| {
            for doc in &docs {
                let _ = black_box(embedder.embed(doc));
            }
        })
    });
}

fn bench_canonicalize(c: &mut Criterion) {
    let long_query: String = (0..50)
        .map(|i| format!("need an assessment for role {} covering sql python and teamwork  ", i))
        .collect();

    c.bench_function("canonicalize_long_query", |b| {
        b.iter(|| black_box(canonicalize_for_embedding(&long_query)))
    });
}

/// Top-k scan latency across catalog sizes, f32 vs f16 storage.
fn bench_top_k_scan(c: &mut Criterion) {
    let dimension = 384;
    let query = synthetic_vectors(1, dimension).pop().unwrap();

    let mut group = c.benchmark_group("top_k_scan");
    for &count in &[500usize, 5_000] {
        let vectors = synthetic_vectors(count, dimension);
        let f32_index = VectorIndex::build(
            "fnv1a-384",
            "bench",
            dimension,
            Quantization::F32,
            vectors.clone(),
        )
        .unwrap();
        let f16_index =
            VectorIndex::build("fnv1a-384", "bench", dimension, Quantization::F16, vectors)
                .unwrap();

        group.bench_with_input(BenchmarkId::new("f32", count), &f32_index, |b, index| {
            b.iter(|| black_box(index.search_top_k(&query, 20).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("f16", count), &f16_index, |b, index| {
            b.iter(|| black_box(index.search_top_k(&query, 20).unwrap()))
        });
    }
    group.finish();
}

fn bench_dot_product(c: &mut Criterion) {
    let vectors = synthetic_vectors(2, 384);
    let a = &vectors[0];
    let b_vec = &vectors[1];

    let mut group = c.benchmark_group("dot_product_384");
    group.bench_function("scalar", |b| {
        b.iter(|| black_box(dot_product_scalar_bench(a, b_vec)))
    });
    group.bench_function("simd", |b| {
        b.iter(|| black_box(dot_product_simd_bench(a, b_vec)))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_hash_embed_catalog,
    bench_canonicalize,
    bench_top_k_scan,
    bench_dot_product
);
criterion_main!(benches);
