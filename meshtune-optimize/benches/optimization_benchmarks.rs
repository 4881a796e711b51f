//! Benchmarks for the cache and overdraw passes on tessellated planes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meshtune_core::{Clusters, IndexedMesh, Vertex, DEFAULT_CACHE_SIZE};
use meshtune_optimize::{
    analyze_overdraw, analyze_post_transform, generate_index_buffer, optimize_overdraw,
    optimize_post_transform, shuffle_triangles,
};

fn generate_grid_mesh(size: u32) -> IndexedMesh {
    let mut vertices = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 / (size - 1) as f32 * std::f32::consts::PI;
            let fy = y as f32 / (size - 1) as f32 * std::f32::consts::PI;
            vertices.push(Vertex::from_position([
                x as f32,
                y as f32,
                (fx.sin() * fy.sin()) * 2.0,
            ]));
        }
    }
    let mut indices = Vec::with_capacity(((size - 1) * (size - 1) * 6) as usize);
    for y in 0..(size - 1) {
        for x in 0..(size - 1) {
            let tl = y * size + x;
            let tr = tl + 1;
            let bl = (y + 1) * size + x;
            let br = bl + 1;
            indices.extend_from_slice(&[tl, bl, tr, tr, bl, br]);
        }
    }
    let mut mesh = IndexedMesh::from_vertices(&vertices, indices, Vertex::POSITION_OFFSET).unwrap();
    shuffle_triangles(&mut mesh.indices, 1).unwrap();
    mesh
}

fn bench_passes(c: &mut Criterion) {
    let sizes = [32, 64, 128];

    let mut group = c.benchmark_group("optimization");

    for &size in &sizes {
        let mesh = generate_grid_mesh(size);
        let label = format!("{}t", mesh.triangle_count());
        let vertex_count = mesh.vertex_count();

        group.bench_with_input(BenchmarkId::new("post_transform", &label), &mesh, |b, mesh| {
            let mut destination = vec![0u32; mesh.indices.len()];
            b.iter(|| {
                optimize_post_transform(
                    &mut destination,
                    black_box(&mesh.indices),
                    vertex_count,
                    DEFAULT_CACHE_SIZE,
                    None,
                )
                .unwrap();
            });
        });

        let mut ordered = vec![0u32; mesh.indices.len()];
        let mut clusters = Clusters::new();
        optimize_post_transform(&mut ordered, &mesh.indices, vertex_count, DEFAULT_CACHE_SIZE, Some(&mut clusters))
            .unwrap();

        group.bench_with_input(BenchmarkId::new("overdraw", &label), &ordered, |b, ordered| {
            let mut destination = vec![0u32; ordered.len()];
            b.iter(|| {
                optimize_overdraw(
                    &mut destination,
                    black_box(ordered),
                    mesh.position_bytes(),
                    mesh.stride,
                    vertex_count,
                    &clusters,
                    DEFAULT_CACHE_SIZE,
                    1.05,
                )
                .unwrap();
            });
        });

        group.bench_with_input(BenchmarkId::new("analyze", &label), &ordered, |b, ordered| {
            b.iter(|| {
                let cache = analyze_post_transform(black_box(ordered), vertex_count, DEFAULT_CACHE_SIZE).unwrap();
                let overdraw = analyze_overdraw(ordered, mesh.position_bytes(), mesh.stride, vertex_count).unwrap();
                black_box((cache, overdraw));
            });
        });

        group.bench_with_input(BenchmarkId::new("generate_index_buffer", &label), &mesh, |b, mesh| {
            let soup: Vec<u8> = mesh
                .indices
                .iter()
                .flat_map(|&i| {
                    let start = i as usize * mesh.stride;
                    mesh.vertices[start..start + mesh.stride].iter().copied()
                })
                .collect();
            let mut destination = vec![0u32; mesh.indices.len()];
            b.iter(|| {
                let unique = generate_index_buffer(&mut destination, black_box(&soup), mesh.stride).unwrap();
                black_box(unique);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_passes);
criterion_main!(benches);
