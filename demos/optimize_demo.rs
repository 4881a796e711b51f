//! Mesh optimization demo
//!
//! Synthesizes a test mesh, runs each optimization pass on a copy and prints
//! cache and overdraw statistics for the result.
//!
//! Run with `RUST_LOG=debug` to see per-pass details.

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use meshtune_core::{Clusters, IndexedMesh, MeshOptimizer, Vertex};
use meshtune_optimize::{
    analyze_mesh, optimize_overdraw, optimize_post_transform, weld, OverdrawOptimizer,
    PostTransformConfig, PostTransformOptimizer, ShuffleTriangles,
};
use std::time::Instant;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scene {
    /// Tessellated plane, one layer deep
    Plane,
    /// Stacked planes drawn back to front
    Layers,
}

#[derive(Parser, Debug)]
#[command(name = "optimize_demo")]
#[command(about = "Run meshtune passes on a synthesized mesh", long_about = None)]
struct Args {
    /// Scene to synthesize
    #[arg(long, value_enum, default_value = "plane")]
    scene: Scene,

    /// Quads per side of each plane
    #[arg(short = 'n', long, default_value = "1000")]
    size: u32,

    /// Number of stacked planes for the layers scene
    #[arg(long, default_value = "4")]
    layers: u32,

    /// Simulated post-transform cache size
    #[arg(short, long, default_value = "24")]
    cache_size: usize,

    /// Allowed ACMR growth for the cache+overdraw pass
    #[arg(short, long, default_value = "1.05")]
    threshold: f32,

    /// Seed for the random shuffle pass
    #[arg(long, default_value = "0")]
    seed: u64,
}

/// Plane of N x N quads in the xy plane with unit spacing
fn generate_plane(n: u32) -> Result<IndexedMesh> {
    let side = n + 1;
    let mut vertices = Vec::with_capacity(side as usize * side as usize);
    for y in 0..side {
        for x in 0..side {
            vertices.push(Vertex::from_position([x as f32, y as f32, 0.0]));
        }
    }

    let mut indices = Vec::with_capacity(n as usize * n as usize * 6);
    for y in 0..n {
        for x in 0..n {
            let tl = y * side + x;
            let tr = tl + 1;
            let bl = (y + 1) * side + x;
            let br = bl + 1;
            indices.extend_from_slice(&[tl, tr, bl, bl, tr, br]);
        }
    }

    Ok(IndexedMesh::from_vertices(&vertices, indices, Vertex::POSITION_OFFSET)?)
}

/// Stacked planes emitted as an unindexed triangle soup, then welded
fn generate_layers(n: u32, layers: u32) -> Result<IndexedMesh> {
    let mut soup = Vec::with_capacity(n as usize * n as usize * 6 * layers as usize);
    for layer in 0..layers {
        let z = layer as f32 * n as f32 / layers.max(1) as f32;
        let corner = |x: u32, y: u32| Vertex::from_position([x as f32, y as f32, z]);
        for y in 0..n {
            for x in 0..n {
                let (a, b) = (corner(x, y), corner(x + 1, y));
                let (c, d) = (corner(x + 1, y + 1), corner(x, y + 1));
                soup.extend_from_slice(&[a, b, c, a, c, d]);
            }
        }
    }
    Ok(weld(&soup, Vertex::POSITION_OFFSET)?)
}

fn run<F>(mesh: &IndexedMesh, name: &str, cache_size: usize, pass: F) -> Result<()>
where
    F: FnOnce(&mut IndexedMesh) -> Result<()>,
{
    let mut copy = mesh.clone();

    let start = Instant::now();
    pass(&mut copy)?;
    let elapsed = start.elapsed();

    let report = analyze_mesh(&copy, cache_size)?;
    println!(
        "{:<15}: ACMR {:.6} ATVR {:.6} Overdraw {:.6} in {:.3} msec",
        name,
        report.cache.acmr,
        report.cache.atvr,
        report.overdraw.overdraw,
        elapsed.as_secs_f64() * 1000.0
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.size == 0 {
        bail!("plane size must be at least 1");
    }
    let side = args.size as u64 + 1;
    if side * side * args.layers.max(1) as u64 > u32::MAX as u64 {
        bail!("a {} x {} scene does not fit 32-bit indices", args.size, args.size);
    }

    let mesh = match args.scene {
        Scene::Plane => generate_plane(args.size)?,
        Scene::Layers => generate_layers(args.size, args.layers)?,
    };
    if mesh.is_empty() {
        println!("Synthesized mesh appears to be empty");
        return Ok(());
    }
    let (min, max) = mesh.bounding_box()?;
    println!(
        "Using a {:?} scene ({} vertices, {} triangles, bounds {:?} to {:?})",
        args.scene,
        mesh.vertex_count(),
        mesh.triangle_count(),
        min.coords.as_slice(),
        max.coords.as_slice()
    );

    let cache_size = args.cache_size;
    let cache_pass = PostTransformOptimizer::with_config(PostTransformConfig::default().with_cache_size(cache_size));

    run(&mesh, "Original", cache_size, |_| Ok(()))?;
    run(&mesh, "Random Shuffle", cache_size, |m| {
        Ok(ShuffleTriangles::new(args.seed).optimize(m)?)
    })?;
    run(&mesh, "Cache", cache_size, |m| Ok(cache_pass.optimize(m)?))?;
    run(&mesh, "Cache+Overdraw", cache_size, |m| {
        let vertex_count = m.vertex_count();
        let mut ordered = vec![0u32; m.indices.len()];
        let mut clusters = Clusters::new();
        optimize_post_transform(&mut ordered, &m.indices, vertex_count, cache_size, Some(&mut clusters))?;
        optimize_overdraw(
            &mut m.indices,
            &ordered,
            &m.vertices[m.position_offset..],
            m.stride,
            vertex_count,
            &clusters,
            cache_size,
            args.threshold,
        )?;
        Ok(())
    })?;
    run(&mesh, "Overdraw Only", cache_size, |m| {
        let mut optimizer = OverdrawOptimizer::single_cluster();
        optimizer.config.cache_size = cache_size;
        Ok(optimizer.optimize(m)?)
    })?;

    Ok(())
}
