//! Software depth rasterizer used to estimate overdraw
//!
//! The mesh is scaled into a square viewport and drawn along the three
//! coordinate axes. Triangles facing the positive and negative direction of
//! an axis go to separate depth buffers, so every triangle is seen from the
//! side it faces. Edges use fixed-point coordinates with a top-left fill
//! rule: a pixel center on an edge shared by two triangles is shaded once.

use meshtune_core::{Bounded, OverdrawStatistics, PositionStream};

/// Side of the square viewport in pixels
pub const VIEWPORT: usize = 256;

/// Sub-pixel precision of snapped coordinates
const SUBPIXEL: i64 = 16;

const CELLS: usize = VIEWPORT * VIEWPORT;

/// (u, v, depth) component order for the views along x, y and z
const VIEWS: [[usize; 3]; 3] = [[1, 2, 0], [2, 0, 1], [0, 1, 2]];

/// Vertex in snapped viewport space
#[derive(Debug, Clone, Copy, Default)]
struct Snapped {
    fixed: [i64; 3],
    depth: [f32; 3],
}

#[derive(Debug, Clone, Copy)]
struct Corner {
    u: i64,
    v: i64,
    depth: f32,
}

/// Depth and fragment count buffers for one facing
struct Target {
    depth: Vec<f32>,
    shaded: Vec<u32>,
}

impl Target {
    fn new() -> Self {
        Self {
            depth: vec![f32::NEG_INFINITY; CELLS],
            shaded: vec![0; CELLS],
        }
    }

    fn reset(&mut self) {
        self.depth.fill(f32::NEG_INFINITY);
        self.shaded.fill(0);
    }

    fn accumulate(&self, covered: &mut u64, shaded: &mut u64) {
        for &count in &self.shaded {
            if count > 0 {
                *covered += 1;
                *shaded += count as u64;
            }
        }
    }
}

/// Reusable overdraw estimator.
///
/// Holds the depth buffers between runs so repeated estimates on the same
/// mesh do not reallocate.
pub struct OverdrawRasterizer {
    front: Target,
    back: Target,
    snapped: Vec<Snapped>,
}

impl Default for OverdrawRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl OverdrawRasterizer {
    pub fn new() -> Self {
        Self {
            front: Target::new(),
            back: Target::new(),
            snapped: Vec::new(),
        }
    }

    /// Draw `indices` in order and count covered and shaded pixels.
    ///
    /// Indices must already be validated against `positions`.
    pub fn rasterize(&mut self, indices: &[u32], positions: &PositionStream) -> OverdrawStatistics {
        if indices.is_empty() || !self.snap(positions) {
            return OverdrawStatistics::default();
        }

        let mut covered = 0u64;
        let mut shaded = 0u64;

        for view in VIEWS {
            self.front.reset();
            self.back.reset();

            for triangle in indices.chunks_exact(3) {
                let corner = |vertex: u32| {
                    let s = &self.snapped[vertex as usize];
                    Corner {
                        u: s.fixed[view[0]],
                        v: s.fixed[view[1]],
                        depth: s.depth[view[2]],
                    }
                };
                let (a, b, c) = (corner(triangle[0]), corner(triangle[1]), corner(triangle[2]));

                let area = edge(a, b, c.u, c.v);
                if area > 0 {
                    draw(&mut self.front, a, b, c, area, 1.0);
                } else if area < 0 {
                    // mirror the winding so the triangle is counter-clockwise
                    draw(&mut self.back, a, c, b, -area, -1.0);
                }
            }

            self.front.accumulate(&mut covered, &mut shaded);
            self.back.accumulate(&mut covered, &mut shaded);
        }

        OverdrawStatistics::from_counts(covered, shaded)
    }

    /// Snap all positions into the viewport; false when the mesh has no extent
    fn snap(&mut self, positions: &PositionStream) -> bool {
        let (min, _) = positions.bounding_box();
        let extent = positions.max_extent();
        if !extent.is_finite() || extent <= 0.0 {
            log::debug!("overdraw estimate skipped: mesh extent is {}", extent);
            return false;
        }

        let scale = VIEWPORT as f32 / extent;
        let origin = [min.x, min.y, min.z];

        self.snapped.clear();
        self.snapped.extend(positions.iter().map(|p| {
            let mut snapped = Snapped::default();
            for axis in 0..3 {
                let scaled = (p[axis] - origin[axis]) * scale;
                snapped.fixed[axis] = (scaled * SUBPIXEL as f32).round() as i64;
                snapped.depth[axis] = scaled;
            }
            snapped
        }));
        true
    }
}

/// Twice the signed area of (a, b, p); positive when p is left of a -> b
#[inline]
fn edge(a: Corner, b: Corner, pu: i64, pv: i64) -> i64 {
    (b.u - a.u) * (pv - a.v) - (b.v - a.v) * (pu - a.u)
}

/// Whether pixel centers exactly on edge a -> b belong to this triangle
#[inline]
fn owns_edge(a: Corner, b: Corner) -> bool {
    let (du, dv) = (b.u - a.u, b.v - a.v);
    dv > 0 || (dv == 0 && du < 0)
}

#[inline]
fn inside(w: i64, owned: bool) -> bool {
    w > 0 || (w == 0 && owned)
}

/// Draw a counter-clockwise triangle; `facing` flips depth so the nearer
/// fragment always has the larger key.
fn draw(target: &mut Target, a: Corner, b: Corner, c: Corner, area: i64, facing: f32) {
    let last = VIEWPORT as i64 - 1;
    let min_x = (a.u.min(b.u).min(c.u) / SUBPIXEL).clamp(0, last);
    let max_x = (a.u.max(b.u).max(c.u) / SUBPIXEL).clamp(0, last);
    let min_y = (a.v.min(b.v).min(c.v) / SUBPIXEL).clamp(0, last);
    let max_y = (a.v.max(b.v).max(c.v) / SUBPIXEL).clamp(0, last);

    let own_bc = owns_edge(b, c);
    let own_ca = owns_edge(c, a);
    let own_ab = owns_edge(a, b);
    let inv_area = 1.0 / area as f64;

    for y in min_y..=max_y {
        let pv = y * SUBPIXEL + SUBPIXEL / 2;
        for x in min_x..=max_x {
            let pu = x * SUBPIXEL + SUBPIXEL / 2;

            let w0 = edge(b, c, pu, pv);
            let w1 = edge(c, a, pu, pv);
            let w2 = edge(a, b, pu, pv);
            if !(inside(w0, own_bc) && inside(w1, own_ca) && inside(w2, own_ab)) {
                continue;
            }

            let depth = (w0 as f64 * a.depth as f64
                + w1 as f64 * b.depth as f64
                + w2 as f64 * c.depth as f64)
                * inv_area;
            let key = depth as f32 * facing;

            let cell = y as usize * VIEWPORT + x as usize;
            if key > target.depth[cell] {
                target.depth[cell] = key;
                target.shaded[cell] += 1;
            }
        }
    }
}

/// Estimate overdraw of `indices` drawn in order
pub fn estimate_overdraw(indices: &[u32], positions: &PositionStream) -> OverdrawStatistics {
    OverdrawRasterizer::new().rasterize(indices, positions)
}
