//! Closed solids from heightfields.
//!
//! Samples sit on a regular grid. Every 2x2 block of valid samples is a quad
//! and yields two top triangles plus the mirrored pair on the floor. Quad
//! edges with a quad on only one side are silhouette edges and get a vertical
//! wall from the top surface down to the floor. Where exactly two quads touch
//! diagonally at a sample, the sample is split into two vertices so each
//! wall edge stays shared by exactly two triangles.

use rayon::prelude::*;

use super::MeshComponent;
use super::validation::remove_degenerate;

/// One heightfield sample: plan position plus top and floor heights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidSample {
    pub x: f64,
    pub y: f64,
    pub top: f64,
    pub bottom: f64,
}

/// A row-major grid of optional samples to close into a solid
#[derive(Debug, Clone)]
pub struct SolidField {
    pub width: usize,
    pub height: usize,
    /// Increasing (col, row) map to a clockwise frame when seen from +z
    pub mirrored: bool,
    pub samples: Vec<Option<SolidSample>>,
}

const NO_VERTEX: u32 = u32::MAX;

struct QuadMask {
    width: usize,
    height: usize,
    present: Vec<bool>,
}

impl QuadMask {
    fn new(field: &SolidField) -> Self {
        let width = field.width.saturating_sub(1);
        let height = field.height.saturating_sub(1);
        let present = (0..width * height)
            .into_par_iter()
            .map(|q| {
                let (r, c) = (q / width, q % width);
                [(r, c), (r, c + 1), (r + 1, c), (r + 1, c + 1)]
                    .iter()
                    .all(|&(sr, sc)| field.samples[sr * field.width + sc].is_some())
            })
            .collect();
        Self {
            width,
            height,
            present,
        }
    }

    /// Quad at signed (row, col); out-of-range quads are absent
    fn has(&self, row: isize, col: isize) -> bool {
        row >= 0
            && col >= 0
            && (row as usize) < self.height
            && (col as usize) < self.width
            && self.present[row as usize * self.width + col as usize]
    }

    fn count(&self) -> usize {
        self.present.iter().filter(|&&p| p).count()
    }
}

struct VertexIndex {
    width: usize,
    primary: Vec<u32>,
    /// Second copy of a pinch sample, used by the quad whose top row holds it
    secondary: Vec<u32>,
    /// Number of top-surface vertices; floor vertex = top vertex + offset
    offset: u32,
}

impl VertexIndex {
    fn build(field: &SolidField, quads: &QuadMask) -> (Self, Vec<[f32; 3]>) {
        let n = field.width * field.height;
        let mut primary = vec![NO_VERTEX; n];
        let mut secondary = vec![NO_VERTEX; n];
        let mut tops: Vec<[f32; 3]> = Vec::new();
        let mut bottoms: Vec<[f32; 3]> = Vec::new();

        for (i, sample) in field.samples.iter().enumerate() {
            let Some(s) = sample else { continue };
            let (r, c) = ((i / field.width) as isize, (i % field.width) as isize);
            let nw = quads.has(r - 1, c - 1);
            let ne = quads.has(r - 1, c);
            let sw = quads.has(r, c - 1);
            let se = quads.has(r, c);
            if !(nw || ne || sw || se) {
                continue;
            }

            let top = [s.x as f32, s.y as f32, s.top as f32];
            let bottom = [s.x as f32, s.y as f32, s.bottom as f32];

            primary[i] = tops.len() as u32;
            tops.push(top);
            bottoms.push(bottom);

            let pinched = (nw && se && !ne && !sw) || (ne && sw && !nw && !se);
            if pinched {
                secondary[i] = tops.len() as u32;
                tops.push(top);
                bottoms.push(bottom);
            }
        }

        let offset = tops.len() as u32;
        tops.extend(bottoms);
        (
            Self {
                width: field.width,
                primary,
                secondary,
                offset,
            },
            tops,
        )
    }

    /// Top vertex for corner (dr, dc) of quad (qr, qc)
    fn corner(&self, qr: usize, qc: usize, dr: usize, dc: usize) -> u32 {
        let i = (qr + dr) * self.width + qc + dc;
        if dr == 0 && self.secondary[i] != NO_VERTEX {
            self.secondary[i]
        } else {
            self.primary[i]
        }
    }
}

/// Close a heightfield into a watertight solid.
///
/// Returns an empty component when no 2x2 block of valid samples exists.
/// Samples whose top equals their floor produce zero-height walls, which are
/// dropped as degenerate; callers keep `top > bottom` to stay closed.
pub fn build_solid(field: &SolidField, name: &str) -> MeshComponent {
    let quads = QuadMask::new(field);
    if quads.count() == 0 {
        return MeshComponent::new(name);
    }

    let (index, vertices) = VertexIndex::build(field, &quads);
    let off = index.offset;
    let orient = |t: [u32; 3]| {
        if field.mirrored {
            [t[0], t[2], t[1]]
        } else {
            t
        }
    };

    // Top and floor caps
    let caps: Vec<[u32; 3]> = (0..quads.height)
        .into_par_iter()
        .flat_map_iter(|r| {
            let quads = &quads;
            let index = &index;
            (0..quads.width)
                .filter(move |&c| quads.has(r as isize, c as isize))
                .flat_map(move |c| {
                    let a = index.corner(r, c, 0, 0);
                    let b = index.corner(r, c, 0, 1);
                    let cc = index.corner(r, c, 1, 0);
                    let d = index.corner(r, c, 1, 1);
                    [
                        orient([a, b, d]),
                        orient([a, d, cc]),
                        orient([a + off, d + off, b + off]),
                        orient([a + off, cc + off, d + off]),
                    ]
                })
        })
        .collect();

    // Walls along silhouette edges. (p, q) follows the top triangle's
    // traversal of the edge; the wall walks it the other way.
    let wall = |p: u32, q: u32| {
        let (p, q) = if field.mirrored { (q, p) } else { (p, q) };
        [[q, p, p + off], [q, p + off, q + off]]
    };

    let horizontal: Vec<[u32; 3]> = (0..field.height)
        .into_par_iter()
        .flat_map_iter(|r| {
            let quads = &quads;
            let index = &index;
            (0..quads.width).flat_map(move |c| {
                let (ri, ci) = (r as isize, c as isize);
                let below = quads.has(ri, ci);
                let above = quads.has(ri - 1, ci);
                let edge = match (above, below) {
                    (false, true) => Some((index.corner(r, c, 0, 0), index.corner(r, c, 0, 1))),
                    (true, false) => Some((
                        index.corner(r - 1, c, 1, 1),
                        index.corner(r - 1, c, 1, 0),
                    )),
                    _ => None,
                };
                edge.into_iter().flat_map(move |(p, q)| wall(p, q))
            })
        })
        .collect();

    let vertical: Vec<[u32; 3]> = (0..quads.height)
        .into_par_iter()
        .flat_map_iter(|r| {
            let quads = &quads;
            let index = &index;
            (0..field.width).flat_map(move |c| {
                let (ri, ci) = (r as isize, c as isize);
                let right = quads.has(ri, ci);
                let left = quads.has(ri, ci - 1);
                let edge = match (left, right) {
                    (false, true) => Some((index.corner(r, c, 1, 0), index.corner(r, c, 0, 0))),
                    (true, false) => Some((
                        index.corner(r, c - 1, 0, 1),
                        index.corner(r, c - 1, 1, 1),
                    )),
                    _ => None,
                };
                edge.into_iter().flat_map(move |(p, q)| wall(p, q))
            })
        })
        .collect();

    let mut triangles = caps;
    triangles.extend(horizontal);
    triangles.extend(vertical);
    remove_degenerate(&vertices, &mut triangles);

    MeshComponent::from_parts(name, vertices, triangles)
}
