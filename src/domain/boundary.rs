use geo::algorithm::line_intersection::LineIntersection;
use geo::orient::{Direction, Orient};
use geo::sweep::{Cross, Intersections, LineOrPoint};
use geo::{BoundingRect, Coord, Line, LineString, MultiPolygon, Polygon};
use serde::Deserialize;

use crate::error::{PipelineError, PipelineResult};
use crate::geometry::Extent;

/// Point-in-polygon rule used when clipping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillRule {
    /// Inside when a ray from the point crosses an odd number of edges
    #[default]
    EvenOdd,
    /// Inside when the winding number is not zero
    NonZero,
}

impl std::str::FromStr for FillRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "even-odd" | "evenodd" => Ok(FillRule::EvenOdd),
            "non-zero" | "nonzero" | "winding" => Ok(FillRule::NonZero),
            other => Err(format!("unknown fill rule '{other}', expected even-odd or non-zero")),
        }
    }
}

/// Clip polygon (or multi-polygon) in the grid's CRS
#[derive(Debug, Clone)]
pub struct Boundary {
    shape: MultiPolygon<f64>,
    extent: Extent,
}

impl Boundary {
    /// Build a boundary from raw rings.
    ///
    /// `polygons[i][0]` is the exterior ring of polygon `i`, the rest are holes.
    /// Every ring must be explicitly closed. Within a polygon no ring may cross
    /// or touch itself or another ring. Repeated consecutive vertices are
    /// dropped.
    pub fn from_rings(polygons: Vec<Vec<Vec<(f64, f64)>>>) -> PipelineResult<Self> {
        let mut shapes = Vec::with_capacity(polygons.len());

        for (p, rings) in polygons.into_iter().enumerate() {
            let malformed = |ring: usize, reason: String| PipelineError::MalformedBoundary {
                polygon: p,
                ring,
                reason,
            };

            let rings: Vec<Vec<(f64, f64)>> = rings
                .into_iter()
                .map(|mut ring| {
                    ring.dedup();
                    ring
                })
                .collect();
            for (r, ring) in rings.iter().enumerate() {
                validate_ring(ring).map_err(|reason| malformed(r, reason))?;
            }
            if let Some((r, reason)) = find_crossing(&rings) {
                return Err(malformed(r, reason));
            }

            let mut rings = rings.into_iter().map(LineString::from);
            let Some(exterior) = rings.next() else {
                return Err(malformed(0, "polygon has no exterior ring".to_string()));
            };
            shapes.push(Polygon::new(exterior, rings.collect()).orient(Direction::Default));
        }

        let shape = MultiPolygon::new(shapes);
        let extent = shape
            .bounding_rect()
            .map(Extent::from)
            .ok_or_else(|| PipelineError::MalformedBoundary {
                polygon: 0,
                ring: 0,
                reason: "boundary has no polygons".to_string(),
            })?;

        Ok(Self { shape, extent })
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn polygons(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    /// Test whether a point lies inside the boundary under `rule`
    pub fn contains(&self, x: f64, y: f64, rule: FillRule) -> bool {
        if x < self.extent.min_x
            || x > self.extent.max_x
            || y < self.extent.min_y
            || y > self.extent.max_y
        {
            return false;
        }

        let point = Coord { x, y };
        let rings = self
            .shape
            .iter()
            .flat_map(|poly| std::iter::once(poly.exterior()).chain(poly.interiors()));

        match rule {
            FillRule::EvenOdd => rings.map(|ring| crossings(ring, point)).sum::<usize>() % 2 == 1,
            FillRule::NonZero => rings.map(|ring| winding_number(ring, point)).sum::<i32>() != 0,
        }
    }
}

/// Check a raw ring for size, finite coordinates and closure
fn validate_ring(ring: &[(f64, f64)]) -> Result<(), String> {
    if ring.len() < 4 {
        return Err(format!("ring has {} vertices, need at least 4", ring.len()));
    }
    if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err("ring has non-finite coordinates".to_string());
    }
    if ring.first() != ring.last() {
        return Err("ring is not closed (first vertex != last vertex)".to_string());
    }
    Ok(())
}

/// A ring edge tagged with its ring and position, for the sweep
#[derive(Debug, Clone, Copy)]
struct RingEdge {
    ring: usize,
    index: usize,
    line: Line<f64>,
}

impl Cross for RingEdge {
    type Scalar = f64;

    fn line(&self) -> LineOrPoint<f64> {
        self.line.into()
    }
}

/// First pair of edges that cross or touch anywhere other than the vertex
/// shared by neighbouring edges of one ring. Returns the later ring's index
/// and a description.
fn find_crossing(rings: &[Vec<(f64, f64)>]) -> Option<(usize, String)> {
    let edge_counts: Vec<usize> = rings.iter().map(|r| r.len() - 1).collect();
    let edges = rings.iter().enumerate().flat_map(|(ring, points)| {
        points.windows(2).enumerate().map(move |(index, w)| RingEdge {
            ring,
            index,
            line: Line::new(Coord::from(w[0]), Coord::from(w[1])),
        })
    });

    Intersections::<RingEdge>::from_iter(edges).find_map(|(a, b, hit)| {
        let (a, b) = if (a.ring, a.index) <= (b.ring, b.index) {
            (a, b)
        } else {
            (b, a)
        };
        let neighbours = a.ring == b.ring && {
            let n = edge_counts[a.ring];
            a.index + 1 == b.index || (b.index + 1) % n == a.index
        };
        let at_vertex = match hit {
            LineIntersection::SinglePoint { is_proper, .. } => !is_proper,
            LineIntersection::Collinear { intersection } => intersection.start == intersection.end,
        };
        if neighbours && at_vertex {
            return None;
        }

        Some(if a.ring == b.ring {
            (
                a.ring,
                format!("ring crosses itself at segments {} and {}", a.index, b.index),
            )
        } else {
            (
                b.ring,
                format!(
                    "ring meets ring {} at segments {} and {}",
                    a.ring, b.index, a.index
                ),
            )
        })
    })
}

/// Number of ring edges crossed by a ray cast from `p` towards +x
fn crossings(ring: &LineString<f64>, p: Coord<f64>) -> usize {
    ring.lines()
        .filter(|line| {
            let (a, b) = (line.start, line.end);
            (a.y > p.y) != (b.y > p.y) && p.x < a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x)
        })
        .count()
}

/// Signed winding number of a ring around `p`
fn winding_number(ring: &LineString<f64>, p: Coord<f64>) -> i32 {
    let side = |a: Coord<f64>, b: Coord<f64>| (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y);

    ring.lines()
        .map(|line| {
            let (a, b) = (line.start, line.end);
            if a.y <= p.y {
                if b.y > p.y && side(a, b) > 0.0 { 1 } else { 0 }
            } else if b.y <= p.y && side(a, b) < 0.0 {
                -1
            } else {
                0
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<(f64, f64)> {
        vec![
            (x0, y0),
            (x0 + size, y0),
            (x0 + size, y0 + size),
            (x0, y0 + size),
            (x0, y0),
        ]
    }

    #[test]
    fn test_square_contains() {
        let boundary = Boundary::from_rings(vec![vec![square(0.0, 0.0, 10.0)]]).unwrap();

        assert!(boundary.contains(5.0, 5.0, FillRule::EvenOdd));
        assert!(boundary.contains(5.0, 5.0, FillRule::NonZero));
        assert!(!boundary.contains(15.0, 5.0, FillRule::EvenOdd));
        assert_eq!(boundary.extent().max_x, 10.0);
    }

    #[test]
    fn test_hole_excluded() {
        let boundary =
            Boundary::from_rings(vec![vec![square(0.0, 0.0, 10.0), square(4.0, 4.0, 2.0)]])
                .unwrap();

        assert!(!boundary.contains(5.0, 5.0, FillRule::EvenOdd));
        assert!(!boundary.contains(5.0, 5.0, FillRule::NonZero));
        assert!(boundary.contains(1.0, 1.0, FillRule::NonZero));
    }

    #[test]
    fn test_fill_rules_differ_on_overlap() {
        // Two overlapping squares: even-odd cancels the overlap, non-zero keeps it
        let boundary =
            Boundary::from_rings(vec![vec![square(0.0, 0.0, 10.0)], vec![square(5.0, 5.0, 10.0)]])
                .unwrap();

        assert!(!boundary.contains(7.0, 7.0, FillRule::EvenOdd));
        assert!(boundary.contains(7.0, 7.0, FillRule::NonZero));
        assert!(boundary.contains(2.0, 2.0, FillRule::EvenOdd));
    }

    #[test]
    fn test_unclosed_ring_rejected() {
        let ring = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let err = Boundary::from_rings(vec![vec![ring]]).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedBoundary { .. }));
    }

    #[test]
    fn test_self_intersecting_ring_rejected() {
        let bowtie = vec![(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0), (0.0, 0.0)];
        let err = Boundary::from_rings(vec![vec![bowtie]]).unwrap_err();
        match err {
            PipelineError::MalformedBoundary { polygon, ring, reason } => {
                assert_eq!((polygon, ring), (0, 0));
                assert!(reason.contains("crosses itself"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_hole_crossing_exterior_rejected() {
        let err =
            Boundary::from_rings(vec![vec![square(0.0, 0.0, 10.0), square(8.0, 4.0, 4.0)]])
                .unwrap_err();
        match err {
            PipelineError::MalformedBoundary { polygon, ring, reason } => {
                assert_eq!((polygon, ring), (0, 1));
                assert!(reason.contains("meets ring 0"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ring_touching_itself_rejected() {
        // Two lobes sharing the vertex (5, 5)
        let figure_eight = vec![
            (0.0, 0.0),
            (5.0, 5.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (5.0, 5.0),
            (0.0, 10.0),
            (0.0, 0.0),
        ];
        let err = Boundary::from_rings(vec![vec![figure_eight]]).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedBoundary { ring: 0, .. }));
    }

    #[test]
    fn test_repeated_vertices_accepted() {
        let ring = vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (0.0, 0.0),
        ];
        let boundary = Boundary::from_rings(vec![vec![ring]]).unwrap();
        assert_eq!(boundary.polygons().0[0].exterior().0.len(), 5);
    }

    #[test]
    fn test_dense_ring_accepted() {
        let n = 20_000;
        let mut ring: Vec<(f64, f64)> = (0..n)
            .map(|i| {
                let t = i as f64 / n as f64 * std::f64::consts::TAU;
                (1000.0 * t.cos(), 1000.0 * t.sin())
            })
            .collect();
        ring.push(ring[0]);

        let boundary = Boundary::from_rings(vec![vec![ring]]).unwrap();
        assert!(boundary.contains(0.0, 0.0, FillRule::EvenOdd));
    }

    #[test]
    fn test_clockwise_exterior_accepted() {
        let mut ring = square(0.0, 0.0, 10.0);
        ring.reverse();
        let boundary = Boundary::from_rings(vec![vec![ring]]).unwrap();
        assert!(boundary.contains(5.0, 5.0, FillRule::NonZero));
    }

    #[test]
    fn test_fill_rule_parse() {
        assert_eq!("even-odd".parse::<FillRule>(), Ok(FillRule::EvenOdd));
        assert_eq!("NonZero".parse::<FillRule>(), Ok(FillRule::NonZero));
        assert!("inside".parse::<FillRule>().is_err());
    }
}
