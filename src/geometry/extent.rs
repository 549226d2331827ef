use geo::Rect;

/// Axis-aligned bounding box in grid CRS units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            max_x: min_x.max(max_x),
            min_y: min_y.min(max_y),
            max_y: min_y.max(max_y),
        }
    }

    /// Create an extent from a set of points
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut extent = Self::new(x0, y0, x0, y0);
        extent.expand(rest);
        Some(extent)
    }

    /// Expand the extent to include another set of points
    pub fn expand(&mut self, points: &[(f64, f64)]) {
        for &(x, y) in points {
            self.min_x = self.min_x.min(x);
            self.max_x = self.max_x.max(x);
            self.min_y = self.min_y.min(y);
            self.max_y = self.max_y.max(y);
        }
    }

    /// Smallest extent containing both
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

impl From<Rect<f64>> for Extent {
    fn from(rect: Rect<f64>) -> Self {
        Extent::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_from_points() {
        let points = vec![(0.0, 0.0), (1000.0, 2000.0), (500.0, 1000.0)];
        let extent = Extent::from_points(&points).unwrap();

        assert_eq!(extent.min_x, 0.0);
        assert_eq!(extent.max_x, 1000.0);
        assert_eq!(extent.min_y, 0.0);
        assert_eq!(extent.max_y, 2000.0);
        assert!(Extent::from_points(&[]).is_none());
    }

    #[test]
    fn test_union() {
        let a = Extent::new(0.0, 0.0, 10.0, 10.0);
        let b = Extent::new(20.0, 5.0, 30.0, 15.0);

        let u = a.union(&b);
        assert_eq!(u.width(), 30.0);
        assert_eq!(u.height(), 15.0);
    }
}
