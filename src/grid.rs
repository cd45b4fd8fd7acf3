//! Lattice of geographic points over a bounded region.
//!
//! Points are stored row-major: `index = grid_y * side + grid_x` where
//! `side = resolution + 1`. Row 0 is the southern edge.

use crate::error::{Result, TerrainError};
use crate::geo::{GeoBounds, GeoPoint};

/// Compass offsets (dx, dy) for 8-neighbor searches.
/// Order: N, NE, E, SE, S, SW, W, NW. Rows grow northward.
pub const COMPASS_OFFSETS: [(i64, i64); 8] = [
    (0, 1),   // N
    (1, 1),   // NE
    (1, 0),   // E
    (1, -1),  // SE
    (0, -1),  // S
    (-1, -1), // SW
    (-1, 0),  // W
    (-1, 1),  // NW
];

/// A `(resolution + 1)²` lattice of geographic points
#[derive(Clone, Debug)]
pub struct PointGrid {
    pub resolution: usize,
    pub bounds: GeoBounds,
    points: Vec<GeoPoint>,
}

impl PointGrid {
    /// Build the lattice for `bounds` at `resolution` cells per side
    pub fn generate(bounds: GeoBounds, resolution: usize) -> Result<Self> {
        if resolution == 0 {
            return Err(TerrainError::InvalidResolution {
                requested: 0,
                min: 1,
                max: usize::MAX,
            });
        }

        let side = resolution + 1;
        let mut points = Vec::with_capacity(side * side);

        for grid_y in 0..side {
            for grid_x in 0..side {
                let norm_x = grid_x as f64 / resolution as f64;
                let norm_y = grid_y as f64 / resolution as f64;
                points.push(GeoPoint {
                    lat: bounds.south + norm_y * bounds.lat_span(),
                    lon: bounds.west + norm_x * bounds.lon_span(),
                    grid_x,
                    grid_y,
                    norm_x,
                    norm_y,
                });
            }
        }

        Ok(Self { resolution, bounds, points })
    }

    /// Points per side
    pub fn side(&self) -> usize {
        self.resolution + 1
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn index(&self, grid_x: usize, grid_y: usize) -> usize {
        grid_y * self.side() + grid_x
    }

    pub fn get(&self, grid_x: usize, grid_y: usize) -> &GeoPoint {
        &self.points[self.index(grid_x, grid_y)]
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// Lattice index of the point `(dx, dy)` steps away, if inside the grid
    pub fn offset(&self, index: usize, dx: i64, dy: i64) -> Option<usize> {
        let side = self.side() as i64;
        let x = (index as i64 % side) + dx;
        let y = (index as i64 / side) + dy;
        if x >= 0 && x < side && y >= 0 && y < side {
            Some((y * side + x) as usize)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> GeoBounds {
        GeoBounds::new(46.0, 7.0, 46.01, 7.01).unwrap()
    }

    #[test]
    fn test_point_count_for_all_resolutions() {
        for resolution in 1..=20 {
            let grid = PointGrid::generate(bounds(), resolution).unwrap();
            assert_eq!(grid.len(), (resolution + 1) * (resolution + 1));
            for p in grid.points() {
                assert!(p.grid_x <= resolution);
                assert!(p.grid_y <= resolution);
                assert!((0.0..=1.0).contains(&p.norm_x));
                assert!((0.0..=1.0).contains(&p.norm_y));
            }
        }
    }

    #[test]
    fn test_row_major_layout_and_corners() {
        let grid = PointGrid::generate(bounds(), 4).unwrap();
        let first = grid.points()[0];
        let last = grid.points()[grid.len() - 1];
        assert_eq!((first.grid_x, first.grid_y), (0, 0));
        assert_eq!((last.grid_x, last.grid_y), (4, 4));
        assert!((first.lat - 46.0).abs() < 1e-12);
        assert!((last.lon - 7.01).abs() < 1e-12);

        let p = grid.get(3, 1);
        assert_eq!(grid.index(3, 1), 8);
        assert_eq!((p.grid_x, p.grid_y), (3, 1));
        assert!((p.norm_x - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_zero_resolution() {
        assert!(PointGrid::generate(bounds(), 0).is_err());
    }

    #[test]
    fn test_offset_stays_inside() {
        let grid = PointGrid::generate(bounds(), 4).unwrap();
        assert_eq!(grid.offset(0, -1, 0), None);
        assert_eq!(grid.offset(0, 1, 1), Some(6));
        assert_eq!(grid.offset(24, 1, 0), None);
    }

    #[test]
    fn test_compass_offsets_point_the_right_way() {
        let grid = PointGrid::generate(bounds(), 4).unwrap();
        let center = grid.index(2, 2);
        let origin = grid.points()[center];
        let moved = |k: usize| {
            let (dx, dy) = COMPASS_OFFSETS[k];
            grid.points()[grid.offset(center, dx, dy).unwrap()]
        };

        assert!(moved(0).lat > origin.lat);
        assert_eq!(moved(0).lon, origin.lon);
        assert!(moved(1).lat > origin.lat && moved(1).lon > origin.lon);
        assert!(moved(2).lon > origin.lon);
        assert!(moved(3).lat < origin.lat && moved(3).lon > origin.lon);
        assert!(moved(4).lat < origin.lat);
        assert!(moved(5).lat < origin.lat && moved(5).lon < origin.lon);
        assert!(moved(6).lon < origin.lon);
        assert!(moved(7).lat > origin.lat && moved(7).lon < origin.lon);
    }
}
