//! Lattice of search centers covering a bounding box.
//!
//! Rows are a constant latitude step apart. Each row gets its own
//! longitude step because meridians converge toward the poles, so the
//! ground distance between neighbours stays close to the spacing.

use studiofinder_common::{BoundingBox, SearchCenter, StudioFinderError};

/// ~111 km per degree of latitude.
pub const KM_PER_DEGREE_LAT: f64 = 111.0;
/// Length of one degree of longitude at the equator.
pub const KM_PER_DEGREE_LNG_EQUATOR: f64 = 111.320;

/// Slack so boundary rows/columns survive floating-point accumulation.
const BOUNDARY_EPSILON: f64 = 1e-9;

pub fn km_to_deg_lat(km: f64) -> f64 {
    km / KM_PER_DEGREE_LAT
}

pub fn km_to_deg_lng(km: f64, lat_deg: f64) -> f64 {
    km / (KM_PER_DEGREE_LNG_EQUATOR * lat_deg.to_radians().cos())
}

/// A restartable description of the lattice. Iterating is lazy: nothing
/// is generated until asked for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    lat_min: f64,
    lat_max: f64,
    lng_min: f64,
    lng_max: f64,
    spacing_km: f64,
}

impl Grid {
    pub fn new(bbox: &BoundingBox, spacing_km: f64) -> Result<Self, StudioFinderError> {
        if !(spacing_km.is_finite() && spacing_km > 0.0) {
            return Err(StudioFinderError::config(format!(
                "grid spacing must be positive, got {spacing_km}"
            )));
        }
        Ok(Self {
            lat_min: bbox.lat_min,
            lat_max: bbox.lat_max,
            lng_min: bbox.lng_min,
            lng_max: bbox.lng_max,
            spacing_km,
        })
    }

    pub fn iter(&self) -> GridIter {
        GridIter {
            grid: *self,
            lat: self.lat_min,
            lng: self.lng_min,
            lng_step: km_to_deg_lng(self.spacing_km, self.lat_min),
            done: false,
        }
    }
}

impl IntoIterator for Grid {
    type Item = SearchCenter;
    type IntoIter = GridIter;

    fn into_iter(self) -> GridIter {
        self.iter()
    }
}

impl IntoIterator for &Grid {
    type Item = SearchCenter;
    type IntoIter = GridIter;

    fn into_iter(self) -> GridIter {
        self.iter()
    }
}

pub struct GridIter {
    grid: Grid,
    lat: f64,
    lng: f64,
    lng_step: f64,
    done: bool,
}

impl Iterator for GridIter {
    type Item = SearchCenter;

    fn next(&mut self) -> Option<SearchCenter> {
        let g = &self.grid;
        while !self.done {
            if self.lat > g.lat_max + BOUNDARY_EPSILON {
                self.done = true;
                break;
            }
            if self.lng <= g.lng_max + BOUNDARY_EPSILON {
                let center = SearchCenter::new(self.lat, self.lng);
                if self.lng_step.is_finite() && self.lng_step > 0.0 {
                    self.lng += self.lng_step;
                } else {
                    // no usable step at this latitude: one center ends the row
                    self.lng = f64::INFINITY;
                }
                return Some(center);
            }
            self.lat += km_to_deg_lat(g.spacing_km);
            self.lng = g.lng_min;
            self.lng_step = km_to_deg_lng(g.spacing_km, self.lat);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64) -> BoundingBox {
        BoundingBox::new(lat_min, lat_max, lng_min, lng_max, "T", "Test").unwrap()
    }

    #[test]
    fn small_box_with_wide_spacing_yields_its_corner() {
        let grid = Grid::new(&bbox(32.5, 32.6, -117.0, -116.9), 30.0).unwrap();
        let centers: Vec<_> = grid.iter().collect();
        assert_eq!(centers, vec![SearchCenter::new(32.5, -117.0)]);
    }

    #[test]
    fn every_center_lies_inside_the_box() {
        let cases = [
            (bbox(32.5, 42.0, -124.5, -114.1), 30.0),
            (bbox(32.5, 32.6, -117.0, -116.9), 1.0),
            (bbox(-34.2, -33.5, 150.5, 151.4), 5.0),
            (bbox(60.0, 70.0, 10.0, 30.0), 50.0),
            (bbox(0.0, 0.01, 0.0, 0.01), 0.25),
        ];
        for (b, spacing) in cases {
            let grid = Grid::new(&b, spacing).unwrap();
            let mut count = 0;
            for c in &grid {
                count += 1;
                assert!(
                    b.contains(c.lat, c.lng, 1e-6),
                    "{c} outside {b:?} at spacing {spacing}"
                );
            }
            assert!(count > 0, "grid over {b:?} should not be empty");
        }
    }

    #[test]
    fn count_is_deterministic_and_restartable() {
        let grid = Grid::new(&bbox(32.5, 42.0, -124.5, -114.1), 30.0).unwrap();
        let first: Vec<_> = grid.iter().collect();
        let second: Vec<_> = grid.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), Grid::new(&bbox(32.5, 42.0, -124.5, -114.1), 30.0).unwrap().iter().count());
    }

    #[test]
    fn rows_get_sparser_toward_the_pole() {
        let grid = Grid::new(&bbox(0.0, 60.0, 0.0, 10.0), 100.0).unwrap();
        let centers: Vec<_> = grid.iter().collect();
        let equator_row = centers.iter().filter(|c| c.lat == 0.0).count();
        let northern_lat = centers.last().unwrap().lat;
        let northern_row = centers.iter().filter(|c| c.lat == northern_lat).count();
        assert!(northern_row < equator_row);
    }

    #[test]
    fn inclusive_upper_bound_survives_rounding() {
        // 0.3 / (1/111) steps land on the max only up to float error
        let km = 111.0 * 0.1;
        let grid = Grid::new(&bbox(10.0, 10.3, 20.0, 20.05), km).unwrap();
        let lats: Vec<f64> = grid.iter().map(|c| c.lat).collect();
        assert_eq!(lats.first().copied(), Some(10.0));
        assert!(lats.contains(&10.3), "upper row missing: {lats:?}");
    }

    #[test]
    fn generation_is_lazy() {
        // ~1M points at this spacing; taking a few must not build them all
        let grid = Grid::new(&bbox(32.5, 42.0, -124.5, -114.1), 0.1).unwrap();
        let firsts: Vec<_> = grid.iter().take(3).collect();
        assert_eq!(firsts.len(), 3);
        assert_eq!(firsts[0], SearchCenter::new(32.5, -124.5));
    }

    #[test]
    fn boxes_reaching_the_pole_stay_finite_and_inside() {
        let b = bbox(85.0, 90.0, 0.0, 10.0);
        let grid = Grid::new(&b, 300.0).unwrap();
        let centers: Vec<_> = grid.iter().take(1_000).collect();
        assert!(centers.len() < 1_000, "grid over {b:?} did not end");
        for c in &centers {
            assert!(b.contains(c.lat, c.lng, 1e-6), "{c} outside {b:?}");
        }
    }

    #[test]
    fn non_positive_spacing_is_rejected() {
        assert!(Grid::new(&bbox(32.5, 42.0, -124.5, -114.1), 0.0).is_err());
        assert!(Grid::new(&bbox(32.5, 42.0, -124.5, -114.1), -3.0).is_err());
    }
}
