use serde::{Deserialize, Serialize};

use crate::error::StudioFinderError;

// --- Geography ---

/// Decimal places kept on every center coordinate. Keeps CSV round-trips
/// and value comparisons stable.
pub const COORD_DECIMALS: i32 = 6;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

pub fn round_coord(value: f64) -> f64 {
    let factor = 10f64.powi(COORD_DECIMALS);
    (value * factor).round() / factor
}

/// Planar (equirectangular) distance in meters between two points.
/// Good enough at metro/region scale; not a great-circle distance.
pub fn equirectangular_distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let mean_lat = ((lat1 + lat2) / 2.0).to_radians();
    let dx = METERS_PER_DEGREE * mean_lat.cos() * (lng2 - lng1);
    let dy = METERS_PER_DEGREE * (lat2 - lat1);
    (dx * dx + dy * dy).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// A single point around which a radius search is issued.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchCenter {
    pub lat: f64,
    pub lng: f64,
}

impl SearchCenter {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat: round_coord(lat),
            lng: round_coord(lng),
        }
    }

    pub fn distance_m(&self, other: &SearchCenter) -> f64 {
        equirectangular_distance_m(self.lat, self.lng, other.lat, other.lng)
    }
}

impl std::fmt::Display for SearchCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lat, self.lng)
    }
}

/// Region bounds. Only constructible with `lat_min < lat_max` and
/// `lng_min < lng_max`, all within -90..90 / -180..180.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
    pub region_code: String,
    pub region_name: String,
}

/// (code, name, lat_min, lat_max, lng_min, lng_max)
const BUILTIN_REGIONS: &[(&str, &str, f64, f64, f64, f64)] =
    &[("CA", "California", 32.5, 42.0, -124.5, -114.1)];

impl BoundingBox {
    pub fn new(
        lat_min: f64,
        lat_max: f64,
        lng_min: f64,
        lng_max: f64,
        region_code: &str,
        region_name: &str,
    ) -> Result<Self, StudioFinderError> {
        let all_finite = [lat_min, lat_max, lng_min, lng_max]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(StudioFinderError::config(format!(
                "bounding box for '{region_code}' has non-finite bounds"
            )));
        }
        let lat_in_range = [lat_min, lat_max].iter().all(|v| (-90.0..=90.0).contains(v));
        let lng_in_range = [lng_min, lng_max].iter().all(|v| (-180.0..=180.0).contains(v));
        if !lat_in_range || !lng_in_range {
            return Err(StudioFinderError::config(format!(
                "bounding box for '{region_code}' is outside lat -90..90 / lng -180..180 \
                 (got lat {lat_min}..{lat_max}, lng {lng_min}..{lng_max})"
            )));
        }
        if lat_min >= lat_max || lng_min >= lng_max {
            return Err(StudioFinderError::config(format!(
                "bounding box for '{region_code}' must satisfy lat_min < lat_max and lng_min < lng_max \
                 (got lat {lat_min}..{lat_max}, lng {lng_min}..{lng_max})"
            )));
        }
        Ok(Self {
            lat_min,
            lat_max,
            lng_min,
            lng_max,
            region_code: region_code.to_uppercase(),
            region_name: region_name.to_string(),
        })
    }

    /// Look up a region in the built-in table.
    pub fn builtin(region_code: &str) -> Option<Self> {
        let code = region_code.to_uppercase();
        BUILTIN_REGIONS
            .iter()
            .find(|(c, ..)| *c == code)
            .map(|&(c, name, lat_min, lat_max, lng_min, lng_max)| Self {
                lat_min,
                lat_max,
                lng_min,
                lng_max,
                region_code: c.to_string(),
                region_name: name.to_string(),
            })
    }

    /// Smallest box containing every center. A single center (or a
    /// single row/column of them) is widened by one coordinate step so the
    /// box stays valid.
    pub fn from_centers(
        region_code: &str,
        centers: &[SearchCenter],
    ) -> Result<Self, StudioFinderError> {
        let first = centers.first().ok_or_else(|| {
            StudioFinderError::config(format!("no centers to derive bounds for '{region_code}'"))
        })?;
        let (mut lat_min, mut lat_max, mut lng_min, mut lng_max) =
            (first.lat, first.lat, first.lng, first.lng);
        for c in centers {
            lat_min = lat_min.min(c.lat);
            lat_max = lat_max.max(c.lat);
            lng_min = lng_min.min(c.lng);
            lng_max = lng_max.max(c.lng);
        }
        let pad = 10f64.powi(-COORD_DECIMALS);
        if lat_min == lat_max {
            lat_max += pad;
        }
        if lng_min == lng_max {
            lng_max += pad;
        }
        Self::new(lat_min, lat_max, lng_min, lng_max, region_code, region_code)
    }

    pub fn contains(&self, lat: f64, lng: f64, epsilon: f64) -> bool {
        lat >= self.lat_min - epsilon
            && lat <= self.lat_max + epsilon
            && lng >= self.lng_min - epsilon
            && lng <= self.lng_max + epsilon
    }
}

// --- Destination schema ---

/// Destination header row. Order is significant: the dedup key column is
/// read back by position.
pub const HEADERS: [&str; 14] = [
    "Business Name",
    "Address",
    "City",
    "Zip",
    "Website",
    "Phone",
    "Email",
    "maps_url",
    "lat",
    "lng",
    "place_id",
    "keyword",
    "center_lat",
    "center_lng",
];

/// Zero-based index of the dedup key (`place_id`) column.
pub const DEDUP_KEY_COLUMN: usize = 10;

/// Spreadsheet column letter for a 1-based column index (1 → A, 27 → AA).
pub fn column_letter(index_one_based: usize) -> String {
    let mut idx = index_one_based;
    let mut letters = Vec::new();
    while idx > 0 {
        let rem = (idx - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        idx = (idx - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// The persisted row. `external_id` is unique within a destination tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub website: String,
    pub phone: String,
    pub email: String,
    pub map_url: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub external_id: String,
    pub keyword: String,
    pub center_lat: f64,
    pub center_lng: f64,
}

impl CanonicalRecord {
    /// Cells in `HEADERS` order, numbers kept numeric for the sheet.
    pub fn to_sheet_row(&self) -> Vec<serde_json::Value> {
        use serde_json::Value;
        let opt_num = |v: Option<f64>| v.map(Value::from).unwrap_or_else(|| Value::from(""));
        vec![
            Value::from(self.name.as_str()),
            Value::from(self.address.as_str()),
            Value::from(self.city.as_str()),
            Value::from(self.postal_code.as_str()),
            Value::from(self.website.as_str()),
            Value::from(self.phone.as_str()),
            Value::from(self.email.as_str()),
            Value::from(self.map_url.as_str()),
            opt_num(self.lat),
            opt_num(self.lng),
            Value::from(self.external_id.as_str()),
            Value::from(self.keyword.as_str()),
            Value::from(self.center_lat),
            Value::from(self.center_lng),
        ]
    }

    /// Cells in `HEADERS` order as text, for the local CSV backup.
    pub fn to_text_row(&self) -> Vec<String> {
        let opt_num = |v: Option<f64>| v.map(|n| n.to_string()).unwrap_or_default();
        vec![
            self.name.clone(),
            self.address.clone(),
            self.city.clone(),
            self.postal_code.clone(),
            self.website.clone(),
            self.phone.clone(),
            self.email.clone(),
            self.map_url.clone(),
            opt_num(self.lat),
            opt_num(self.lng),
            self.external_id.clone(),
            self.keyword.clone(),
            self.center_lat.to_string(),
            self.center_lng.to_string(),
        ]
    }
}

// --- Run summary ---

/// Computed once at the end of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub region_code: String,
    pub region_name: String,
    pub destination_tab: String,
    pub added_count: usize,
    pub api_request_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_rounds_to_six_decimals() {
        let c = SearchCenter::new(32.123456789, -117.000000449);
        assert_eq!(c.lat, 32.123457);
        assert_eq!(c.lng, -117.0);
    }

    #[test]
    fn bbox_rejects_inverted_bounds() {
        assert!(BoundingBox::new(42.0, 32.5, -124.5, -114.1, "CA", "California").is_err());
        assert!(BoundingBox::new(32.5, 42.0, -114.1, -124.5, "CA", "California").is_err());
        assert!(BoundingBox::new(32.5, 32.5, -124.5, -114.1, "CA", "California").is_err());
    }

    #[test]
    fn bbox_rejects_coordinates_off_the_globe() {
        assert!(BoundingBox::new(85.0, 95.0, 0.0, 10.0, "NP", "North").is_err());
        assert!(BoundingBox::new(-91.0, -80.0, 0.0, 10.0, "SP", "South").is_err());
        assert!(BoundingBox::new(10.0, 20.0, -181.0, -170.0, "DL", "Dateline").is_err());
        assert!(BoundingBox::new(10.0, 20.0, 170.0, 180.5, "DL", "Dateline").is_err());
        assert!(BoundingBox::new(80.0, 90.0, -180.0, 180.0, "AR", "Arctic").is_ok());
    }

    #[test]
    fn builtin_region_is_case_insensitive() {
        let bbox = BoundingBox::builtin("ca").expect("CA is built in");
        assert_eq!(bbox.region_name, "California");
        assert_eq!(bbox.lat_min, 32.5);
        assert!(BoundingBox::builtin("ZZ").is_none());
    }

    #[test]
    fn bbox_from_single_center_is_valid() {
        let bbox = BoundingBox::from_centers("nv", &[SearchCenter::new(36.1, -115.1)]).unwrap();
        assert_eq!(bbox.region_code, "NV");
        assert!(bbox.lat_min < bbox.lat_max);
        assert!(bbox.contains(36.1, -115.1, 0.0));
    }

    #[test]
    fn bbox_from_no_centers_is_config_error() {
        let err = BoundingBox::from_centers("NV", &[]).unwrap_err();
        assert!(matches!(err, StudioFinderError::Config(_)));
    }

    #[test]
    fn dedup_key_column_is_place_id() {
        assert_eq!(HEADERS[DEDUP_KEY_COLUMN], "place_id");
        assert_eq!(column_letter(DEDUP_KEY_COLUMN + 1), "K");
        assert_eq!(column_letter(HEADERS.len()), "N");
        assert_eq!(column_letter(27), "AA");
    }

    #[test]
    fn five_km_apart_is_about_five_thousand_meters() {
        let a = SearchCenter::new(34.0, -118.0);
        let b = SearchCenter::new(34.0 + 5000.0 / METERS_PER_DEGREE, -118.0);
        let dist = a.distance_m(&b);
        assert!((dist - 5000.0).abs() < 1.0, "expected ~5000m, got {dist}");
    }

    #[test]
    fn record_rows_follow_header_order() {
        let record = CanonicalRecord {
            name: "Harbor Sound".into(),
            address: "1 Pier St".into(),
            city: "San Diego".into(),
            postal_code: "92101".into(),
            website: String::new(),
            phone: String::new(),
            email: String::new(),
            map_url: "https://maps.example/1".into(),
            lat: Some(32.7),
            lng: None,
            external_id: "pid-1".into(),
            keyword: "recording studio".into(),
            center_lat: 32.5,
            center_lng: -117.0,
        };
        let sheet = record.to_sheet_row();
        let text = record.to_text_row();
        assert_eq!(sheet.len(), HEADERS.len());
        assert_eq!(text.len(), HEADERS.len());
        assert_eq!(sheet[DEDUP_KEY_COLUMN], serde_json::json!("pid-1"));
        assert_eq!(sheet[8], serde_json::json!(32.7));
        assert_eq!(sheet[9], serde_json::json!(""));
        assert_eq!(text[9], "");
        assert_eq!(text[12], "32.5");
    }
}
