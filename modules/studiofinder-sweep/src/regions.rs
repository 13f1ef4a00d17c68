//! Region bounds and center lists from local CSV files.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use studiofinder_common::{BoundingBox, SearchCenter, StudioFinderError};

/// Bytes inspected when deciding whether a centers file has a header.
const HEADER_SNIFF_BYTES: u64 = 1024;

/// One row of the region lookup file. Numbers stay text until the row
/// matches, so a malformed row for another region is harmless.
#[derive(Debug, Deserialize)]
struct RegionRow {
    state_code: String,
    #[serde(default)]
    state_name: Option<String>,
    lat_min: String,
    lat_max: String,
    lng_min: String,
    lng_max: String,
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> StudioFinderError + '_ {
    move |source| StudioFinderError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StudioFinderError + '_ {
    move |source| StudioFinderError::LocalIo {
        path: path.to_path_buf(),
        source,
    }
}

/// Bounds for `region_code`: the lookup file first (if given), then the
/// built-in table.
pub fn load_region_bbox(region_code: &str, lookup_file: Option<&Path>) -> Result<BoundingBox, StudioFinderError> {
    if let Some(path) = lookup_file {
        if let Some(bbox) = find_region_in_file(region_code, path)? {
            return Ok(bbox);
        }
    }
    BoundingBox::builtin(region_code).ok_or_else(|| {
        StudioFinderError::config(format!(
            "no bounding box for region '{}'; provide a region lookup file with its bounds",
            region_code.to_uppercase()
        ))
    })
}

/// The first row whose `state_code` matches (case-insensitive).
pub fn find_region_in_file(region_code: &str, path: &Path) -> Result<Option<BoundingBox>, StudioFinderError> {
    let code = region_code.trim().to_uppercase();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error(path))?;

    for row in reader.deserialize::<RegionRow>() {
        let row = row.map_err(csv_error(path))?;
        if row.state_code.to_uppercase() != code {
            continue;
        }
        let num = |field: &str, value: &str| -> Result<f64, StudioFinderError> {
            value.parse().map_err(|_| {
                StudioFinderError::config(format!(
                    "{}: {field} for '{code}' is not a number: '{value}'",
                    path.display()
                ))
            })
        };
        let name = row
            .state_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&code);
        let bbox = BoundingBox::new(
            num("lat_min", &row.lat_min)?,
            num("lat_max", &row.lat_max)?,
            num("lng_min", &row.lng_min)?,
            num("lng_max", &row.lng_max)?,
            &code,
            name,
        )?;
        return Ok(Some(bbox));
    }
    Ok(None)
}

/// Whether the first bytes look like a `lat,lng` style header.
fn has_header(path: &Path) -> Result<bool, StudioFinderError> {
    let mut head = Vec::new();
    File::open(path)
        .and_then(|f| f.take(HEADER_SNIFF_BYTES).read_to_end(&mut head))
        .map_err(io_error(path))?;
    let sample = String::from_utf8_lossy(&head).to_lowercase();
    Ok(sample.contains("lat") && (sample.contains("lng") || sample.contains("lon")))
}

/// Centers from a two-column file, header optional. Rows that do not
/// parse are skipped.
pub fn load_centers(path: &Path) -> Result<Vec<SearchCenter>, StudioFinderError> {
    let header = has_header(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(header)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error(path))?;

    let (lat_idx, lng_idx) = if header {
        let headers = reader.headers().map_err(csv_error(path))?.clone();
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
        };
        match (find(&["lat", "latitude"]), find(&["lng", "lon", "longitude"])) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => {
                warn!(path = %path.display(), "Header has no lat/lng columns, no centers loaded");
                return Ok(Vec::new());
            }
        }
    } else {
        (0, 1)
    };

    let mut centers = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let Ok(record) = record else {
            skipped += 1;
            continue;
        };
        let parsed = record
            .get(lat_idx)
            .zip(record.get(lng_idx))
            .and_then(|(lat, lng)| Some((lat.parse::<f64>().ok()?, lng.parse::<f64>().ok()?)))
            .filter(|(lat, lng)| lat.is_finite() && lng.is_finite());
        match parsed {
            Some((lat, lng)) => centers.push(SearchCenter::new(lat, lng)),
            None => skipped += 1,
        }
    }
    info!(path = %path.display(), centers = centers.len(), skipped, "Loaded centers");
    Ok(centers)
}

/// `*.csv` files directly inside `dir`, sorted by name.
pub fn list_center_files(dir: &Path) -> Result<Vec<PathBuf>, StudioFinderError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Region code implied by a centers file name: `ca.csv` → `CA`.
pub fn region_code_for(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn centers_with_header_in_any_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "nv.csv",
            "name,Longitude,Latitude\nVegas,-115.1398,36.1699\nbad,x,1\nReno,-119.8138,39.5296\n",
        );
        let centers = load_centers(&path).unwrap();
        assert_eq!(
            centers,
            vec![SearchCenter::new(36.1699, -115.1398), SearchCenter::new(39.5296, -119.8138)]
        );
    }

    #[test]
    fn centers_without_header_use_first_two_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "az.csv", "33.4484,-112.0740\n\n32.2226,-110.9747,extra\nnope\n");
        let centers = load_centers(&path).unwrap();
        assert_eq!(centers.len(), 2);
        assert_eq!(centers[1], SearchCenter::new(32.2226, -110.9747));
    }

    #[test]
    fn coordinates_are_rounded_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "ca.csv", "lat,lng\n32.123456789,-117.987654321\n");
        assert_eq!(load_centers(&path).unwrap(), vec![SearchCenter::new(32.123457, -117.987654)]);
    }

    #[test]
    fn region_lookup_matches_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "regions.csv",
            "state_code,state_name,lat_min,lat_max,lng_min,lng_max\nTX,Texas,oops,,,\nnv,Nevada,35.0,42.0,-120.0,-114.0\n",
        );
        let bbox = load_region_bbox("NV", Some(&path)).unwrap();
        assert_eq!(bbox.region_code, "NV");
        assert_eq!(bbox.region_name, "Nevada");
        assert_eq!(bbox.lng_max, -114.0);
        assert!(load_region_bbox("tx", Some(&path)).is_err());
    }

    #[test]
    fn region_lookup_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "regions.csv", "state_code,state_name,lat_min,lat_max,lng_min,lng_max\n");
        assert_eq!(load_region_bbox("ca", Some(&path)).unwrap().region_name, "California");
        assert_eq!(load_region_bbox("CA", None).unwrap().lat_max, 42.0);
        let err = load_region_bbox("ZZ", None).unwrap_err();
        assert!(matches!(err, StudioFinderError::Config(_)));
    }

    #[test]
    fn center_files_are_sorted_and_named_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tx.csv", "");
        write(dir.path(), "CA.CSV", "");
        write(dir.path(), "notes.txt", "");
        let files = list_center_files(dir.path()).unwrap();
        let codes: Vec<String> = files.iter().filter_map(|p| region_code_for(p)).collect();
        assert_eq!(codes, vec!["CA", "TX"]);
    }
}
