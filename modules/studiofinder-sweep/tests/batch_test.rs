//! Batch runs over a directory of per-region centers files.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use studiofinder_common::{RunResult, SearchCenter, SweepConfig};
use studiofinder_sweep::notify::Notifier;
use studiofinder_sweep::testing::{denied, hit, ok, page, MockPlaces, MockStore};
use studiofinder_sweep::{BatchOutcome, BatchRunner, HardStop};

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn success(&self, result: &RunResult) {
        self.push(format!("success {} {}", result.region_code, result.added_count));
    }

    async fn halted(&self, result: &RunResult, stop: &HardStop, _source_file: &str) {
        self.push(format!("halted {} {} {}", stop.region_code, stop.status, result.added_count));
    }

    async fn failure(&self, region_code: &str, _source_file: &str, _error: &anyhow::Error) {
        self.push(format!("failure {region_code}"));
    }

    async fn summary(&self, completed: &[RunResult]) {
        self.push(format!("summary {}", completed.len()));
    }
}

fn write(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).unwrap();
}

fn config() -> SweepConfig {
    SweepConfig {
        keywords: vec!["recording studio".into()],
        ..SweepConfig::default()
    }
}

const CA: (f64, f64) = (32.7, -117.1);
const NV: (f64, f64) = (36.1, -115.1);

#[tokio::test(start_paused = true)]
async fn every_region_runs_in_file_order() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "nv.csv", "lat,lng\n36.1,-115.1\n");
    write(dir.path(), "ca.csv", "lat,lng\n32.7,-117.1\n");
    write(dir.path(), "notes.txt", "not a centers file");

    let config = config();
    let places = MockPlaces::new()
        .on_search_at(
            SearchCenter::new(CA.0, CA.1),
            "recording studio",
            ok(page(vec![hit("ca1", "Harbor Recording Studio")], None)),
        )
        .on_search_at(
            SearchCenter::new(NV.0, NV.1),
            "recording studio",
            ok(page(vec![hit("nv1", "Desert Mix House"), hit("nv2", "Strip Audio")], None)),
        );
    let store = MockStore::new();
    let notifier = RecordingNotifier::default();

    let outcome = BatchRunner::new(&config, &places, &store, &notifier)
        .run(dir.path())
        .await
        .unwrap();

    assert!(outcome.is_success());
    let regions: Vec<(&str, usize)> = outcome
        .completed()
        .iter()
        .map(|r| (r.region_code.as_str(), r.added_count))
        .collect();
    assert_eq!(regions, vec![("CA", 1), ("NV", 2)]);
    assert_eq!(store.ids("CA"), vec!["ca1"]);
    assert_eq!(store.ids("NV"), vec!["nv1", "nv2"]);
    assert_eq!(
        notifier.events(),
        vec!["success CA 1", "success NV 2", "summary 2"]
    );
}

#[tokio::test(start_paused = true)]
async fn hard_stop_ends_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "ca.csv", "lat,lng\n32.7,-117.1\n");
    write(dir.path(), "nv.csv", "lat,lng\n36.1,-115.1\n");

    let config = config();
    let places = MockPlaces::new().on_search_at(SearchCenter::new(CA.0, CA.1), "recording studio", denied());
    let store = MockStore::new();
    let notifier = RecordingNotifier::default();

    let outcome = BatchRunner::new(&config, &places, &store, &notifier)
        .run(dir.path())
        .await
        .unwrap();

    let BatchOutcome::Halted {
        completed,
        stop,
        source_file,
    } = outcome
    else {
        panic!("expected the batch to halt");
    };
    assert!(completed.is_empty());
    assert_eq!(stop.region_code, "CA");
    assert!(source_file.ends_with("ca.csv"));
    assert_eq!(places.searched_centers(), vec![SearchCenter::new(CA.0, CA.1)]);
    assert_eq!(notifier.events(), vec!["halted CA REQUEST_DENIED 0"]);
}

#[tokio::test(start_paused = true)]
async fn unusable_centers_file_fails_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "az.csv", "lat,lng\nnorth,west\n");
    write(dir.path(), "ca.csv", "lat,lng\n32.7,-117.1\n");

    let config = config();
    let places = MockPlaces::new();
    let store = MockStore::new();
    let notifier = RecordingNotifier::default();

    let outcome = BatchRunner::new(&config, &places, &store, &notifier)
        .run(dir.path())
        .await
        .unwrap();

    let BatchOutcome::Failed { region_code, error, .. } = &outcome else {
        panic!("expected the batch to fail");
    };
    assert_eq!(region_code, "AZ");
    assert!(format!("{error:#}").contains("no usable centers"));
    assert_eq!(places.search_calls(), 0);
    assert!(!outcome.is_success());
    assert_eq!(notifier.events(), vec!["failure AZ"]);
}

#[tokio::test(start_paused = true)]
async fn directory_without_centers_files_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "README.md", "nothing here");

    let config = config();
    let places = MockPlaces::new();
    let store = MockStore::new();
    let notifier = RecordingNotifier::default();

    let err = BatchRunner::new(&config, &places, &store, &notifier)
        .run(dir.path())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no centers files"));
    assert!(notifier.events().is_empty());
}
