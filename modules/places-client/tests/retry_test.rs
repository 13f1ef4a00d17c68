//! Status-level retry behaviour, driven through a scripted transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use places_client::{
    ApiStatus, NearbyQuery, Outcome, PlacesClient, PlacesError, PlacesTransport, Result,
};
use serde_json::{json, Value};

/// Replays canned bodies in order and records every request.
struct ScriptedTransport {
    bodies: Mutex<VecDeque<Result<Value>>>,
    calls: AtomicU32,
    params_seen: Mutex<Vec<Vec<(String, String)>>>,
}

impl ScriptedTransport {
    fn new(bodies: Vec<Result<Value>>) -> Self {
        Self {
            bodies: Mutex::new(bodies.into()),
            calls: AtomicU32::new(0),
            params_seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlacesTransport for &ScriptedTransport {
    async fn get_json(&self, _url: &str, params: &[(&str, String)]) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.params_seen.lock().unwrap().push(
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        );
        self.bodies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "status": "ZERO_RESULTS" })))
    }
}

fn query(page_token: Option<&str>) -> NearbyQuery<'_> {
    NearbyQuery {
        lat: 32.5,
        lng: -117.0,
        keyword: "recording studio",
        radius_m: 25_000,
        page_token,
    }
}

fn ok_page() -> Value {
    json!({
        "status": "OK",
        "results": [{ "place_id": "pid-1", "name": "Harbor Recording", "vicinity": "San Diego" }]
    })
}

#[tokio::test(start_paused = true)]
async fn three_transient_failures_then_success_takes_four_calls() {
    let transport = ScriptedTransport::new(vec![
        Ok(json!({ "status": "OVER_QUERY_LIMIT" })),
        Ok(json!({ "status": "RESOURCE_EXHAUSTED" })),
        Ok(json!({ "status": "UNKNOWN_ERROR" })),
        Ok(ok_page()),
    ]);
    let client = PlacesClient::with_transport("key", &transport);

    let reply = client.nearby_search(&query(None)).await.unwrap();

    assert_eq!(transport.calls(), 4);
    assert_eq!(reply.attempts, 4);
    let page = reply.outcome.success().expect("success after retries");
    assert_eq!(page.hits[0].external_id.as_deref(), Some("pid-1"));
}

#[tokio::test(start_paused = true)]
async fn six_transient_failures_degrade_to_exhausted() {
    let transport =
        ScriptedTransport::new((0..10).map(|_| Ok(json!({ "status": "OVER_QUERY_LIMIT" }))).collect());
    let client = PlacesClient::with_transport("key", &transport);

    let reply = client.place_details("pid-1").await.unwrap();

    assert_eq!(reply.outcome, Outcome::ExhaustedRetries);
    assert_eq!(reply.attempts, 6);
    assert_eq!(transport.calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn denied_status_is_returned_without_retry() {
    let transport = ScriptedTransport::new(vec![Ok(json!({
        "status": "REQUEST_DENIED",
        "error_message": "The provided API key is invalid."
    }))]);
    let client = PlacesClient::with_transport("key", &transport);

    let reply = client.nearby_search(&query(None)).await.unwrap();

    assert_eq!(transport.calls(), 1);
    match reply.outcome {
        Outcome::Fatal { status, message } => {
            assert_eq!(status, ApiStatus::RequestDenied);
            assert!(status.is_hard_stop());
            assert_eq!(message.as_deref(), Some("The provided API key is invalid."));
        }
        other => panic!("expected fatal outcome, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn transport_errors_are_not_retried() {
    let transport = ScriptedTransport::new(vec![Err(PlacesError::Http {
        status: 502,
        message: "bad gateway".into(),
    })]);
    let client = PlacesClient::with_transport("key", &transport);

    let err = client.nearby_search(&query(None)).await.unwrap_err();

    assert!(matches!(err, PlacesError::Http { status: 502, .. }));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn page_token_replaces_location_keyword_and_radius() {
    let transport = ScriptedTransport::new(vec![Ok(ok_page()), Ok(ok_page())]);
    let client = PlacesClient::with_transport("key", &transport).with_locale("es", "mx");

    client.nearby_search(&query(None)).await.unwrap();
    client.nearby_search(&query(Some("tok-2"))).await.unwrap();

    let seen = transport.params_seen.lock().unwrap();
    let keys = |i: usize| -> Vec<&str> { seen[i].iter().map(|(k, _)| k.as_str()).collect() };
    assert_eq!(keys(0), vec!["key", "language", "region", "location", "radius", "keyword"]);
    assert_eq!(keys(1), vec!["key", "language", "region", "pagetoken"]);
    assert!(seen[0].contains(&("location".to_string(), "32.5,-117".to_string())));
    assert!(seen[1].contains(&("language".to_string(), "es".to_string())));
}
