pub mod error;
pub mod retry;
pub mod types;

pub use error::{PlacesError, Result};
pub use retry::{retry_transient, RetryPolicy};
pub use types::{
    AddressComponent, ApiStatus, Attempt, Location, NearbyQuery, Outcome, PlaceDetails, RawHit,
    Reply, SearchPage,
};

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use types::{DetailsResponse, NearbyResponse};

const NEARBY_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
const DETAILS_URL: &str = "https://maps.googleapis.com/maps/api/place/details/json";

/// Place Details fields requested for every lookup.
const DETAIL_FIELDS: &str = "name,formatted_address,website,url,geometry,formatted_phone_number,international_phone_number,address_components";

/// Map link used when details carry no `url`.
pub fn fallback_map_url(place_id: &str) -> String {
    format!("https://www.google.com/maps/place/?q=place_id:{place_id}")
}

// --- Transport ---

/// One HTTP GET returning a JSON body. Split out so the status/retry layer
/// can be driven without a network.
#[async_trait]
pub trait PlacesTransport: Send + Sync {
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<serde_json::Value>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PlacesTransport for HttpTransport {
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<serde_json::Value> {
        let resp = self.client.get(url).query(params).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlacesError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(resp.json().await?)
    }
}

// --- Client ---

pub struct PlacesClient<T: PlacesTransport = HttpTransport> {
    transport: T,
    api_key: String,
    language: String,
    region: String,
    retry: RetryPolicy,
}

impl PlacesClient<HttpTransport> {
    pub fn new(api_key: &str) -> Result<Self> {
        Ok(Self::with_transport(api_key, HttpTransport::new()?))
    }
}

impl<T: PlacesTransport> PlacesClient<T> {
    pub fn with_transport(api_key: &str, transport: T) -> Self {
        Self {
            transport,
            api_key: api_key.to_string(),
            language: "en".to_string(),
            region: "us".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Result language and region bias sent with every nearby search.
    pub fn with_locale(mut self, language: &str, region: &str) -> Self {
        self.language = language.to_string();
        self.region = region.to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One page of a nearby search. Transient statuses are retried per the
    /// policy; every other status comes back as an [`Outcome`].
    pub async fn nearby_search(&self, query: &NearbyQuery<'_>) -> Result<Reply<SearchPage>> {
        let mut params = vec![
            ("key", self.api_key.clone()),
            ("language", self.language.clone()),
            ("region", self.region.clone()),
        ];
        match query.page_token {
            Some(token) => params.push(("pagetoken", token.to_string())),
            None => {
                params.push(("location", format!("{},{}", query.lat, query.lng)));
                params.push(("radius", query.radius_m.to_string()));
                params.push(("keyword", query.keyword.to_string()));
            }
        }

        let params = &params;
        retry_transient(&self.retry, "nearby_search", || async move {
            let body = self.transport.get_json(NEARBY_URL, params).await?;
            let resp: NearbyResponse = serde_json::from_value(body)?;
            debug!(status = %resp.status, results = resp.results.len(), "Nearby search response");
            Ok(resp.into_attempt())
        })
        .await
    }

    /// Place details for one id. `NOT_FOUND` is reported as zero results.
    pub async fn place_details(&self, place_id: &str) -> Result<Reply<PlaceDetails>> {
        let params = vec![
            ("place_id", place_id.to_string()),
            ("fields", DETAIL_FIELDS.to_string()),
            ("key", self.api_key.clone()),
        ];

        let params = &params;
        retry_transient(&self.retry, "place_details", || async move {
            let body = self.transport.get_json(DETAILS_URL, params).await?;
            let resp: DetailsResponse = serde_json::from_value(body)?;
            debug!(status = %resp.status, place_id, "Place details response");
            Ok(resp.into_attempt())
        })
        .await
    }
}
