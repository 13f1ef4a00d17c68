use serde::Deserialize;

// --- Status ---

/// The `status` field every Places JSON response carries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ApiStatus {
    Ok,
    ZeroResults,
    NotFound,
    OverQueryLimit,
    ResourceExhausted,
    UnknownError,
    RequestDenied,
    InvalidRequest,
    Other(String),
}

impl From<String> for ApiStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "OK" => ApiStatus::Ok,
            "ZERO_RESULTS" => ApiStatus::ZeroResults,
            "NOT_FOUND" => ApiStatus::NotFound,
            "OVER_QUERY_LIMIT" => ApiStatus::OverQueryLimit,
            "RESOURCE_EXHAUSTED" => ApiStatus::ResourceExhausted,
            "UNKNOWN_ERROR" => ApiStatus::UnknownError,
            "REQUEST_DENIED" => ApiStatus::RequestDenied,
            "INVALID_REQUEST" => ApiStatus::InvalidRequest,
            _ => ApiStatus::Other(s),
        }
    }
}

impl ApiStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ApiStatus::Ok => "OK",
            ApiStatus::ZeroResults => "ZERO_RESULTS",
            ApiStatus::NotFound => "NOT_FOUND",
            ApiStatus::OverQueryLimit => "OVER_QUERY_LIMIT",
            ApiStatus::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ApiStatus::UnknownError => "UNKNOWN_ERROR",
            ApiStatus::RequestDenied => "REQUEST_DENIED",
            ApiStatus::InvalidRequest => "INVALID_REQUEST",
            ApiStatus::Other(s) => s,
        }
    }

    /// Quota and flaky-backend statuses worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiStatus::OverQueryLimit | ApiStatus::ResourceExhausted | ApiStatus::UnknownError
        )
    }

    /// The credential or billing is unusable; continuing only burns calls.
    pub fn is_hard_stop(&self) -> bool {
        matches!(self, ApiStatus::RequestDenied)
    }
}

impl std::fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Outcomes ---

/// Classification of a single HTTP round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    Success(T),
    ZeroResults,
    Transient(ApiStatus),
    Fatal {
        status: ApiStatus,
        message: Option<String>,
    },
}

/// Result of a call after the retry loop. Callers must handle every case.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    ZeroResults,
    Fatal {
        status: ApiStatus,
        message: Option<String>,
    },
    /// Every attempt hit a transient status.
    ExhaustedRetries,
}

impl<T> Outcome<T> {
    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(v) => Some(v),
            _ => None,
        }
    }
}

/// An outcome plus the number of HTTP calls it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub outcome: Outcome<T>,
    pub attempts: u32,
}

// --- Domain types ---

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// A nearby-search result. Transient: lives for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub external_id: Option<String>,
    pub name: String,
    pub location: Option<Location>,
    pub vicinity: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    pub hits: Vec<RawHit>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddressComponent {
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Place-details fields merged into a hit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaceDetails {
    pub name: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub canonical_url: Option<String>,
    pub location: Option<Location>,
    pub address_components: Vec<AddressComponent>,
}

/// Nearby-search request. With a page token, only the token is sent.
#[derive(Debug, Clone, Copy)]
pub struct NearbyQuery<'a> {
    pub lat: f64,
    pub lng: f64,
    pub keyword: &'a str,
    pub radius_m: u32,
    pub page_token: Option<&'a str>,
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
pub(crate) struct NearbyResponse {
    pub status: ApiStatus,
    #[serde(default)]
    pub results: Vec<WireHit>,
    pub next_page_token: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireHit {
    pub place_id: Option<String>,
    pub name: Option<String>,
    pub geometry: Option<Geometry>,
    pub vicinity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Geometry {
    pub location: Option<Location>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DetailsResponse {
    pub status: ApiStatus,
    pub result: Option<WireDetails>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDetails {
    pub name: Option<String>,
    pub formatted_address: Option<String>,
    pub website: Option<String>,
    pub url: Option<String>,
    pub geometry: Option<Geometry>,
    pub formatted_phone_number: Option<String>,
    pub international_phone_number: Option<String>,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl From<WireHit> for RawHit {
    fn from(w: WireHit) -> Self {
        RawHit {
            external_id: non_empty(w.place_id),
            name: w.name.unwrap_or_default().trim().to_string(),
            location: w.geometry.and_then(|g| g.location),
            vicinity: w.vicinity.unwrap_or_default(),
        }
    }
}

impl From<WireDetails> for PlaceDetails {
    fn from(w: WireDetails) -> Self {
        PlaceDetails {
            name: non_empty(w.name),
            address: non_empty(w.formatted_address),
            website: non_empty(w.website),
            phone: non_empty(w.formatted_phone_number)
                .or_else(|| non_empty(w.international_phone_number)),
            canonical_url: non_empty(w.url),
            location: w.geometry.and_then(|g| g.location),
            address_components: w.address_components,
        }
    }
}

impl NearbyResponse {
    pub(crate) fn into_attempt(self) -> Attempt<SearchPage> {
        match self.status {
            ApiStatus::Ok => Attempt::Success(SearchPage {
                hits: self.results.into_iter().map(RawHit::from).collect(),
                next_page_token: non_empty(self.next_page_token),
            }),
            ApiStatus::ZeroResults => Attempt::ZeroResults,
            status if status.is_transient() => Attempt::Transient(status),
            status => Attempt::Fatal {
                status,
                message: self.error_message,
            },
        }
    }
}

impl DetailsResponse {
    pub(crate) fn into_attempt(self) -> Attempt<PlaceDetails> {
        match self.status {
            ApiStatus::Ok => match self.result {
                Some(result) => Attempt::Success(result.into()),
                None => Attempt::ZeroResults,
            },
            ApiStatus::ZeroResults | ApiStatus::NotFound => Attempt::ZeroResults,
            status if status.is_transient() => Attempt::Transient(status),
            status => Attempt::Fatal {
                status,
                message: self.error_message,
            },
        }
    }
}
