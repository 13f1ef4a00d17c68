// Trait abstractions for the sweep's outside collaborators.
//
// PlacesApi: nearby search + place details, one Reply per logical call.
// TabularStore: the destination table (tab, header, key column, appends).
// EmailFinder: best-effort contact-address lookup for a website.
//
// The orchestrator only sees these traits, so tests drive it with the
// mocks in `testing` and never touch the network.

use async_trait::async_trait;
use serde_json::Value;

use places_client::{NearbyQuery, PlaceDetails, PlacesClient, PlacesTransport, Reply, SearchPage};
use sheets_client::{a1_range, SheetsClient};

/// One destination row, cells in header order.
pub type Row = Vec<Value>;

// ---------------------------------------------------------------------------
// PlacesApi
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PlacesApi: Send + Sync {
    /// One page of results around a center (or the continuation page the
    /// query's token points at).
    async fn nearby_search(&self, query: &NearbyQuery<'_>) -> places_client::Result<Reply<SearchPage>>;

    /// Contact and address details for one place id.
    async fn place_details(&self, place_id: &str) -> places_client::Result<Reply<PlaceDetails>>;
}

#[async_trait]
impl<T: PlacesTransport> PlacesApi for PlacesClient<T> {
    async fn nearby_search(&self, query: &NearbyQuery<'_>) -> places_client::Result<Reply<SearchPage>> {
        PlacesClient::nearby_search(self, query).await
    }

    async fn place_details(&self, place_id: &str) -> places_client::Result<Reply<PlaceDetails>> {
        PlacesClient::place_details(self, place_id).await
    }
}

// ---------------------------------------------------------------------------
// TabularStore
// ---------------------------------------------------------------------------

/// A spreadsheet-like destination addressed by tab title and A1 cells.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Create the tab if it does not exist yet.
    async fn ensure_tab(&self, tab: &str) -> sheets_client::Result<()>;

    /// Text of every cell in `cells` (e.g. `K2:K`), row by row.
    async fn get_range(&self, tab: &str, cells: &str) -> sheets_client::Result<Vec<Vec<String>>>;

    async fn update_range(&self, tab: &str, cells: &str, rows: &[Row]) -> sheets_client::Result<()>;

    /// Append rows after the last populated row of the tab.
    async fn append_rows(&self, tab: &str, rows: &[Row]) -> sheets_client::Result<()>;
}

#[async_trait]
impl TabularStore for SheetsClient {
    async fn ensure_tab(&self, tab: &str) -> sheets_client::Result<()> {
        SheetsClient::ensure_tab(self, tab).await.map(|_| ())
    }

    async fn get_range(&self, tab: &str, cells: &str) -> sheets_client::Result<Vec<Vec<String>>> {
        self.get_values(&a1_range(tab, cells)).await
    }

    async fn update_range(&self, tab: &str, cells: &str, rows: &[Row]) -> sheets_client::Result<()> {
        self.update_values(&a1_range(tab, cells), rows).await
    }

    async fn append_rows(&self, tab: &str, rows: &[Row]) -> sheets_client::Result<()> {
        self.append_values(&a1_range(tab, "A1"), rows).await
    }
}

// ---------------------------------------------------------------------------
// EmailFinder
// ---------------------------------------------------------------------------

#[async_trait]
pub trait EmailFinder: Send + Sync {
    /// Sorted, de-duplicated addresses found for `website`. Never fails:
    /// an unreachable site yields an empty list.
    async fn find_emails(&self, website: &str) -> Vec<String>;
}
