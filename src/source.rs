//! The remote content source the harvester walks.
//!
//! [`ContentSource`] is the seam between traversal logic and transport.
//! The production implementation is
//! [`GraphQlClient`](crate::client::GraphQlClient); tests plug in
//! in-memory sources that record every call.

use async_trait::async_trait;

use crate::error::HarvestError;
use crate::models::{ContentKind, Item};

/// Paginated search plus fetch-by-id over stories and scenarios.
///
/// # Contract
///
/// - [`search_page`](ContentSource::search_page) returns the summaries at
///   `offset` in the service's own ordering. An empty page means the
///   listing is exhausted.
/// - [`fetch_by_id`](ContentSource::fetch_by_id) returns the full record,
///   or `None` if the service has nothing usable under that id. Scenario records
///   fetched this way may carry stub `options` to be fetched in turn.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn search_page(
        &self,
        kind: ContentKind,
        term: &str,
        offset: usize,
    ) -> Result<Vec<Item>, HarvestError>;

    async fn fetch_by_id(&self, kind: ContentKind, id: &str) -> Result<Option<Item>, HarvestError>;
}
