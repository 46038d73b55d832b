//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use aids_harvest::client::parse_record;
use aids_harvest::error::HarvestError;
use aids_harvest::models::{ContentKind, Item};
use aids_harvest::progress::{HarvestProgress, HarvestProgressEvent};
use aids_harvest::queries::record_field;
use aids_harvest::source::ContentSource;
use aids_harvest::upload::ScenarioPublisher;
use async_trait::async_trait;
use serde_json::{json, Value};

/// A search listing keyed by offset plus a table of full records.
/// Every call is recorded.
#[derive(Default)]
pub struct StubSource {
    pages: HashMap<usize, Vec<Item>>,
    records: HashMap<String, Item>,
    raw_records: HashMap<String, Value>,
    fail_at_offset: Option<usize>,
    pub searches: Mutex<Vec<(String, usize)>>,
    pub fetches: Mutex<Vec<String>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search at `offset` returns summaries for `ids`.
    pub fn page(mut self, offset: usize, ids: &[&str]) -> Self {
        self.pages
            .insert(offset, ids.iter().map(|id| summary(id)).collect());
        self
    }

    /// Fetch-by-id for the record's `publicId` returns it.
    pub fn record(mut self, item: Item) -> Self {
        let id = item.public_id.clone().unwrap_or_default();
        self.records.insert(id, item);
        self
    }

    /// Fetch-by-id for `id` returns `record` as the service would send it,
    /// decoded the same way the real client decodes it.
    pub fn raw_record(mut self, id: &str, record: Value) -> Self {
        self.raw_records.insert(id.to_string(), record);
        self
    }

    /// Search at `offset` fails with a transient error.
    pub fn fail_at(mut self, offset: usize) -> Self {
        self.fail_at_offset = Some(offset);
        self
    }

    pub fn search_offsets(&self) -> Vec<usize> {
        self.searches.lock().unwrap().iter().map(|(_, o)| *o).collect()
    }

    pub fn search_terms(&self) -> Vec<String> {
        self.searches.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSource for StubSource {
    async fn search_page(
        &self,
        _kind: ContentKind,
        term: &str,
        offset: usize,
    ) -> Result<Vec<Item>, HarvestError> {
        self.searches.lock().unwrap().push((term.to_string(), offset));
        if self.fail_at_offset == Some(offset) {
            return Err(HarvestError::Transient {
                attempts: 3,
                message: "connection reset".to_string(),
            });
        }
        Ok(self.pages.get(&offset).cloned().unwrap_or_default())
    }

    async fn fetch_by_id(&self, kind: ContentKind, id: &str) -> Result<Option<Item>, HarvestError> {
        self.fetches.lock().unwrap().push(id.to_string());
        if let Some(raw) = self.raw_records.get(id) {
            let data = json!({ record_field(kind): raw });
            return Ok(parse_record(&data, kind));
        }
        Ok(self.records.get(id).cloned())
    }
}

/// A search result: just enough to fetch the full record.
pub fn summary(id: &str) -> Item {
    Item {
        public_id: Some(id.to_string()),
        ..Default::default()
    }
}

pub fn scenario(id: &str, title: &str, options: &[&str]) -> Item {
    Item {
        public_id: Some(id.to_string()),
        title: Some(title.to_string()),
        prompt: Some(format!("You are in {}.", title)),
        options: options
            .iter()
            .map(|o| Item {
                public_id: Some(o.to_string()),
                title: Some(o.to_string()),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

pub fn story(id: &str, title: &str, actions: usize) -> Item {
    Item {
        public_id: Some(id.to_string()),
        title: Some(title.to_string()),
        actions: (0..actions)
            .map(|i| json!({ "id": i, "text": format!("action {}", i) }))
            .collect(),
        ..Default::default()
    }
}

/// Records every progress event.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<HarvestProgressEvent>>,
}

impl HarvestProgress for RecordingProgress {
    fn report(&self, event: HarvestProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Hands out sequential public ids and records every update.
#[derive(Default)]
pub struct StubPublisher {
    /// Titles whose update is refused with an HTTP 400.
    pub reject_titles: Vec<String>,
    /// Fail every create with a transient error.
    pub unreachable: bool,
    pub created: Mutex<usize>,
    pub updates: Mutex<Vec<(String, Item)>>,
}

#[async_trait]
impl ScenarioPublisher for StubPublisher {
    async fn create_scenario(&self) -> Result<String, HarvestError> {
        if self.unreachable {
            return Err(HarvestError::Transient {
                attempts: 6,
                message: "connection refused".to_string(),
            });
        }
        let mut created = self.created.lock().unwrap();
        *created += 1;
        Ok(format!("new-{}", *created))
    }

    async fn update_scenario(&self, public_id: &str, scenario: &Item) -> Result<(), HarvestError> {
        if self
            .reject_titles
            .iter()
            .any(|t| Some(t.as_str()) == scenario.title.as_deref())
        {
            return Err(HarvestError::Http {
                status: 400,
                body: "bad input".to_string(),
            });
        }
        self.updates
            .lock()
            .unwrap()
            .push((public_id.to_string(), scenario.clone()));
        Ok(())
    }
}
