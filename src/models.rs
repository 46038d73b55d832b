//! Core data models used throughout the harvester.
//!
//! An [`Item`] is one story or scenario record returned by the remote
//! service. Only the handful of fields the harvester inspects are typed;
//! everything else rides along in [`Item::extra`] so that records survive
//! a dump/load cycle unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Title stored for items that arrive without one.
pub const UNTITLED: &str = "Untitled";

/// The two kinds of content a container can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// An adventure with an action history. Identity is title + action count.
    Story,
    /// A prompt template, possibly with nested option scenarios. Identity is title.
    Scenario,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Story => "story",
            ContentKind::Scenario => "scenario",
        }
    }

    /// Plural label used in file names and log lines.
    pub fn plural(&self) -> &'static str {
        match self {
            ContentKind::Story => "stories",
            ContentKind::Scenario => "scenarios",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplication key of an accepted item within one container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// Scenarios: the normalized title.
    Title(String),
    /// Stories: normalized title plus the length of the action list.
    TitleAndLength(String, usize),
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityKey::Title(title) => write!(f, "\"{}\"", title),
            IdentityKey::TitleAndLength(title, len) => {
                write!(f, "\"{}\" ({} actions)", title, len)
            }
        }
    }
}

/// One harvested story or scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Action history (stories only). Entries are passed through untouched.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub actions: Vec<Value>,
    /// Nested option scenarios. On a search result these are stubs
    /// carrying only `publicId`, `title`, and `createdAt`.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub options: Vec<Item>,
    #[serde(default)]
    pub is_option: bool,
    /// Every field the harvester does not inspect.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// The id used to fetch this item individually: `publicId`, else `id`.
    pub fn lookup_id(&self) -> Option<&str> {
        non_empty(&self.public_id).or_else(|| non_empty(&self.id))
    }

    /// Title as stored, or [`UNTITLED`] when absent.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED)
    }

    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }

    /// Make the title (and nested option titles) safe as a path segment.
    ///
    /// Returns `true` if the item's own title was blank before
    /// normalization, in which case it is now [`UNTITLED`].
    pub fn normalize_titles(&mut self) -> bool {
        let was_blank = is_blank(self.title.as_deref());
        self.title = Some(match self.title.take() {
            Some(title) if !was_blank => normalize_title(&title),
            _ => UNTITLED.to_string(),
        });
        for option in &mut self.options {
            option.normalize_titles();
        }
        was_blank
    }

    /// Identity key for `kind`. Call after [`normalize_titles`](Self::normalize_titles).
    pub fn identity_key(&self, kind: ContentKind) -> IdentityKey {
        let title = self.display_title().to_string();
        match kind {
            ContentKind::Scenario => IdentityKey::Title(title),
            ContentKind::Story => IdentityKey::TitleAndLength(title, self.actions.len()),
        }
    }
}

/// Replace path separators (`/` and `\`) with `-`.
pub fn normalize_title(title: &str) -> String {
    title.replace(['/', '\\'], "-")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
