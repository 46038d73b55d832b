//! Deduplicating, validating store for one kind of harvested content.
//!
//! A [`ResultContainer`] holds accepted [`Item`]s in insertion order, keyed
//! by an [`IdentityKey`]. Every candidate runs through a fixed pipeline of
//! [`Rule`]s before it is stored:
//!
//! | Kind | Pipeline |
//! |------|----------|
//! | story | `TitleMatches` → `MinimumQuality` → `Unique` |
//! | scenario | `TitleMatches` → `FieldsNotBlank(title, prompt)` → `Unique` |
//!
//! Rejection is the normal outcome for items that do not belong in the
//! collection, so [`add`](ResultContainer::add) swallows it (logging at
//! `debug`), while [`add_strict`](ResultContainer::add_strict) reports the
//! first failing rule.
//!
//! # Example
//!
//! ```rust
//! use aids_harvest::container::ResultContainer;
//! use aids_harvest::models::Item;
//!
//! let mut stories = ResultContainer::stories(1);
//! let item = Item {
//!     title: Some("Castle".to_string()),
//!     actions: vec![serde_json::json!("look"), serde_json::json!("go north")],
//!     ..Default::default()
//! };
//! assert!(stories.add(item.clone()));
//! assert!(!stories.add(item));
//! assert_eq!(stories.len(), 1);
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::error::ValidationError;
use crate::models::{is_blank, normalize_title, ContentKind, IdentityKey, Item};

/// An item field a rule can require to be non-blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Prompt,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Prompt => "prompt",
        }
    }
}

/// One step of the validation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// When pinned, the title must equal the pin. Nested options pass.
    TitleMatches,
    /// The action list must be strictly longer than the threshold.
    /// Nested options pass.
    MinimumQuality,
    /// The listed fields must be non-blank, unless the item carries
    /// nested options.
    FieldsNotBlank(&'static [Field]),
    /// No accepted item may already hold the identity key.
    Unique,
}

const STORY_RULES: &[Rule] = &[Rule::TitleMatches, Rule::MinimumQuality, Rule::Unique];

const SCENARIO_RULES: &[Rule] = &[
    Rule::TitleMatches,
    Rule::FieldsNotBlank(&[Field::Title, Field::Prompt]),
    Rule::Unique,
];

/// A normalized item on its way through the pipeline.
struct Candidate<'a> {
    item: &'a Item,
    key: &'a IdentityKey,
    title_was_blank: bool,
}

/// Accepted items of one [`ContentKind`], unique by identity key.
#[derive(Debug, Clone)]
pub struct ResultContainer {
    kind: ContentKind,
    pin: Option<String>,
    min_actions: usize,
    items: Vec<Item>,
    index: HashMap<IdentityKey, usize>,
}

impl ResultContainer {
    /// An empty, unpinned container with a zero action threshold.
    pub fn new(kind: ContentKind) -> Self {
        Self {
            kind,
            pin: None,
            min_actions: 0,
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// An unpinned story container rejecting stories with
    /// `min_actions` actions or fewer.
    pub fn stories(min_actions: usize) -> Self {
        let mut container = Self::new(ContentKind::Story);
        container.min_actions = min_actions;
        container
    }

    pub fn scenarios() -> Self {
        Self::new(ContentKind::Scenario)
    }

    /// Replace the active filter. An empty `title` unpins the container.
    /// `min_actions` only affects story containers. Accepted items are kept.
    pub fn configure(&mut self, title: &str, min_actions: usize) {
        self.pin = if title.trim().is_empty() {
            None
        } else {
            Some(title.to_string())
        };
        self.min_actions = min_actions;
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// The pinned title as given, before normalization. This is what the
    /// remote search is asked for.
    pub fn pin(&self) -> Option<&str> {
        self.pin.as_deref()
    }

    pub fn min_actions(&self) -> usize {
        self.min_actions
    }

    /// The validation pipeline for this container's kind.
    pub fn rules(&self) -> &'static [Rule] {
        match self.kind {
            ContentKind::Story => STORY_RULES,
            ContentKind::Scenario => SCENARIO_RULES,
        }
    }

    /// Validate and insert `item`. Returns whether it was accepted.
    pub fn add(&mut self, item: Item) -> bool {
        let title = item.display_title().to_string();
        match self.add_strict(item) {
            Ok(()) => true,
            Err(e) => {
                debug!(kind = %self.kind, "Skipping \"{}\": {}", title, e);
                false
            }
        }
    }

    /// Validate and insert `item`, returning the first failing rule.
    pub fn add_strict(&mut self, mut item: Item) -> Result<(), ValidationError> {
        let title_was_blank = item.normalize_titles();
        let key = item.identity_key(self.kind);

        let candidate = Candidate {
            item: &item,
            key: &key,
            title_was_blank,
        };
        for rule in self.rules() {
            self.check(*rule, &candidate)?;
        }

        self.store(key, item);
        Ok(())
    }

    /// Store `item` at its identity key without validation, returning the
    /// item it displaced. Titles are still normalized.
    pub fn replace(&mut self, mut item: Item) -> Option<Item> {
        item.normalize_titles();
        let key = item.identity_key(self.kind);
        self.store(key, item)
    }

    /// Remove every item whose `id` or `publicId` equals `id`.
    /// Returns how many were removed.
    pub fn discard(&mut self, id: &str) -> usize {
        let before = self.items.len();
        self.items.retain(|item| {
            item.id.as_deref() != Some(id) && item.public_id.as_deref() != Some(id)
        });
        let removed = before - self.items.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&Item> {
        self.index.get(key).map(|&pos| &self.items[pos])
    }

    pub fn contains_key(&self, key: &IdentityKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Accepted items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    fn check(&self, rule: Rule, candidate: &Candidate<'_>) -> Result<(), ValidationError> {
        let item = candidate.item;
        match rule {
            Rule::TitleMatches => match self.pin.as_deref().map(normalize_title) {
                Some(expected) if !item.is_option && item.display_title() != expected => {
                    Err(ValidationError::TitleMismatch {
                        expected,
                        found: item.display_title().to_string(),
                    })
                }
                _ => Ok(()),
            },
            Rule::MinimumQuality => {
                let found = item.actions.len();
                if !item.is_option && found <= self.min_actions {
                    Err(ValidationError::TooFewActions {
                        threshold: self.min_actions,
                        found,
                    })
                } else {
                    Ok(())
                }
            }
            Rule::FieldsNotBlank(fields) => {
                if item.has_options() {
                    return Ok(());
                }
                for field in fields {
                    let blank = match field {
                        Field::Title => candidate.title_was_blank,
                        Field::Prompt => is_blank(item.prompt.as_deref()),
                    };
                    if blank {
                        return Err(ValidationError::Blank {
                            field: field.name(),
                        });
                    }
                }
                Ok(())
            }
            Rule::Unique => {
                if self.index.contains_key(candidate.key) {
                    Err(ValidationError::Duplicate {
                        key: candidate.key.to_string(),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    fn store(&mut self, key: IdentityKey, item: Item) -> Option<Item> {
        match self.index.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.items[pos], item)),
            None => {
                self.index.insert(key, self.items.len());
                self.items.push(item);
                None
            }
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.identity_key(self.kind), pos))
            .collect();
    }
}

impl<'a> IntoIterator for &'a ResultContainer {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
