//! Conversion between harvested scenarios and NovelAI `.scenario` files.
//!
//! A harvested scenario keeps its memory, author's note and world info as
//! plain fields (`memory`, `authorsNote`, `worldInfo`). A NovelAI scenario
//! carries the same text as two context entries and a lorebook:
//!
//! | Harvested | NovelAI |
//! |-----------|---------|
//! | `memory` | `context[]` entry at insertion position 0 |
//! | `authorsNote` | `context[]` entry at insertion position -4 |
//! | `worldInfo[].keys` / `.entry` | `lorebook.entries[].keys` / `.text` |
//!
//! Harvested world-info keys are one comma-separated string; lorebook keys
//! are a list. Everything NovelAI needs beyond that (sampler settings,
//! context defaults) comes from a fixed template.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::container::ResultContainer;
use crate::error::PersistenceError;
use crate::models::Item;
use crate::storage::write_atomic;

pub const SCENARIO_EXTENSION: &str = "scenario";

const MEMORY_POSITION: i32 = 0;
const AUTHORS_NOTE_POSITION: i32 = -4;
const LORE_POSITION: i32 = -1;

/// A NovelAI scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NaiScenario {
    #[serde(default = "default_scenario_version")]
    pub scenario_version: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub prompt: String,
    /// Memory and author's note, told apart by insertion position.
    #[serde(default)]
    pub context: Vec<ContextEntry>,
    #[serde(default)]
    pub lorebook: Lorebook,
    #[serde(default)]
    pub author: String,
    /// Settings, placeholders and context defaults, passed through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_scenario_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextEntry {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub context_config: ContextConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextConfig {
    pub prefix: String,
    pub suffix: String,
    pub token_budget: u32,
    pub reserved_tokens: u32,
    pub budget_priority: i32,
    pub trim_direction: String,
    pub insertion_type: String,
    pub maximum_trim_type: String,
    pub insertion_position: i32,
}

impl ContextConfig {
    fn newline(reserved_tokens: u32, budget_priority: i32, insertion_position: i32) -> Self {
        Self {
            prefix: String::new(),
            suffix: "\n".to_string(),
            token_budget: 2048,
            reserved_tokens,
            budget_priority,
            trim_direction: "trimBottom".to_string(),
            insertion_type: "newline".to_string(),
            maximum_trim_type: "sentence".to_string(),
            insertion_position,
        }
    }

    pub fn memory() -> Self {
        Self::newline(0, 800, MEMORY_POSITION)
    }

    pub fn authors_note() -> Self {
        Self::newline(2048, -400, AUTHORS_NOTE_POSITION)
    }

    pub fn lore() -> Self {
        Self::newline(0, 400, LORE_POSITION)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Lorebook {
    pub lorebook_version: u32,
    pub entries: Vec<LoreEntry>,
    pub settings: Value,
}

impl Default for Lorebook {
    fn default() -> Self {
        Self {
            lorebook_version: 2,
            entries: Vec::new(),
            settings: json!({ "orderByKeyLocations": false }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoreEntry {
    pub text: String,
    pub context_config: ContextConfig,
    pub last_updated_at: i64,
    pub display_name: String,
    pub keys: Vec<String>,
    pub search_range: u32,
    pub enabled: bool,
    pub force_activation: bool,
    pub key_relative: bool,
    pub non_story_activatable: bool,
}

impl Default for LoreEntry {
    fn default() -> Self {
        Self {
            text: String::new(),
            context_config: ContextConfig::lore(),
            last_updated_at: 0,
            display_name: String::new(),
            keys: Vec::new(),
            search_range: 1000,
            enabled: true,
            force_activation: false,
            key_relative: false,
            non_story_activatable: false,
        }
    }
}

/// Template fields every written scenario carries.
fn template_extra() -> Map<String, Value> {
    let defaults = json!({
        "ephemeralContext": [],
        "placeholders": [],
        "settings": {
            "parameters": {
                "temperature": 0.72,
                "max_length": 40,
                "min_length": 1,
                "top_k": 0,
                "top_p": 0.725,
                "tail_free_sampling": 1,
                "repetition_penalty": 3,
                "repetition_penalty_range": 1024,
                "repetition_penalty_slope": 6.57,
                "bad_words_ids": []
            },
            "preset": "default-optimalwhitepaper",
            "trimResponses": true,
            "banBrackets": true,
            "prefix": ""
        },
        "storyContextConfig": {
            "prefix": "",
            "suffix": "",
            "tokenBudget": 2048,
            "reservedTokens": 512,
            "budgetPriority": 0,
            "trimDirection": "trimTop",
            "insertionType": "newline",
            "maximumTrimType": "sentence",
            "insertionPosition": -1
        },
        "contextDefaults": {
            "ephemeralDefaults": [{
                "text": "",
                "contextConfig": {
                    "prefix": "",
                    "suffix": "\n",
                    "tokenBudget": 2048,
                    "reservedTokens": 2048,
                    "budgetPriority": -10000,
                    "trimDirection": "doNotTrim",
                    "insertionType": "newline",
                    "maximumTrimType": "newline",
                    "insertionPosition": -2
                },
                "startingStep": 1,
                "delay": 0,
                "duration": 1,
                "repeat": false,
                "reverse": false
            }],
            "loreDefaults": [serde_json::to_value(LoreEntry {
                display_name: "New Lorebook Entry".to_string(),
                ..Default::default()
            })
            .unwrap_or(Value::Null)]
        }
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn extra_str<'a>(item: &'a Item, key: &str) -> Option<&'a str> {
    item.extra.get(key).and_then(Value::as_str)
}

/// World-info keys: a comma-separated string, or a list of strings.
fn split_keys(keys: &Value) -> Vec<String> {
    match keys {
        Value::String(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(list) => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn lore_entry(world_info: &Value) -> Option<LoreEntry> {
    let text = world_info.get("entry").and_then(Value::as_str).unwrap_or_default();
    let keys = world_info.get("keys").map(split_keys).unwrap_or_default();
    if text.is_empty() && keys.is_empty() {
        return None;
    }
    Some(LoreEntry {
        text: text.to_string(),
        display_name: keys.join(", "),
        keys,
        ..Default::default()
    })
}

/// Build a NovelAI scenario from a harvested one.
pub fn to_nai(item: &Item) -> NaiScenario {
    let entries = item
        .extra
        .get("worldInfo")
        .and_then(Value::as_array)
        .map(|wi| wi.iter().filter_map(lore_entry).collect())
        .unwrap_or_default();
    let tags = item
        .extra
        .get("tags")
        .map(split_keys)
        .unwrap_or_default();

    NaiScenario {
        scenario_version: default_scenario_version(),
        title: item.title.clone(),
        description: extra_str(item, "description").map(str::to_string),
        tags,
        prompt: item.prompt.clone().unwrap_or_default(),
        context: vec![
            ContextEntry {
                text: extra_str(item, "memory").unwrap_or_default().to_string(),
                context_config: ContextConfig::memory(),
            },
            ContextEntry {
                text: extra_str(item, "authorsNote").unwrap_or_default().to_string(),
                context_config: ContextConfig::authors_note(),
            },
        ],
        lorebook: Lorebook {
            entries,
            ..Default::default()
        },
        author: String::new(),
        extra: template_extra(),
    }
}

/// Memory and author's note from a context list.
///
/// Position 0 or anything before -4 is memory; -4 is the author's note.
/// When no entry sits at a known position the first two entries are taken
/// as memory and author's note, in that order.
fn split_context(context: &[ContextEntry]) -> (Option<String>, Option<String>) {
    let mut memory = None;
    let mut note = None;
    for entry in context {
        let position = entry.context_config.insertion_position;
        if position == MEMORY_POSITION || position < AUTHORS_NOTE_POSITION {
            memory = Some(entry.text.clone());
        } else if position == AUTHORS_NOTE_POSITION {
            note = Some(entry.text.clone());
        }
    }
    if memory.is_none() && note.is_none() {
        memory = context.first().map(|e| e.text.clone());
        note = context.get(1).map(|e| e.text.clone());
    }
    (memory, note)
}

/// Build a harvested scenario from a NovelAI one.
pub fn from_nai(nai: &NaiScenario) -> Item {
    let (memory, note) = split_context(&nai.context);
    let world_info: Vec<Value> = nai
        .lorebook
        .entries
        .iter()
        .map(|entry| json!({ "keys": entry.keys.join(", "), "entry": entry.text }))
        .collect();

    let mut extra = Map::new();
    extra.insert("description".to_string(), json!(nai.description));
    extra.insert("tags".to_string(), json!(nai.tags));
    extra.insert("memory".to_string(), json!(memory.unwrap_or_default()));
    extra.insert("authorsNote".to_string(), json!(note.unwrap_or_default()));
    extra.insert("worldInfo".to_string(), Value::Array(world_info));

    Item {
        title: nai.title.clone(),
        prompt: Some(nai.prompt.clone()),
        extra,
        ..Default::default()
    }
}

/// `.scenario` files under `dir` whose path relative to `dir` matches one
/// of `patterns`. `*` does not cross directories; use `**` for that.
pub fn find_scenario_files(dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Scenario directory does not exist: {}", dir.display());
    }
    let include = build_globset(patterns)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        if include.is_match(relative) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

pub fn read_nai_file(path: &Path) -> Result<NaiScenario, PersistenceError> {
    let raw = fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;
    serde_json::from_str(&raw).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Counters from [`import_nai_files`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub files: usize,
    pub accepted: usize,
    /// Converted but refused by the container (blank or duplicate).
    pub rejected: usize,
    /// Unreadable or not a scenario.
    pub unreadable: usize,
}

/// Convert every file in `files` into `container`. A bad file is logged
/// and counted; it never stops the rest.
pub fn import_nai_files(files: &[PathBuf], container: &mut ResultContainer) -> ImportReport {
    let mut report = ImportReport::default();
    for path in files {
        report.files += 1;
        let nai = match read_nai_file(path) {
            Ok(nai) => nai,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                report.unreadable += 1;
                continue;
            }
        };
        if container.add(from_nai(&nai)) {
            debug!("Converted {}", path.display());
            report.accepted += 1;
        } else {
            report.rejected += 1;
        }
    }
    info!(
        files = report.files,
        accepted = report.accepted,
        "NovelAI import complete"
    );
    report
}

/// File name for a scenario written at `at`.
pub fn nai_file_name(item: &Item, at: DateTime<Utc>) -> String {
    format!(
        "{}-{}.{}",
        item.display_title(),
        at.format("%Y-%m-%dT%H%M%S"),
        SCENARIO_EXTENSION
    )
}

/// Write one `.scenario` file per item into `dir`.
pub fn export_nai_files(
    container: &ResultContainer,
    dir: &Path,
    at: DateTime<Utc>,
) -> Result<Vec<PathBuf>, PersistenceError> {
    fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;

    let mut written = Vec::with_capacity(container.len());
    for item in container.iter() {
        let path = dir.join(nai_file_name(item, at));
        let bytes = serde_json::to_vec(&to_nai(item)).map_err(|source| PersistenceError::Json {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &bytes)?;
        written.push(path);
    }
    info!("Wrote {} scenario files to {}", written.len(), dir.display());
    Ok(written)
}

/// Write every item as one JSON array of NovelAI scenarios.
pub fn export_nai_bundle(container: &ResultContainer, path: &Path) -> Result<usize, PersistenceError> {
    let bundle: Vec<NaiScenario> = container.iter().map(to_nai).collect();
    let bytes = serde_json::to_vec_pretty(&bundle).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &bytes)?;
    Ok(bundle.len())
}
