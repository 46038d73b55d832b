//! # AIDS Harvest
//!
//! Harvest a user's saved stories and scenarios from a role-play service's
//! GraphQL API, deduplicate and validate them, and persist them as JSON.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────────┐
//! │ ContentSource│──▶│  Harvester   │──▶│ ResultContainer │
//! │  (GraphQL)   │   │ pages + tree │   │ rules + index   │
//! └──────────────┘   └──────────────┘   └────────┬────────┘
//!                                                │
//!                              ┌─────────────────┤
//!                              ▼                 ▼
//!                        ┌───────────┐    ┌─────────────┐
//!                        │ JSON dump │    │   upload    │
//!                        │ + backups │    │ (publisher) │
//!                        └───────────┘    └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export AIDS_USERNAME=me@example.com AIDS_PASSWORD=...
//! aids stories --min-actions 10   # harvest stories into stories.json
//! aids scenarios --title "Castle" # harvest one scenario tree
//! aids status                     # show what is on disk
//! aids upload                     # re-publish scenarios.json
//! aids makenai --out-dir nai      # scenarios.json to .scenario files
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `Item`, content kinds, identity keys |
//! | [`error`] | Validation, harvest, and persistence errors |
//! | [`container`] | Validating, deduplicating result store |
//! | [`storage`] | JSON dump/load with rotating backups |
//! | [`source`] | Paged-search / fetch-by-id abstraction |
//! | [`harvest`] | Pagination and recursive option-tree traversal |
//! | [`client`] | GraphQL-over-HTTP client with bounded retry |
//! | [`queries`] | GraphQL request payloads |
//! | [`upload`] | Re-upload of harvested scenarios |
//! | [`convert`] | NovelAI `.scenario` import and export |
//! | [`progress`] | Progress reporting on stderr |
//! | [`config`] | TOML configuration parsing |
//! | [`logger`] | `tracing` subscriber setup |
//! | [`run`] | CLI command orchestration |

pub mod client;
pub mod config;
pub mod container;
pub mod convert;
pub mod error;
pub mod harvest;
pub mod logger;
pub mod models;
pub mod progress;
pub mod queries;
pub mod run;
pub mod source;
pub mod storage;
pub mod upload;
