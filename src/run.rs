//! Command orchestration behind the `aids` CLI.
//!
//! | Command | Entry point |
//! |---------|-------------|
//! | `aids stories` / `scenarios` / `all` | [`run_harvest`] |
//! | `aids upload` | [`run_upload`] |
//! | `aids status` | [`run_status`] |
//! | `aids makenai` | [`run_makenai`] |
//! | `aids makejson` | [`run_makejson`] |
//!
//! Summaries go to stdout; logs and progress go to stderr. Transport and
//! login failures are returned as errors. Persistence failures are logged
//! and the command still succeeds.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info};

use crate::client::GraphQlClient;
use crate::config::{Config, Credentials};
use crate::container::ResultContainer;
use crate::convert::{export_nai_bundle, export_nai_files, find_scenario_files, import_nai_files};
use crate::harvest::{HarvestReport, Harvester};
use crate::models::ContentKind;
use crate::progress::{HarvestProgress, ProgressMode};
use crate::source::ContentSource;
use crate::storage::{list_backups, DumpOutcome};
use crate::upload::{upload_scenarios, ScenarioPublisher, UploadReport};

/// Per-invocation overrides for a harvest.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Pinned title; falls back to `[harvest].title`.
    pub title: Option<String>,
    /// Story threshold; falls back to `[harvest].min_actions`.
    pub min_actions: Option<usize>,
    /// Load the existing output file before harvesting.
    pub merge: bool,
    pub progress: ProgressMode,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            title: None,
            min_actions: None,
            merge: false,
            progress: ProgressMode::Off,
        }
    }
}

/// Outcome of harvesting one kind.
#[derive(Debug)]
pub struct KindOutcome {
    pub container: ResultContainer,
    pub report: HarvestReport,
    /// `None` when the dump failed (already logged).
    pub dump: Option<DumpOutcome>,
}

/// Log in and harvest each of `kinds` in turn.
pub async fn run_harvest(cfg: &Config, kinds: &[ContentKind], opts: &HarvestOptions) -> Result<()> {
    let client = logged_in_client(cfg).await?;
    let reporter = opts.progress.reporter();

    for &kind in kinds {
        let outcome = harvest_kind(cfg, &client, kind, opts, reporter.as_ref()).await?;
        print_harvest_summary(&outcome);
    }
    Ok(())
}

/// Harvest one kind from `source` into a fresh container and dump it.
pub async fn harvest_kind<S: ContentSource + ?Sized>(
    cfg: &Config,
    source: &S,
    kind: ContentKind,
    opts: &HarvestOptions,
    progress: &dyn HarvestProgress,
) -> Result<KindOutcome> {
    let path = cfg.storage.path_for(kind);
    let mut container = ResultContainer::new(kind);

    if opts.merge && path.exists() {
        match container.load(path) {
            Ok(loaded) => info!(
                "Merged {} of {} existing {}",
                loaded.accepted,
                loaded.found,
                kind.plural()
            ),
            Err(e) => error!("Could not merge existing {}: {}", kind.plural(), e),
        }
    }

    let title = opts.title.as_deref().unwrap_or(&cfg.harvest.title);
    let min_actions = opts.min_actions.unwrap_or(cfg.harvest.min_actions);
    container.configure(title, min_actions);

    let report = Harvester::new(source)
        .with_progress(progress)
        .harvest_top_level(&mut container)
        .await
        .with_context(|| format!("Harvest of {} failed", kind.plural()))?;

    let dump = match container.dump(path, &cfg.storage.backup_policy()) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!("Could not save {}: {}", kind.plural(), e);
            None
        }
    };

    Ok(KindOutcome {
        container,
        report,
        dump,
    })
}

fn print_harvest_summary(outcome: &KindOutcome) {
    let container = &outcome.container;
    let report = &outcome.report;

    println!("harvest {}", container.kind().plural());
    match container.pin() {
        Some(pin) => println!("  pinned title: \"{}\"", pin),
        None => println!("  pinned title: (none)"),
    }
    println!("  pages: {}", report.pages);
    println!("  top-level items: {}", report.top_level);
    println!("  accepted: {} ({} nested options)", report.accepted, report.nested);
    println!("  rejected: {}", report.rejected);
    println!("  missing: {}", report.missing);
    if report.aborted_early {
        println!("  stopped early: below {} actions", container.min_actions() + 1);
    }
    match &outcome.dump {
        Some(dump) => {
            println!("  saved: {} items to {}", dump.items, dump.path.display());
            if let Some(backup) = &dump.backup {
                println!("  backup: {}", backup.display());
            }
        }
        None => println!("  saved: failed (see log)"),
    }
    println!("ok");
}

/// Log in, then upload scenarios from `file` (or the configured scenarios
/// file). If that file does not exist, harvest scenarios first.
pub async fn run_upload(cfg: &Config, file: Option<PathBuf>, progress: ProgressMode) -> Result<()> {
    let client = logged_in_client(cfg).await?;
    let reporter = progress.reporter();
    let path = file.unwrap_or_else(|| cfg.storage.scenarios_path.clone());

    let scenarios = if path.exists() {
        let mut scenarios = ResultContainer::scenarios();
        scenarios
            .load(&path)
            .with_context(|| format!("Failed to load scenarios from {}", path.display()))?;
        scenarios
    } else {
        info!("{} not found, harvesting scenarios first", path.display());
        let mut harvest_cfg = cfg.clone();
        harvest_cfg.storage.scenarios_path = path.clone();
        let opts = HarvestOptions {
            progress,
            ..Default::default()
        };
        let outcome = harvest_kind(
            &harvest_cfg,
            &client,
            ContentKind::Scenario,
            &opts,
            reporter.as_ref(),
        )
        .await?;
        print_harvest_summary(&outcome);
        outcome.container
    };

    let report = upload_from(&client, &scenarios).await?;
    println!("upload {}", path.display());
    println!("  uploaded: {}", report.uploaded);
    println!("  skipped options: {}", report.skipped);
    println!("  failed: {}", report.failed);
    println!("ok");
    Ok(())
}

async fn upload_from<P: ScenarioPublisher + ?Sized>(
    publisher: &P,
    scenarios: &ResultContainer,
) -> Result<UploadReport> {
    upload_scenarios(publisher, scenarios)
        .await
        .context("Upload failed")
}

/// Print item counts of the persisted files and the number of backups.
pub fn run_status(cfg: &Config) -> Result<()> {
    println!("{:<10} {:<8} {:<8} FILE", "KIND", "ITEMS", "BACKUPS");
    for kind in [ContentKind::Story, ContentKind::Scenario] {
        let path = cfg.storage.path_for(kind);
        let items = if path.exists() {
            match ResultContainer::new(kind).load(path) {
                Ok(loaded) => loaded.found.to_string(),
                Err(e) => {
                    error!("{}", e);
                    "invalid".to_string()
                }
            }
        } else {
            "-".to_string()
        };
        let backups = list_backups(&cfg.storage.backups_dir, kind)
            .map(|b| b.len().to_string())
            .unwrap_or_else(|_| "?".to_string());
        println!(
            "{:<10} {:<8} {:<8} {}",
            kind.plural(),
            items,
            backups,
            path.display()
        );
    }
    Ok(())
}

/// Convert a harvested scenarios file into NovelAI scenarios: one
/// `.scenario` file per item in `out_dir`, or a single array at `bundle`.
pub fn run_makenai(
    cfg: &Config,
    file: Option<PathBuf>,
    out_dir: &Path,
    bundle: Option<PathBuf>,
) -> Result<()> {
    let path = file.unwrap_or_else(|| cfg.storage.scenarios_path.clone());
    let mut scenarios = ResultContainer::scenarios();
    let loaded = scenarios
        .load(&path)
        .with_context(|| format!("Failed to load scenarios from {}", path.display()))?;

    println!("makenai {}", path.display());
    println!("  loaded: {} of {}", loaded.accepted, loaded.found);
    match bundle {
        Some(target) => {
            let written = export_nai_bundle(&scenarios, &target)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            println!("  converted: {} into {}", written, target.display());
        }
        None => {
            let written = export_nai_files(&scenarios, out_dir, Utc::now())
                .with_context(|| format!("Failed to write scenarios to {}", out_dir.display()))?;
            println!("  converted: {} files in {}", written.len(), out_dir.display());
        }
    }
    println!("ok");
    Ok(())
}

/// Convert NovelAI `.scenario` files under `dir` into a harvested
/// scenarios file (default `[storage].scenarios_path`), with a backup.
pub fn run_makejson(
    cfg: &Config,
    dir: &Path,
    patterns: &[String],
    out: Option<PathBuf>,
    merge: bool,
) -> Result<()> {
    let files = find_scenario_files(dir, patterns)?;
    let target = out.unwrap_or_else(|| cfg.storage.scenarios_path.clone());

    let mut scenarios = ResultContainer::scenarios();
    if merge && target.exists() {
        scenarios
            .load(&target)
            .with_context(|| format!("Failed to load scenarios from {}", target.display()))?;
    }

    let report = import_nai_files(&files, &mut scenarios);
    let dump = scenarios
        .dump(&target, &cfg.storage.backup_policy())
        .with_context(|| format!("Failed to save {}", target.display()))?;

    println!("makejson {}", dir.display());
    println!("  files: {}", report.files);
    println!("  converted: {}", report.accepted);
    println!("  rejected: {}", report.rejected);
    println!("  unreadable: {}", report.unreadable);
    println!("  saved: {} items to {}", dump.items, dump.path.display());
    println!("ok");
    Ok(())
}

async fn logged_in_client(cfg: &Config) -> Result<GraphQlClient> {
    let credentials = Credentials::from_env()?;
    let mut client = GraphQlClient::new(&cfg.api)?;
    client.login(&credentials).await.context("Login failed")?;
    Ok(client)
}
