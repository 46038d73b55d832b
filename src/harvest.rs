//! Paginated harvest with recursive descent into scenario option trees.
//!
//! [`Harvester`] walks a [`ContentSource`] and feeds everything it
//! retrieves into a [`ResultContainer`].
//!
//! # Offset accounting
//!
//! The remote search listing is defined in terms of top-level items only,
//! so the offset advances by exactly one per search summary processed,
//! whether that summary was accepted, rejected, or missing. Options
//! discovered underneath a scenario never move the offset.
//!
//! ```text
//! offset 0 ──search──▶ [A, B] ─▶ A (+3 options) ─▶ B      offset = 2
//! offset 2 ──search──▶ [C]    ─▶ C                        offset = 3
//! offset 3 ──search──▶ []     ─▶ done
//! ```
//!
//! # Early abort
//!
//! When harvesting stories with no pinned title the service sorts by
//! action count, descending. The first story rejected for having too few
//! actions therefore ends the whole harvest. With a pin the shortcut is
//! off and every page is scanned.
//!
//! # Option trees
//!
//! Options are fetched depth-first and inserted before their parent. The
//! service's option graph is expected to be a finite tree; a visited set
//! per root guards against a repeated id anyway.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use tracing::{debug, info, instrument, warn};

use crate::container::ResultContainer;
use crate::error::{HarvestError, ValidationError};
use crate::models::ContentKind;
use crate::progress::{HarvestProgress, HarvestProgressEvent, NoProgress};
use crate::source::ContentSource;

/// Counters from one harvest (or one scenario tree).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    /// Search pages requested, including the terminating empty page.
    pub pages: usize,
    /// Search summaries processed.
    pub top_level: usize,
    /// Items accepted into the container, options included.
    pub accepted: usize,
    /// Accepted items that were nested options.
    pub nested: usize,
    pub rejected: usize,
    /// Ids the service had nothing for, plus summaries without an id.
    pub missing: usize,
    /// Option ids skipped because they were already visited in this tree.
    pub cycles: usize,
    /// Offset the next search would have used.
    pub next_offset: usize,
    /// Stopped on the first under-length story of an unpinned harvest.
    pub aborted_early: bool,
}

impl HarvestReport {
    fn absorb(&mut self, tree: &HarvestReport) {
        self.accepted += tree.accepted;
        self.nested += tree.nested;
        self.rejected += tree.rejected;
        self.missing += tree.missing;
        self.cycles += tree.cycles;
    }
}

type Descent<'b> = Pin<Box<dyn Future<Output = Result<(), HarvestError>> + Send + 'b>>;

/// Drives paged search and fetch-by-id against a [`ContentSource`].
pub struct Harvester<'a, S: ContentSource + ?Sized> {
    source: &'a S,
    progress: &'a dyn HarvestProgress,
}

impl<'a, S: ContentSource + ?Sized> Harvester<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            progress: &NoProgress,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn HarvestProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Page through every top-level item of the container's kind.
    ///
    /// The search term is the container's pin, or empty when unpinned.
    /// Only transport failures are returned as errors; validation
    /// rejections and missing ids are counted in the report.
    #[instrument(skip_all, fields(kind = %container.kind()))]
    pub async fn harvest_top_level(
        &self,
        container: &mut ResultContainer,
    ) -> Result<HarvestReport, HarvestError> {
        let kind = container.kind();
        let term = container.pin().unwrap_or_default().to_string();
        let mut report = HarvestReport::default();
        let mut offset = 0usize;

        loop {
            self.progress
                .report(HarvestProgressEvent::Paging { kind, offset });
            let page = self.source.search_page(kind, &term, offset).await?;
            report.pages += 1;
            if page.is_empty() {
                break;
            }
            debug!(offset, len = page.len(), "Search page received");

            for summary in page {
                offset += 1;
                report.top_level += 1;

                let Some(id) = summary.lookup_id().map(str::to_string) else {
                    warn!("Search result \"{}\" has no id, skipping", summary.display_title());
                    report.missing += 1;
                    continue;
                };

                match kind {
                    ContentKind::Scenario => {
                        let tree = self.harvest_scenario_tree(&id, container).await?;
                        report.absorb(&tree);
                    }
                    ContentKind::Story => {
                        let Some(story) = self.source.fetch_by_id(kind, &id).await? else {
                            warn!(id = %id, "No story returned, skipping");
                            report.missing += 1;
                            continue;
                        };
                        let title = story.display_title().to_string();
                        match container.add_strict(story) {
                            Ok(()) => report.accepted += 1,
                            Err(e @ ValidationError::TooFewActions { .. })
                                if container.pin().is_none() =>
                            {
                                info!("\"{}\": {}; remaining stories are shorter, stopping", title, e);
                                report.rejected += 1;
                                report.aborted_early = true;
                                report.next_offset = offset;
                                return Ok(report);
                            }
                            Err(e) => {
                                debug!("Skipping \"{}\": {}", title, e);
                                report.rejected += 1;
                            }
                        }
                    }
                }

                self.progress.report(HarvestProgressEvent::Harvested {
                    kind,
                    top_level: report.top_level as u64,
                    accepted: report.accepted as u64,
                });
            }
        }

        report.next_offset = offset;
        info!(
            pages = report.pages,
            top_level = report.top_level,
            accepted = report.accepted,
            "Harvest of {} complete",
            kind.plural()
        );
        Ok(report)
    }

    /// Fetch the scenario `root_id` and every option beneath it, inserting
    /// children before parents. The root is stored with `is_option = false`,
    /// everything below it with `is_option = true`.
    #[instrument(skip(self, container))]
    pub async fn harvest_scenario_tree(
        &self,
        root_id: &str,
        container: &mut ResultContainer,
    ) -> Result<HarvestReport, HarvestError> {
        let mut visited = HashSet::new();
        let mut report = HarvestReport::default();
        self.descend(root_id.to_string(), false, container, &mut visited, &mut report)
            .await?;
        Ok(report)
    }

    fn descend<'b>(
        &'b self,
        id: String,
        is_option: bool,
        container: &'b mut ResultContainer,
        visited: &'b mut HashSet<String>,
        report: &'b mut HarvestReport,
    ) -> Descent<'b> {
        Box::pin(async move {
            if !visited.insert(id.clone()) {
                warn!(id = %id, "Option already visited in this tree, skipping");
                report.cycles += 1;
                return Ok(());
            }

            let Some(mut scenario) = self.source.fetch_by_id(ContentKind::Scenario, &id).await?
            else {
                warn!(id = %id, "No scenario returned, skipping branch");
                report.missing += 1;
                return Ok(());
            };
            scenario.is_option = is_option;

            let children: Vec<String> = scenario
                .options
                .iter()
                .filter_map(|option| {
                    let child = option.lookup_id().map(str::to_string);
                    if child.is_none() {
                        warn!(parent = %id, "Option \"{}\" has no id", option.display_title());
                    }
                    child
                })
                .collect();
            for child in children {
                self.descend(child, true, container, visited, report).await?;
            }

            let title = scenario.display_title().to_string();
            match container.add_strict(scenario) {
                Ok(()) => {
                    report.accepted += 1;
                    if is_option {
                        report.nested += 1;
                    }
                }
                Err(e) => {
                    debug!("Skipping \"{}\": {}", title, e);
                    report.rejected += 1;
                }
            }
            Ok(())
        })
    }
}
