//! Traversal tests against an in-memory content source.
//!
//! These cover pagination termination, offset accounting around nested
//! options, the unpinned story early abort, and skipping of missing ids.

mod common;

use aids_harvest::container::ResultContainer;
use aids_harvest::error::HarvestError;
use aids_harvest::harvest::Harvester;
use aids_harvest::models::ContentKind;
use aids_harvest::progress::HarvestProgressEvent;
use common::{scenario, story, RecordingProgress, StubSource};

fn titles(container: &ResultContainer) -> Vec<String> {
    container
        .iter()
        .map(|item| item.display_title().to_string())
        .collect()
}

#[tokio::test]
async fn test_pagination_stops_on_empty_page() {
    let source = StubSource::new()
        .page(0, &["a", "b"])
        .page(2, &["c"])
        .record(scenario("a", "Alpha", &[]))
        .record(scenario("b", "Beta", &[]))
        .record(scenario("c", "Gamma", &[]));

    let mut scenarios = ResultContainer::scenarios();
    let report = Harvester::new(&source)
        .harvest_top_level(&mut scenarios)
        .await
        .unwrap();

    assert_eq!(source.search_offsets(), vec![0, 2, 3]);
    assert_eq!(report.pages, 3);
    assert_eq!(report.top_level, 3);
    assert_eq!(report.next_offset, 3);
    assert_eq!(titles(&scenarios), vec!["Alpha", "Beta", "Gamma"]);
}

#[tokio::test]
async fn test_nested_options_do_not_move_offset() {
    let source = StubSource::new()
        .page(0, &["root"])
        .record(scenario("root", "Crossroads", &["o1", "o2", "o3"]))
        .record(scenario("o1", "Left", &[]))
        .record(scenario("o2", "Right", &[]))
        .record(scenario("o3", "Back", &[]));

    let mut scenarios = ResultContainer::scenarios();
    let report = Harvester::new(&source)
        .harvest_top_level(&mut scenarios)
        .await
        .unwrap();

    assert_eq!(scenarios.len(), 4);
    assert_eq!(report.accepted, 4);
    assert_eq!(report.nested, 3);
    assert_eq!(report.next_offset, 1);
    assert_eq!(source.search_offsets(), vec![0, 1]);

    // Children are stored before their parent.
    assert_eq!(titles(&scenarios), vec!["Left", "Right", "Back", "Crossroads"]);
    let flags: Vec<bool> = scenarios.iter().map(|s| s.is_option).collect();
    assert_eq!(flags, vec![true, true, true, false]);
}

#[tokio::test]
async fn test_scenario_tree_is_depth_first() {
    let source = StubSource::new()
        .record(scenario("root", "Root", &["a", "d"]))
        .record(scenario("a", "A", &["b"]))
        .record(scenario("b", "B", &["c"]))
        .record(scenario("c", "C", &[]))
        .record(scenario("d", "D", &[]));

    let mut scenarios = ResultContainer::scenarios();
    let report = Harvester::new(&source)
        .harvest_scenario_tree("root", &mut scenarios)
        .await
        .unwrap();

    assert_eq!(source.fetched(), vec!["root", "a", "b", "c", "d"]);
    assert_eq!(titles(&scenarios), vec!["C", "B", "A", "D", "Root"]);
    assert_eq!(report.accepted, 5);
    assert_eq!(report.nested, 4);
}

#[tokio::test]
async fn test_unpinned_story_harvest_stops_at_first_short_story() {
    let source = StubSource::new()
        .page(0, &["long", "short", "longer"])
        .page(3, &["late"])
        .record(story("long", "Epic", 30))
        .record(story("short", "Brief", 4))
        .record(story("longer", "Saga", 40))
        .record(story("late", "Late", 50));

    let mut stories = ResultContainer::stories(10);
    let report = Harvester::new(&source)
        .harvest_top_level(&mut stories)
        .await
        .unwrap();

    assert!(report.aborted_early);
    assert_eq!(titles(&stories), vec!["Epic"]);
    assert_eq!(source.fetched(), vec!["long", "short"]);
    assert_eq!(source.search_offsets(), vec![0]);
}

#[tokio::test]
async fn test_short_story_first_ends_harvest_empty() {
    let source = StubSource::new()
        .page(0, &["short", "long"])
        .record(story("short", "Brief", 10))
        .record(story("long", "Epic", 11));

    let mut stories = ResultContainer::stories(10);
    let report = Harvester::new(&source)
        .harvest_top_level(&mut stories)
        .await
        .unwrap();

    assert!(report.aborted_early);
    assert!(stories.is_empty());
    assert_eq!(source.fetched(), vec!["short"]);
}

#[tokio::test]
async fn test_pinned_story_harvest_scans_every_page() {
    let source = StubSource::new()
        .page(0, &["s1", "s2"])
        .page(2, &["s3"])
        .record(story("s1", "Saga", 3))
        .record(story("s2", "Saga", 25))
        .record(story("s3", "Other", 25));

    let mut stories = ResultContainer::stories(10);
    stories.configure("Saga", 10);
    let report = Harvester::new(&source)
        .harvest_top_level(&mut stories)
        .await
        .unwrap();

    assert!(!report.aborted_early);
    assert_eq!(source.search_offsets(), vec![0, 2, 3]);
    assert!(source.search_terms().iter().all(|t| t == "Saga"));
    assert_eq!(stories.len(), 1);
    assert_eq!(stories.items()[0].actions.len(), 25);
    assert_eq!(report.rejected, 2);
}

#[tokio::test]
async fn test_pinned_search_sends_title_as_given() {
    let source = StubSource::new()
        .page(0, &["a", "b"])
        .record(scenario("a", "Either/Or", &[]))
        .record(scenario("b", "Neither", &[]));

    let mut scenarios = ResultContainer::scenarios();
    scenarios.configure("Either/Or", 0);
    let report = Harvester::new(&source)
        .harvest_top_level(&mut scenarios)
        .await
        .unwrap();

    assert_eq!(source.search_terms(), vec!["Either/Or", "Either/Or"]);
    assert_eq!(titles(&scenarios), vec!["Either-Or"]);
    assert_eq!(report.rejected, 1);
}

#[tokio::test]
async fn test_rejected_items_still_advance_offset() {
    let source = StubSource::new()
        .page(0, &["a", "dup"])
        .record(scenario("a", "Castle", &[]))
        .record(scenario("dup", "Castle", &[]));

    let mut scenarios = ResultContainer::scenarios();
    let report = Harvester::new(&source)
        .harvest_top_level(&mut scenarios)
        .await
        .unwrap();

    assert_eq!(scenarios.len(), 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(source.search_offsets(), vec![0, 2]);
}

#[tokio::test]
async fn test_missing_ids_are_skipped() {
    let source = StubSource::new()
        .page(0, &["a", "ghost", "b"])
        .record(scenario("a", "Alpha", &["gone"]))
        .record(scenario("b", "Beta", &[]));

    let mut scenarios = ResultContainer::scenarios();
    let report = Harvester::new(&source)
        .harvest_top_level(&mut scenarios)
        .await
        .unwrap();

    assert_eq!(titles(&scenarios), vec!["Alpha", "Beta"]);
    assert_eq!(report.missing, 2);
    assert_eq!(report.next_offset, 3);
    assert_eq!(source.search_offsets(), vec![0, 3]);
}

#[tokio::test]
async fn test_repeated_option_id_is_fetched_once() {
    let source = StubSource::new()
        .record(scenario("root", "Loop", &["a"]))
        .record(scenario("a", "Again", &["root"]));

    let mut scenarios = ResultContainer::scenarios();
    let report = Harvester::new(&source)
        .harvest_scenario_tree("root", &mut scenarios)
        .await
        .unwrap();

    assert_eq!(source.fetched(), vec!["root", "a"]);
    assert_eq!(report.cycles, 1);
    assert_eq!(scenarios.len(), 2);
}

#[tokio::test]
async fn test_transport_failure_is_returned() {
    let source = StubSource::new()
        .page(0, &["a"])
        .fail_at(1)
        .record(scenario("a", "Alpha", &[]));

    let mut scenarios = ResultContainer::scenarios();
    let err = Harvester::new(&source)
        .harvest_top_level(&mut scenarios)
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Transient { .. }));
    // Items accepted before the failure are kept.
    assert_eq!(scenarios.len(), 1);
}

#[tokio::test]
async fn test_progress_events_follow_pages() {
    let source = StubSource::new()
        .page(0, &["a"])
        .record(scenario("a", "Alpha", &["b"]))
        .record(scenario("b", "Beta", &[]));
    let progress = RecordingProgress::default();

    let mut scenarios = ResultContainer::scenarios();
    Harvester::new(&source)
        .with_progress(&progress)
        .harvest_top_level(&mut scenarios)
        .await
        .unwrap();

    let kind = ContentKind::Scenario;
    assert_eq!(
        *progress.events.lock().unwrap(),
        vec![
            HarvestProgressEvent::Paging { kind, offset: 0 },
            HarvestProgressEvent::Harvested {
                kind,
                top_level: 1,
                accepted: 2
            },
            HarvestProgressEvent::Paging { kind, offset: 1 },
        ]
    );
}
