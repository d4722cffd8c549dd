use std::sync::Arc;

use candlefill::{
    BackfillOutcome, BackfillReport, Candlefill, CandlefillConfig, IngestError, Interval, Page,
    RateLimitPolicy, SourceError,
};
use candlefill_mock::fixtures::series_ending_at;
use candlefill_mock::{MemoryLedger, MemoryRepository, PageBehavior, ScriptedSource};

use crate::helpers::{BACKFILL, P1, P2, P3, Rig, bar_now};

fn walk_config(page_size: u32, max_pages: u32, policy: RateLimitPolicy) -> CandlefillConfig {
    let mut cfg = CandlefillConfig::default();
    cfg.backfill.page_size = page_size;
    cfg.backfill.max_pages = max_pages;
    cfg.backfill.rate_limit_policy = policy;
    cfg
}

fn outcome_of<'a>(report: &'a BackfillReport, id: &str) -> &'a BackfillOutcome {
    &report
        .entries
        .iter()
        .find(|e| e.instrument_id == id)
        .unwrap()
        .outcome
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn walks_until_a_short_page_and_marks_done() {
    let (app, parts) = Rig::new()
        .tune(|b| b.config(walk_config(400, 20, RateLimitPolicy::RetrySamePage)))
        .build();
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 1000, Interval::Minute))
        .await;

    let report = app.backfill().unwrap().run(&ids(&[P1])).await.unwrap();

    let pages: Vec<u32> = parts.source.calls_for(P1).await.iter().map(|r| r.page).collect();
    assert_eq!(pages, vec![1, 2, 3]);
    match outcome_of(&report, P1) {
        BackfillOutcome::Completed { pages, summary } => {
            assert_eq!(*pages, 3);
            assert_eq!(summary.added, 1000);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(parts.ledger.done(), vec![P1.to_string()]);
    assert_eq!(parts.repo.contents().series(P1).len(), 1000);
    // one merge per instrument
    assert_eq!(parts.repo.saves(), 1);
}

#[tokio::test(start_paused = true)]
async fn a_full_page_with_a_bad_row_does_not_end_the_walk() {
    let (app, parts) = Rig::new()
        .tune(|b| b.config(walk_config(400, 20, RateLimitPolicy::RetrySamePage)))
        .build();
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 1000, Interval::Minute))
        .await;
    // Upstream sent 400 rows for page 1 but one of them failed to parse.
    let mut newest = series_ending_at(P1, bar_now(), 400, Interval::Minute);
    newest.remove(123);
    parts
        .source
        .push(P1, PageBehavior::ReturnPage(Page::with_returned(newest, 400)))
        .await;

    let report = app.backfill().unwrap().run(&ids(&[P1])).await.unwrap();

    let pages: Vec<u32> = parts.source.calls_for(P1).await.iter().map(|r| r.page).collect();
    assert_eq!(pages, vec![1, 2, 3]);
    match outcome_of(&report, P1) {
        BackfillOutcome::Completed { pages, summary } => {
            assert_eq!(*pages, 3);
            assert_eq!(summary.added, 999);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(parts.repo.contents().series(P1).len(), 999);
    assert_eq!(parts.ledger.done(), vec![P1.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn empty_page_after_full_pages_completes_the_walk() {
    let (app, parts) = Rig::new()
        .tune(|b| b.config(walk_config(400, 20, RateLimitPolicy::RetrySamePage)))
        .build();
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 800, Interval::Minute))
        .await;

    let report = app.backfill().unwrap().run(&ids(&[P1])).await.unwrap();

    assert_eq!(parts.source.calls_for(P1).await.len(), 3);
    assert!(matches!(
        outcome_of(&report, P1),
        BackfillOutcome::Completed { pages: 2, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn reaching_max_pages_counts_as_complete() {
    let (app, parts) = Rig::new()
        .tune(|b| b.config(walk_config(100, 2, RateLimitPolicy::RetrySamePage)))
        .build();
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 1000, Interval::Minute))
        .await;

    let report = app.backfill().unwrap().run(&ids(&[P1])).await.unwrap();

    assert_eq!(parts.source.calls_for(P1).await.len(), 2);
    assert!(matches!(
        outcome_of(&report, P1),
        BackfillOutcome::Completed { pages: 2, .. }
    ));
    assert_eq!(parts.repo.contents().series(P1).len(), 200);
}

#[tokio::test(start_paused = true)]
async fn ledger_listed_instruments_issue_no_request() {
    let (app, parts) = Rig::new().with_ledger(MemoryLedger::with_done([P1])).build();
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 100, Interval::Minute))
        .await;

    let report = app.backfill().unwrap().run(&ids(&[P1])).await.unwrap();

    assert_eq!(outcome_of(&report, P1), &BackfillOutcome::AlreadyDone);
    assert_eq!(report.skipped(), 1);
    assert!(parts.source.calls().await.is_empty());
    assert_eq!(parts.repo.saves(), 0);
}

#[tokio::test(start_paused = true)]
async fn rerun_after_completion_fetches_nothing() {
    let (app, parts) = Rig::new().build();
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 100, Interval::Minute))
        .await;
    let backfill = app.backfill().unwrap();

    backfill.run(&ids(&[P1])).await.unwrap();
    let calls = parts.source.calls().await.len();
    let second = backfill.run(&ids(&[P1])).await.unwrap();

    assert_eq!(parts.source.calls().await.len(), calls);
    assert_eq!(outcome_of(&second, P1), &BackfillOutcome::AlreadyDone);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_page_is_requested_again() {
    let (app, parts) = Rig::new()
        .tune(|b| b.config(walk_config(400, 20, RateLimitPolicy::RetrySamePage)))
        .build();
    parts
        .source
        .push_failures(P1, SourceError::RateLimited, 4)
        .await;
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 600, Interval::Minute))
        .await;

    let report = app.backfill().unwrap().run(&ids(&[P1])).await.unwrap();

    let pages: Vec<u32> = parts.source.calls_for(P1).await.iter().map(|r| r.page).collect();
    // pauses do not consume the three-attempt budget
    assert_eq!(pages, vec![1, 1, 1, 1, 1, 2]);
    assert!(matches!(
        outcome_of(&report, P1),
        BackfillOutcome::Completed { pages: 2, .. }
    ));
    assert_eq!(parts.repo.contents().series(P1).len(), 600);
}

#[tokio::test(start_paused = true)]
async fn pause_cap_abandons_the_instrument_for_this_run() {
    let (app, parts) = Rig::new()
        .tune(|b| {
            let mut cfg = walk_config(400, 20, RateLimitPolicy::RetrySamePage);
            cfg.backfill.max_pauses_per_page = Some(2);
            b.config(cfg)
        })
        .build();
    parts
        .source
        .push_failures(P1, SourceError::RateLimited, 5)
        .await;

    let report = app.backfill().unwrap().run(&ids(&[P1])).await.unwrap();

    assert_eq!(parts.source.calls_for(P1).await.len(), 2);
    assert!(matches!(
        outcome_of(&report, P1),
        BackfillOutcome::Failed { .. }
    ));
    assert!(parts.ledger.done().is_empty());
}

#[tokio::test(start_paused = true)]
async fn skipped_page_leaves_the_instrument_pending() {
    let (app, parts) = Rig::new()
        .tune(|b| b.config(walk_config(400, 20, RateLimitPolicy::SkipPage)))
        .build();
    parts
        .source
        .push(P1, PageBehavior::Fail(SourceError::RateLimited))
        .await;
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 600, Interval::Minute))
        .await;

    let report = app.backfill().unwrap().run(&ids(&[P1])).await.unwrap();

    let pages: Vec<u32> = parts.source.calls_for(P1).await.iter().map(|r| r.page).collect();
    assert_eq!(pages, vec![1, 2]);
    match outcome_of(&report, P1) {
        BackfillOutcome::Incomplete { pages, summary, .. } => {
            assert_eq!(*pages, 1);
            assert_eq!(summary.added, 200);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(parts.ledger.done().is_empty());
    assert_eq!(parts.repo.contents().series(P1).len(), 200);
}

#[tokio::test(start_paused = true)]
async fn transport_failures_mid_walk_keep_fetched_rows() {
    let (app, parts) = Rig::new()
        .tune(|b| b.config(walk_config(100, 20, RateLimitPolicy::RetrySamePage)))
        .build();
    parts
        .source
        .push(
            P1,
            PageBehavior::Return(series_ending_at(P1, bar_now(), 100, Interval::Minute)),
        )
        .await;
    parts
        .source
        .push_failures(P1, SourceError::Transport("reset".into()), 3)
        .await;

    let report = app.backfill().unwrap().run(&ids(&[P1])).await.unwrap();

    match outcome_of(&report, P1) {
        BackfillOutcome::Incomplete { pages, reason, .. } => {
            assert_eq!(*pages, 1);
            assert!(reason.contains("3 attempts"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(parts.repo.contents().series(P1).len(), 100);
    assert!(parts.ledger.done().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rejected_first_page_fails_without_marking() {
    let (app, parts) = Rig::new().build();
    parts
        .source
        .push(P1, PageBehavior::Fail(SourceError::rejected(404, "pool not found")))
        .await;

    let report = app.backfill().unwrap().run(&ids(&[P1])).await.unwrap();

    assert_eq!(parts.source.calls_for(P1).await.len(), 1);
    match outcome_of(&report, P1) {
        BackfillOutcome::Failed { reason } => assert!(reason.contains("404")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(parts.ledger.done().is_empty());
}

#[tokio::test(start_paused = true)]
async fn instrument_without_history_is_not_marked() {
    let (app, parts) = Rig::new().build();

    let report = app.backfill().unwrap().run(&ids(&[P1])).await.unwrap();

    assert_eq!(outcome_of(&report, P1), &BackfillOutcome::NoData);
    assert!(parts.ledger.done().is_empty());
}

#[tokio::test(start_paused = true)]
async fn control_off_stops_before_the_next_instrument() {
    let (app, parts) = Rig::new().build();
    for id in [P1, P2] {
        parts
            .source
            .set_series(id, series_ending_at(id, bar_now(), 50, Interval::Minute))
            .await;
    }
    parts.control.off_after(BACKFILL, 1);

    let report = app.backfill().unwrap().run(&ids(&[P1, P2])).await.unwrap();

    assert!(report.stopped);
    assert_eq!(report.entries.len(), 1);
    assert!(parts.source.calls_for(P2).await.is_empty());
    assert_eq!(report.completed().collect::<Vec<_>>(), vec![P1]);
}

#[tokio::test(start_paused = true)]
async fn tracked_lists_ledger_members_in_input_order() {
    let (app, parts) = Rig::new().with_ledger(MemoryLedger::with_done([P2])).build();
    parts
        .source
        .set_series(P3, series_ending_at(P3, bar_now(), 10, Interval::Minute))
        .await;
    let backfill = app.backfill().unwrap();
    let list = ids(&[P3, P1, P2]);

    backfill.run(&list).await.unwrap();

    assert_eq!(backfill.tracked(&list), ids(&[P3, P2]));
}

#[tokio::test]
async fn backfill_requires_a_ledger() {
    let (source, _ctl) = ScriptedSource::new_with_controller("scripted");
    let app = Candlefill::builder()
        .with_source(source)
        .with_repository(Arc::new(MemoryRepository::new()))
        .build()
        .unwrap();

    let err = app.backfill().unwrap_err();
    assert!(matches!(err, IngestError::Config(_)));
}
