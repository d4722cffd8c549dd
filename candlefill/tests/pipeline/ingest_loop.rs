use std::sync::Arc;
use std::time::Duration;

use candlefill::{InstrumentOutcome, Interval, LoopState, SourceError};
use candlefill_mock::fixtures::series_ending_at;
use candlefill_mock::{MemoryRepository, MissingInstruments, PageBehavior};
use chrono::Duration as ChronoDuration;

use crate::helpers::{LOOP, P1, P2, Rig, bar_now};

fn outcome_of<'a>(
    report: &'a candlefill::RotationReport,
    id: &str,
) -> &'a InstrumentOutcome {
    &report
        .instruments
        .iter()
        .find(|r| r.instrument_id == id)
        .unwrap()
        .outcome
}

#[tokio::test(start_paused = true)]
async fn empty_store_fetches_max_lookback_for_every_instrument() {
    let (app, parts) = Rig::new().tune(|b| b.instruments([P1, P2])).build();
    for id in [P1, P2] {
        parts
            .source
            .set_series(id, series_ending_at(id, bar_now(), 300, Interval::Minute))
            .await;
    }

    let report = app.ingestion_loop().run_once().await.unwrap();

    assert!(!report.stopped);
    assert_eq!(report.instruments.len(), 2);
    for id in [P1, P2] {
        let line = report.instruments.iter().find(|r| r.instrument_id == id).unwrap();
        assert_eq!(line.deficit, 200);
        let calls = parts.source.calls_for(id).await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].page, 1);
        assert_eq!(calls[0].limit, 200);
        assert_eq!(parts.repo.contents().series(id).len(), 200);
    }
    assert_eq!(report.rows_added(), 400);
}

#[tokio::test(start_paused = true)]
async fn partial_gap_requests_exactly_the_missing_bars() {
    let stored_last = bar_now() - ChronoDuration::minutes(45);
    let repo = MemoryRepository::with_candles(series_ending_at(P1, stored_last, 10, Interval::Minute));
    let (app, parts) = Rig::with_repo(repo).tune(|b| b.instruments([P1])).build();
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 500, Interval::Minute))
        .await;

    let report = app.ingestion_loop().run_once().await.unwrap();

    assert_eq!(report.instruments[0].deficit, 45);
    let calls = parts.source.calls_for(P1).await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].limit, 45);
    match outcome_of(&report, P1) {
        InstrumentOutcome::Merged { pages, summary } => {
            assert_eq!(*pages, 1);
            assert_eq!(summary.added, 45);
            assert_eq!(summary.total, 55);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(parts.repo.contents().last_timestamp(P1), Some(bar_now()));
    assert_eq!(app.store().snapshot().unwrap(), parts.repo.contents());
}

#[tokio::test(start_paused = true)]
async fn short_page_ends_the_instrument_before_the_deficit_closes() {
    let (app, parts) = Rig::new().tune(|b| b.instruments([P1])).build();
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 30, Interval::Minute))
        .await;

    let report = app.ingestion_loop().run_once().await.unwrap();

    assert_eq!(parts.source.calls_for(P1).await.len(), 1);
    match outcome_of(&report, P1) {
        InstrumentOutcome::Merged { summary, .. } => assert_eq!(summary.added, 30),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn large_deficits_are_split_into_pages() {
    let (app, parts) = Rig::new()
        .tune(|b| b.instruments([P1]).max_page_size(50))
        .build();
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 80, Interval::Minute))
        .await;

    let report = app.ingestion_loop().run_once().await.unwrap();

    let pages: Vec<(u32, u32)> = parts
        .source
        .calls_for(P1)
        .await
        .iter()
        .map(|r| (r.page, r.limit))
        .collect();
    assert_eq!(pages, vec![(1, 50), (2, 50)]);
    match outcome_of(&report, P1) {
        InstrumentOutcome::Merged { pages, summary } => {
            assert_eq!(*pages, 2);
            assert_eq!(summary.added, 80);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn pages_at_the_source_cap_cover_the_whole_deficit() {
    let mut cfg = candlefill::CandlefillConfig::default();
    cfg.source.max_page_size = 50;
    cfg.ingest.max_page_size = 50;
    cfg.backfill.page_size = 50;
    let (app, parts) = Rig::new()
        .tune(|b| b.config(cfg).instruments([P1]).max_lookback(120))
        .build();
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 400, Interval::Minute))
        .await;

    let report = app.ingestion_loop().run_once().await.unwrap();

    let pages: Vec<(u32, u32)> = parts
        .source
        .calls_for(P1)
        .await
        .iter()
        .map(|r| (r.page, r.limit))
        .collect();
    assert_eq!(pages, vec![(1, 50), (2, 50), (3, 20)]);
    assert_eq!(report.instruments[0].deficit, 120);
    assert_eq!(parts.repo.contents().series(P1).len(), 120);
}

#[tokio::test(start_paused = true)]
async fn exhausted_rate_limit_budget_skips_only_that_instrument() {
    let (app, parts) = Rig::new().tune(|b| b.instruments([P1, P2])).build();
    parts
        .source
        .push_failures(P1, SourceError::RateLimited, 3)
        .await;
    parts
        .source
        .set_series(P2, series_ending_at(P2, bar_now(), 300, Interval::Minute))
        .await;

    let report = app.ingestion_loop().run_once().await.unwrap();

    assert_eq!(parts.source.calls_for(P1).await.len(), 3);
    assert!(matches!(
        outcome_of(&report, P1),
        InstrumentOutcome::Skipped { .. }
    ));
    assert!(matches!(
        outcome_of(&report, P2),
        InstrumentOutcome::Merged { .. }
    ));
    assert!(parts.repo.contents().series(P1).is_empty());
    assert_eq!(parts.repo.contents().series(P2).len(), 200);
}

#[tokio::test(start_paused = true)]
async fn rows_fetched_before_a_failure_are_still_merged() {
    let (app, parts) = Rig::new()
        .tune(|b| b.instruments([P1]).max_page_size(50))
        .build();
    parts
        .source
        .push(
            P1,
            PageBehavior::Return(series_ending_at(P1, bar_now(), 50, Interval::Minute)),
        )
        .await;
    parts
        .source
        .push(P1, PageBehavior::Fail(SourceError::rejected(500, "boom")))
        .await;

    let report = app.ingestion_loop().run_once().await.unwrap();

    assert_eq!(parts.source.calls_for(P1).await.len(), 2);
    match outcome_of(&report, P1) {
        InstrumentOutcome::Merged { pages, summary } => {
            assert_eq!(*pages, 1);
            assert_eq!(summary.added, 50);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn empty_upstream_reports_no_data() {
    let (app, parts) = Rig::new().tune(|b| b.instruments([P1])).build();

    let report = app.ingestion_loop().run_once().await.unwrap();

    assert_eq!(outcome_of(&report, P1), &InstrumentOutcome::NoData);
    assert_eq!(parts.repo.saves(), 0);
}

#[tokio::test(start_paused = true)]
async fn up_to_date_instruments_issue_no_request() {
    let repo = MemoryRepository::with_candles(series_ending_at(P1, bar_now(), 5, Interval::Minute));
    let (app, parts) = Rig::with_repo(repo).tune(|b| b.instruments([P1])).build();

    let report = app.ingestion_loop().run_once().await.unwrap();

    assert_eq!(report.instruments[0].deficit, 0);
    assert_eq!(outcome_of(&report, P1), &InstrumentOutcome::UpToDate);
    assert!(parts.source.calls().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_rotation_at_the_same_instant_changes_nothing() {
    let (app, parts) = Rig::new().tune(|b| b.instruments([P1, P2])).build();
    for id in [P1, P2] {
        parts
            .source
            .set_series(id, series_ending_at(id, bar_now(), 250, Interval::Minute))
            .await;
    }
    let mut ingest = app.ingestion_loop();

    ingest.run_once().await.unwrap();
    let after_first = parts.repo.contents();
    let calls_after_first = parts.source.calls().await.len();

    let second = ingest.run_once().await.unwrap();

    assert_eq!(parts.repo.contents(), after_first);
    assert_eq!(parts.source.calls().await.len(), calls_after_first);
    assert_eq!(second.rows_added(), 0);
    assert!(
        second
            .instruments
            .iter()
            .all(|r| r.outcome == InstrumentOutcome::UpToDate)
    );
}

#[tokio::test(start_paused = true)]
async fn heartbeat_is_the_bar_aligned_rotation_start() {
    let (app, parts) = Rig::new().tune(|b| b.instruments([P1])).build();

    let report = app.ingestion_loop().run_once().await.unwrap();

    assert_eq!(report.started_at, bar_now());
    assert_eq!(parts.status.beats(), vec![bar_now()]);
}

#[tokio::test(start_paused = true)]
async fn control_off_before_rotation_does_nothing() {
    let (app, parts) = Rig::new().tune(|b| b.instruments([P1])).build();
    parts.control.set(LOOP, false);
    let mut ingest = app.ingestion_loop();

    let report = ingest.run_once().await.unwrap();

    assert!(report.stopped);
    assert!(report.instruments.is_empty());
    assert!(parts.source.calls().await.is_empty());
    assert!(parts.status.beats().is_empty());
    assert_eq!(ingest.state(), &LoopState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn control_off_mid_rotation_finishes_the_current_instrument_only() {
    let (app, parts) = Rig::new().tune(|b| b.instruments([P1, P2])).build();
    for id in [P1, P2] {
        parts
            .source
            .set_series(id, series_ending_at(id, bar_now(), 250, Interval::Minute))
            .await;
    }
    // on for the rotation start and before P1, off before P2
    parts.control.off_after(LOOP, 2);
    let mut ingest = app.ingestion_loop();

    let report = ingest.run_once().await.unwrap();

    assert!(report.stopped);
    assert_eq!(report.instruments.len(), 1);
    assert_eq!(report.instruments[0].instrument_id, P1);
    assert!(parts.source.calls_for(P2).await.is_empty());
    assert_eq!(parts.status.beats().len(), 1);
    assert_eq!(ingest.state(), &LoopState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn run_sleeps_between_rotations_until_stopped() {
    let (app, parts) = Rig::new()
        .tune(|b| b.instruments([P1]).rotation_interval(Duration::from_secs(20)))
        .build();
    // two rotations: start + P1 each
    parts.control.off_after(LOOP, 4);
    let started = tokio::time::Instant::now();

    app.ingestion_loop().run().await.unwrap();

    assert_eq!(parts.status.beats().len(), 2);
    assert!(started.elapsed() >= Duration::from_secs(40));
}

#[tokio::test(start_paused = true)]
async fn missing_instrument_list_is_fatal() {
    let (app, parts) = Rig::new()
        .tune(|b| b.with_instruments(Arc::new(MissingInstruments)))
        .build();

    let err = app.ingestion_loop().run_once().await.unwrap_err();
    assert!(err.is_fatal());

    let err = app.ingestion_loop().run().await.unwrap_err();
    assert!(err.is_fatal());
    assert!(parts.source.calls().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn no_instrument_source_is_fatal() {
    let (app, _parts) = Rig::new().build();
    let err = app.ingestion_loop().run_once().await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test(start_paused = true)]
async fn failed_save_is_reported_per_instrument() {
    let (app, parts) = Rig::new().tune(|b| b.instruments([P1])).build();
    parts
        .source
        .set_series(P1, series_ending_at(P1, bar_now(), 250, Interval::Minute))
        .await;
    parts.repo.fail_saves(Some("disk full"));

    let report = app.ingestion_loop().run_once().await.unwrap();

    match outcome_of(&report, P1) {
        InstrumentOutcome::Failed { reason } => assert!(reason.contains("disk full")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(parts.repo.contents().is_empty());
    assert_eq!(parts.status.beats().len(), 1);
}

#[tokio::test]
async fn new_loop_starts_idle() {
    let (app, _parts) = Rig::new().tune(|b| b.instruments([P1])).build();
    assert_eq!(app.ingestion_loop().state(), &LoopState::Idle);
}
