use std::sync::Arc;

use candlefill::{Candlefill, CandlefillConfig, IngestError};
use candlefill_mock::{MemoryRepository, ScriptedSource};

#[test]
fn source_is_required() {
    let err = Candlefill::builder()
        .with_repository(Arc::new(MemoryRepository::new()))
        .build()
        .unwrap_err();
    assert!(matches!(err, IngestError::Config(msg) if msg.contains("source")));
}

#[test]
fn repository_is_required() {
    let (source, _ctl) = ScriptedSource::new_with_controller("scripted");
    let err = Candlefill::builder().with_source(source).build().unwrap_err();
    assert!(matches!(err, IngestError::Config(msg) if msg.contains("repository")));
}

#[test]
fn invalid_config_is_rejected_before_wiring() {
    let mut cfg = CandlefillConfig::default();
    cfg.backfill.max_pages = 0;
    let err = Candlefill::builder().config(cfg).build().unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn setters_land_in_the_active_config() {
    let (source, _ctl) = ScriptedSource::new_with_controller("scripted");
    let app = Candlefill::builder()
        .with_source(source)
        .with_repository(Arc::new(MemoryRepository::new()))
        .interval(candlefill::Interval::Hour)
        .max_lookback(48)
        .max_page_size(24)
        .rate_limit_policy(candlefill::RateLimitPolicy::SkipPage)
        .build()
        .unwrap();

    let cfg = app.config();
    assert_eq!(cfg.ingest.interval, candlefill::Interval::Hour);
    assert_eq!(cfg.backfill.interval, candlefill::Interval::Hour);
    assert_eq!(cfg.ingest.max_lookback, 48);
    assert_eq!(cfg.ingest.max_page_size, 24);
    assert_eq!(
        cfg.backfill.rate_limit_policy,
        candlefill::RateLimitPolicy::SkipPage
    );
}

#[test]
fn ingest_page_size_above_the_source_cap_is_rejected() {
    let mut cfg = CandlefillConfig::default();
    cfg.source.max_page_size = 100;
    let (source, _ctl) = ScriptedSource::new_with_controller("scripted");
    let err = Candlefill::builder()
        .with_source(source)
        .with_repository(Arc::new(MemoryRepository::new()))
        .config(cfg)
        .max_page_size(200)
        .build()
        .unwrap_err();
    assert!(matches!(err, IngestError::Config(msg) if msg.contains("source.max_page_size")));
}

#[test]
fn pipelines_are_debug_printable() {
    let (source, _ctl) = ScriptedSource::new_with_controller("scripted");
    let app = Candlefill::builder()
        .with_source(source)
        .with_repository(Arc::new(MemoryRepository::new()))
        .with_ledger(Arc::new(candlefill_mock::MemoryLedger::default()))
        .build()
        .unwrap();

    let backfill = format!("{:?}", app.backfill().unwrap());
    assert!(backfill.starts_with("Backfill"));
    let ingest = format!("{:?}", app.ingestion_loop());
    assert!(ingest.starts_with("IngestionLoop") && ingest.contains("Idle"));
}
