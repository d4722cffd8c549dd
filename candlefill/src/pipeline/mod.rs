/// Bulk history walk with a resume ledger.
pub mod backfill;
/// Steady-state gap-filling loop.
pub mod ingest_loop;
