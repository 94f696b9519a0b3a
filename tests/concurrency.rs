//! Purpose: Id allocation under concurrent and interleaved callers.
//! Exports: None (integration test module).
//! Role: Pin the listing-count hazards and show the counter/random strategies avoid them.
//! Invariants: The duplicate-id cases are deterministic (barrier-gated), not timing-based.

mod common;

use common::{GatedTable, SHEET, TestResult, draft, memory_store};
use sheetstore::api::{ErrorKind, IdStrategy, RecordStore, StoreConfig};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn concurrent_listing_count_adds_mint_the_same_id() -> TestResult<()> {
    let table = Arc::new(GatedTable::new(2));
    let store = Arc::new(RecordStore::new(
        table.clone(),
        StoreConfig::new(SHEET).with_id_strategy(IdStrategy::ListingCount),
    ));
    table.gate_next_reads(2);

    let handles: Vec<_> = ["Budi", "Siti"]
        .into_iter()
        .map(|first| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.add(draft(first, "Santoso")))
        })
        .collect();
    let mut ids = Vec::new();
    for handle in handles {
        let added = handle.join().map_err(|_| "add thread panicked")??;
        ids.push(added.id);
    }

    assert_eq!(ids, ["EMP0001", "EMP0001"]);
    let listed: Vec<String> = store.list()?.into_iter().map(|e| e.id).collect();
    assert_eq!(listed, ["EMP0001", "EMP0001"]);
    Ok(())
}

#[test]
fn listing_count_reissues_an_id_after_delete() -> TestResult<()> {
    let store = memory_store(IdStrategy::ListingCount);
    store.add(draft("Budi", "Santoso"))?;
    store.add(draft("Siti", "Rahman"))?;
    store.delete("EMP0001")?;
    let third = store.add(draft("Eko", "Wibowo"))?;

    assert_eq!(third.id, "EMP0002");
    let dupes = store.list()?.iter().filter(|e| e.id == "EMP0002").count();
    assert_eq!(dupes, 2);
    Ok(())
}

#[test]
fn counter_never_reissues_after_delete() -> TestResult<()> {
    let store = memory_store(IdStrategy::Counter);
    store.add(draft("Budi", "Santoso"))?;
    store.add(draft("Siti", "Rahman"))?;
    store.delete("EMP0002")?;
    let third = store.add(draft("Eko", "Wibowo"))?;
    assert_eq!(third.id, "EMP0003");

    let ids: Vec<String> = store.list()?.into_iter().map(|e| e.id).collect();
    assert_eq!(ids, ["EMP0001", "EMP0003"]);
    Ok(())
}

#[test]
fn counter_skips_past_ids_written_by_other_tools() -> TestResult<()> {
    let store = memory_store(IdStrategy::Counter);
    store.add(draft("Budi", "Santoso"))?;
    let foreign = draft("Siti", "Rahman").with_id("EMP0040");
    store.update("EMP0001", &foreign)?;
    assert_eq!(store.add(draft("Eko", "Wibowo"))?.id, "EMP0041");
    Ok(())
}

#[test]
fn counter_refuses_to_run_past_the_largest_id() -> TestResult<()> {
    let store = memory_store(IdStrategy::Counter);
    store.add(draft("Budi", "Santoso"))?;
    let huge = draft("Siti", "Rahman").with_id("EMP18446744073709551615");
    store.update("EMP0001", &huge)?;

    let err = store.add(draft("Eko", "Wibowo")).expect_err("sequence exhausted");
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(err.record_id(), Some("EMP18446744073709551615"));
    assert_eq!(store.list()?.len(), 1);
    Ok(())
}

#[test]
fn counter_issues_the_last_id_then_stops_cleanly() -> TestResult<()> {
    let store = memory_store(IdStrategy::Counter);
    store.add(draft("Budi", "Santoso"))?;
    let near_top = draft("Siti", "Rahman").with_id("EMP9223372036854775806");
    store.update("EMP0001", &near_top)?;

    assert_eq!(store.add(draft("Eko", "Wibowo"))?.id, "EMP9223372036854775807");
    let err = store.add(draft("Dewi", "Kusuma")).expect_err("sequence exhausted");
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(err.record_id(), Some("EMP9223372036854775807"));
    assert!(!err.message().unwrap_or_default().contains('-'));

    let ids: Vec<String> = store.list()?.into_iter().map(|e| e.id).collect();
    assert_eq!(ids, ["EMP9223372036854775806", "EMP9223372036854775807"]);
    Ok(())
}

fn concurrent_ids(strategy: IdStrategy, threads: usize, per_thread: usize) -> TestResult<Vec<String>> {
    let store = Arc::new(memory_store(strategy));
    let handles: Vec<_> = (0..threads)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..per_thread)
                    .map(|n| {
                        store
                            .add(draft(&format!("W{worker}"), &format!("N{n}")))
                            .map(|e| e.id)
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.extend(handle.join().map_err(|_| "add thread panicked")??);
    }
    let listed: Vec<String> = store.list()?.into_iter().map(|e| e.id).collect();
    assert_eq!(listed.len(), threads * per_thread);
    Ok(ids)
}

#[test]
fn concurrent_counter_adds_are_unique() -> TestResult<()> {
    let ids = concurrent_ids(IdStrategy::Counter, 8, 6)?;
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), 48);
    let mut numbers: Vec<u32> = ids
        .iter()
        .map(|id| id.trim_start_matches("EMP").parse())
        .collect::<Result<_, _>>()?;
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=48).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn concurrent_random_adds_are_unique() -> TestResult<()> {
    let ids = concurrent_ids(IdStrategy::Random, 8, 6)?;
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), 48);
    assert!(ids.iter().all(|id| id.starts_with("EMP-")));
    Ok(())
}
