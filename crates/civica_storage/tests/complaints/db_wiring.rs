#![forbid(unsafe_code)]

use civica_engines::assembler::ComplaintAssembler;
use civica_kernel_contracts::complaint::{
    CategoryTag, ComplaintDraft, ComplaintId, ComplaintRecord, ComplaintStatus, IntakeMethod,
    PriorityTier,
};
use civica_kernel_contracts::UnixTimeMs;
use civica_storage::{ComplaintSearchQuery, ComplaintStore, StorageError};

fn record(text: &str, location: Option<&str>, at: u64) -> ComplaintRecord {
    let draft = ComplaintDraft::v1(
        text,
        None,
        location.map(|v| v.to_string()),
        "en",
        IntakeMethod::Manual,
    )
    .unwrap();
    ComplaintAssembler::mvp_v1()
        .assemble(&draft, UnixTimeMs(at))
        .unwrap()
}

#[test]
fn db_wiring_01_insert_and_get_round_trip() {
    let mut store = ComplaintStore::new();
    let complaint = record("garbage pile on the corner", Some("ward 2"), 1_000);
    let id = complaint.id.clone();

    store.insert(complaint).unwrap();
    let fetched = store.get(&id).unwrap();
    assert_eq!(fetched.location, "ward 2");
    assert_eq!(fetched.status, ComplaintStatus::Submitted);
}

#[test]
fn db_wiring_02_duplicate_id_is_refused() {
    let mut store = ComplaintStore::new();
    let complaint = record("water leak", None, 1_000);
    store.insert(complaint.clone()).unwrap();

    match store.insert(complaint) {
        Err(StorageError::DuplicateKey { table, .. }) => assert_eq!(table, "complaints"),
        other => panic!("expected duplicate-key refusal, got {other:?}"),
    }
    assert_eq!(store.len(), 1);
}

#[test]
fn db_wiring_03_status_is_the_only_mutable_column() {
    let mut store = ComplaintStore::new();
    let complaint = record("power outage in sector 9", None, 1_000);
    let id = complaint.id.clone();
    let before = complaint.clone();
    store.insert(complaint).unwrap();

    let outcome = store.update_status(&id, ComplaintStatus::InProgress).unwrap();
    assert_eq!(outcome.previous, ComplaintStatus::Submitted);
    assert_eq!(outcome.record.status, ComplaintStatus::InProgress);
    assert_eq!(outcome.record.original_text, before.original_text);
    assert_eq!(outcome.record.submitted_at, before.submitted_at);
    assert_eq!(outcome.record.analysis, before.analysis);
}

#[test]
fn db_wiring_04_unknown_id_status_update_is_not_found() {
    let mut store = ComplaintStore::new();
    let ghost = ComplaintId::new("CMP-GHOST-00000").unwrap();
    match store.update_status(&ghost, ComplaintStatus::Resolved) {
        Err(StorageError::NotFound { table, .. }) => assert_eq!(table, "complaints"),
        other => panic!("expected not-found refusal, got {other:?}"),
    }
}

#[test]
fn db_wiring_05_search_filters_combine_with_and() {
    let mut store = ComplaintStore::new();
    store
        .insert(record("water leak flooding the street", Some("ward 1"), 1_000))
        .unwrap();
    store
        .insert(record("water pipe burst", Some("ward 2"), 2_000))
        .unwrap();
    store
        .insert(record("garbage everywhere", Some("ward 1"), 3_000))
        .unwrap();

    let query = ComplaintSearchQuery {
        category: Some(CategoryTag::WaterSupply),
        location: Some("ward 1".to_string()),
        ..Default::default()
    };
    let results = store.search(&query);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].location, "ward 1");
    assert_eq!(results[0].category, CategoryTag::WaterSupply);
}

#[test]
fn db_wiring_06_search_orders_newest_first() {
    let mut store = ComplaintStore::new();
    store.insert(record("water leak", None, 1_000)).unwrap();
    store.insert(record("water outage", None, 3_000)).unwrap();
    store.insert(record("water pressure low", None, 2_000)).unwrap();

    let results = store.search(&ComplaintSearchQuery::default());
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].submitted_at, UnixTimeMs(3_000));
    assert_eq!(results[1].submitted_at, UnixTimeMs(2_000));
    assert_eq!(results[2].submitted_at, UnixTimeMs(1_000));
}

#[test]
fn db_wiring_07_search_term_scans_both_texts_case_insensitively() {
    let mut store = ComplaintStore::new();
    store
        .insert(record("Streetlight flickers at night", None, 1_000))
        .unwrap();
    let mut with_translation = record("pani ki samasya", None, 2_000);
    with_translation.translated_text = Some("Water problem in the colony".to_string());
    store.insert(with_translation).unwrap();

    let query = ComplaintSearchQuery {
        term: Some("WATER".to_string()),
        ..Default::default()
    };
    let results = store.search(&query);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].submitted_at, UnixTimeMs(2_000));
}

#[test]
fn db_wiring_08_stats_count_statuses_and_groupings() {
    let mut store = ComplaintStore::new();
    let first = record("water leak", None, 1_000);
    let second = record("garbage dump", None, 2_000);
    let third = record("water outage", None, 3_000);
    let second_id = second.id.clone();
    let third_id = third.id.clone();
    store.insert(first).unwrap();
    store.insert(second).unwrap();
    store.insert(third).unwrap();
    store
        .update_status(&second_id, ComplaintStatus::Pending)
        .unwrap();
    store
        .update_status(&third_id, ComplaintStatus::Resolved)
        .unwrap();

    let stats = store.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.resolved, 1);
    assert_eq!(stats.by_category.get(&CategoryTag::WaterSupply), Some(&2));
    assert_eq!(stats.by_category.get(&CategoryTag::Sanitation), Some(&1));
    assert!(stats.by_priority.values().sum::<u64>() == 3);
}

#[test]
fn db_wiring_09_priority_filter_narrows_results() {
    let mut store = ComplaintStore::new();
    store
        .insert(record("dangerous accident on the highway", None, 1_000))
        .unwrap();
    store.insert(record("minor routine repair", None, 2_000)).unwrap();

    let query = ComplaintSearchQuery {
        priority: Some(PriorityTier::Urgent),
        ..Default::default()
    };
    let results = store.search(&query);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].priority, PriorityTier::Urgent);
}
