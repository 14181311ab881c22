//! TrackingStore interface tests.
//!
//! These tests verify the contract of the TrackingStore trait.
//! Each storage implementation should run these tests.
//!
//! Package identifiers are randomized so the suite can run against a shared
//! database without cleanup between runs.

use futures::future::join_all;
use uuid::Uuid;

use sealtrack::model::{Actor, NewPackage, Party, SealStatus, Stage, UpdateDraft};
use sealtrack::storage::{StorageError, TrackingStore};

pub fn actor() -> Actor {
    Actor::new("mgr-1", "manager@example.com")
}

/// Unique package identifier with a readable prefix.
pub fn package_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

pub fn new_package(id: &str) -> NewPackage {
    NewPackage::new(
        id,
        Party::new("Alice", "1 Main St"),
        Party::new("Bob", "2 Oak St"),
    )
}

fn transition(stage: Stage, seal_status: SealStatus) -> UpdateDraft {
    UpdateDraft::transition(stage, seal_status, &actor())
}

// =============================================================================
// TrackingStore::create_package tests
// =============================================================================

pub async fn test_create_and_find<S: TrackingStore>(store: &S) {
    let id = package_id("create");

    let (package, genesis) = store
        .create_package(new_package(&id), "mgr-1", UpdateDraft::genesis(&actor()))
        .await
        .expect("create should succeed");

    assert_eq!(package.package_id, id);
    assert_eq!(package.current_stage, Stage::PackageCreated);
    assert_eq!(package.seal_status, SealStatus::Intact);
    assert_eq!(package.created_by, "mgr-1");
    assert_eq!(package.created_at, package.updated_at);
    assert!(genesis.is_genesis(), "first update should be genesis");
    assert_eq!(genesis.package_key, package.key);
    assert_eq!(genesis.notes, "Package created by manager@example.com");

    let found = store
        .find_package(&id)
        .await
        .expect("find should succeed")
        .expect("package should exist");
    assert_eq!(found, package, "stored package should round-trip");

    let updates = store
        .updates_for(package.key)
        .await
        .expect("updates_for should succeed");
    assert_eq!(updates, vec![genesis], "log should hold only genesis");
}

pub async fn test_create_duplicate_rejected<S: TrackingStore>(store: &S) {
    let id = package_id("duplicate");
    let (original, _) = store
        .create_package(new_package(&id), "mgr-1", UpdateDraft::genesis(&actor()))
        .await
        .expect("first create should succeed");

    let mut other = new_package(&id);
    other.sender = Party::new("Mallory", "9 Elm St");
    let result = store
        .create_package(other, "mgr-2", UpdateDraft::genesis(&actor()))
        .await;

    assert!(
        matches!(result, Err(StorageError::DuplicatePackage(ref dup)) if *dup == id),
        "expected DuplicatePackage, got {:?}",
        result
    );
    let found = store.find_package(&id).await.unwrap().unwrap();
    assert_eq!(found, original, "original should be untouched");
    assert_eq!(store.updates_for(original.key).await.unwrap().len(), 1);
}

pub async fn test_find_missing_package<S: TrackingStore>(store: &S) {
    let found = store
        .find_package(&package_id("missing"))
        .await
        .expect("find should succeed");
    assert!(found.is_none(), "unknown package should be None");
}

// =============================================================================
// TrackingStore::append_update tests
// =============================================================================

pub async fn test_append_patches_projection<S: TrackingStore>(store: &S) {
    let id = package_id("append");
    let (package, genesis) = store
        .create_package(new_package(&id), "mgr-1", UpdateDraft::genesis(&actor()))
        .await
        .unwrap();

    let (patched, update) = store
        .append_update(package.key, transition(Stage::Exception, SealStatus::Broken))
        .await
        .expect("append should succeed");

    assert_eq!(update.sequence, 1);
    assert_eq!(update.package_key, package.key);
    assert_eq!(update.notes, "Updated by manager@example.com");
    assert!(update.created_at >= genesis.created_at);
    assert_eq!(patched.current_stage, Stage::Exception);
    assert_eq!(patched.seal_status, SealStatus::Broken);
    assert_eq!(patched.updated_at, update.created_at);
    assert_eq!(patched.created_at, package.created_at);

    let found = store.find_package(&id).await.unwrap().unwrap();
    assert_eq!(found, patched, "stored projection should match returned one");
}

pub async fn test_append_unknown_package<S: TrackingStore>(store: &S) {
    let key = Uuid::new_v4();

    let result = store
        .append_update(key, transition(Stage::Dispatched, SealStatus::Intact))
        .await;

    assert!(
        matches!(result, Err(StorageError::MissingPackage(k)) if k == key),
        "expected MissingPackage, got {:?}",
        result
    );
    assert!(store.updates_for(key).await.unwrap().is_empty());
}

pub async fn test_updates_for_ordered<S: TrackingStore>(store: &S) {
    let id = package_id("ordered");
    let (package, _) = store
        .create_package(new_package(&id), "mgr-1", UpdateDraft::genesis(&actor()))
        .await
        .unwrap();

    let stages = [
        Stage::Dispatched,
        Stage::InTransit,
        Stage::OutForDelivery,
        Stage::Delivered,
    ];
    for stage in stages {
        store
            .append_update(package.key, transition(stage, SealStatus::Intact))
            .await
            .unwrap();
    }

    let updates = store.updates_for(package.key).await.unwrap();
    assert_eq!(updates.len(), stages.len() + 1);
    for (i, update) in updates.iter().enumerate() {
        assert_eq!(update.sequence as usize, i, "sequence should follow log order");
    }
    assert!(
        updates
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at),
        "created_at should be non-decreasing"
    );
    assert_eq!(updates[0].stage, Stage::PackageCreated);
    assert_eq!(updates[updates.len() - 1].stage, Stage::Delivered);
}

pub async fn test_identical_appends_both_recorded<S: TrackingStore>(store: &S) {
    let id = package_id("journal");
    let (package, _) = store
        .create_package(new_package(&id), "mgr-1", UpdateDraft::genesis(&actor()))
        .await
        .unwrap();

    for _ in 0..2 {
        store
            .append_update(package.key, transition(Stage::Dispatched, SealStatus::Intact))
            .await
            .unwrap();
    }

    assert_eq!(store.updates_for(package.key).await.unwrap().len(), 3);
}

pub async fn test_concurrent_appends_all_recorded<S: TrackingStore>(store: &S) {
    let id = package_id("concurrent");
    let (package, _) = store
        .create_package(new_package(&id), "mgr-1", UpdateDraft::genesis(&actor()))
        .await
        .unwrap();

    let results = join_all((0..5).map(|_| {
        store.append_update(package.key, transition(Stage::InTransit, SealStatus::Intact))
    }))
    .await;

    for result in &results {
        assert!(result.is_ok(), "every append should succeed: {:?}", result);
    }

    let updates = store.updates_for(package.key).await.unwrap();
    assert_eq!(updates.len(), 6);
    let mut sequences: Vec<u32> = updates.iter().map(|u| u.sequence).collect();
    sequences.sort_unstable();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4, 5], "sequences should be distinct");

    let found = store.find_package(&id).await.unwrap().unwrap();
    let last = updates.last().unwrap();
    assert_eq!(found.current_stage, last.stage);
    assert_eq!(found.updated_at, last.created_at);
}

// =============================================================================
// Listing tests
// =============================================================================

pub async fn test_list_packages_newest_first<S: TrackingStore>(store: &S) {
    let first = package_id("list");
    let second = package_id("list");
    for id in [&first, &second] {
        store
            .create_package(new_package(id), "mgr-1", UpdateDraft::genesis(&actor()))
            .await
            .unwrap();
    }

    let packages = store.list_packages().await.expect("list should succeed");

    assert!(packages.iter().any(|p| p.package_id == first));
    assert!(packages.iter().any(|p| p.package_id == second));
    assert!(
        packages
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at),
        "packages should be newest first"
    );
}

pub async fn test_recent_updates_newest_first<S: TrackingStore>(store: &S) {
    let id = package_id("recent");
    let (package, _) = store
        .create_package(new_package(&id), "mgr-1", UpdateDraft::genesis(&actor()))
        .await
        .unwrap();
    store
        .append_update(package.key, transition(Stage::Dispatched, SealStatus::Intact))
        .await
        .unwrap();
    let (_, last) = store
        .append_update(package.key, transition(Stage::InTransit, SealStatus::Replaced))
        .await
        .unwrap();

    let recent = store.recent_updates(2).await.expect("recent should succeed");

    assert_eq!(recent.len(), 2, "limit should be honored");
    assert_eq!(recent[0].package_id, id, "should join the tracking id");
    assert_eq!(recent[0].update, last);
    assert_eq!(recent[1].update.stage, Stage::Dispatched);
    assert!(recent[0].update.created_at >= recent[1].update.created_at);
}

pub async fn test_recent_updates_zero_limit<S: TrackingStore>(store: &S) {
    let recent = store.recent_updates(0).await.expect("recent should succeed");
    assert!(recent.is_empty());
}

/// Run all TrackingStore tests against a store implementation.
#[macro_export]
macro_rules! run_tracking_store_tests {
    ($store:expr) => {
        use $crate::storage::tracking_store_tests::*;

        // create tests
        test_create_and_find($store).await;
        println!("  test_create_and_find: PASSED");

        test_create_duplicate_rejected($store).await;
        println!("  test_create_duplicate_rejected: PASSED");

        test_find_missing_package($store).await;
        println!("  test_find_missing_package: PASSED");

        // append tests
        test_append_patches_projection($store).await;
        println!("  test_append_patches_projection: PASSED");

        test_append_unknown_package($store).await;
        println!("  test_append_unknown_package: PASSED");

        test_updates_for_ordered($store).await;
        println!("  test_updates_for_ordered: PASSED");

        test_identical_appends_both_recorded($store).await;
        println!("  test_identical_appends_both_recorded: PASSED");

        test_concurrent_appends_all_recorded($store).await;
        println!("  test_concurrent_appends_all_recorded: PASSED");

        // listing tests
        test_list_packages_newest_first($store).await;
        println!("  test_list_packages_newest_first: PASSED");

        test_recent_updates_newest_first($store).await;
        println!("  test_recent_updates_newest_first: PASSED");

        test_recent_updates_zero_limit($store).await;
        println!("  test_recent_updates_zero_limit: PASSED");
    };
}
