//! Integration tests for listing, optimistic mutations and rollback.

mod common;

use common::{controller, FakeApi, REPORT_KB};
use kbpick_core::{
    project, DeIndexRequest, ErrorKind, KbError, ResourceId, ResourceStatus,
    NIL_KNOWLEDGE_BASE_ID,
};
use uuid::Uuid;

fn papers() -> Option<ResourceId> {
    Some(ResourceId::new("d-papers"))
}

fn status_of(
    controller: &kbpick_core::ResourceController,
    key: &Option<ResourceId>,
    id: &str,
) -> Option<ResourceStatus> {
    controller
        .find(key, &ResourceId::new(id))
        .and_then(|r| r.status)
}

// ============================================================================
// Listings
// ============================================================================

#[tokio::test]
async fn test_load_fetches_once_then_serves_cache() {
    let api = FakeApi::with_sample_drive();
    let controller = controller(&api);

    let first = controller.load(&None).await.unwrap();
    let second = controller.load(&None).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(api.count("list:root"), 1);
    assert!(controller.is_loaded(&None));
}

#[tokio::test]
async fn test_listing_failure_leaves_cache_empty() {
    let api = FakeApi::with_sample_drive();
    *api.fail_listing.lock().unwrap() = true;
    let controller = controller(&api);

    let err = controller.load(&papers()).await.unwrap_err();

    assert!(matches!(err, KbError::ListingFailed { ref parent, .. } if parent == "d-papers"));
    assert_eq!(err.kind(), ErrorKind::Listing);
    assert!(err.is_retryable());
    assert!(!controller.is_loaded(&papers()));
}

#[tokio::test]
async fn test_cancelled_listing_does_not_populate_cache() {
    let api = FakeApi::with_sample_drive();
    let controller = controller(&api);
    let _gate = api.hold_next_listing();

    let (result, ()) = tokio::join!(controller.refresh(&None), async {
        tokio::task::yield_now().await;
        controller.cancel_listing(&None);
    });

    assert!(matches!(result, Err(KbError::Cancelled)));
    assert!(!controller.is_loaded(&None));
}

#[tokio::test]
async fn test_newer_refresh_supersedes_older() {
    let api = FakeApi::with_sample_drive();
    let controller = controller(&api);
    let _gate = api.hold_next_listing();

    let (older, newer) = tokio::join!(controller.refresh(&None), async {
        tokio::task::yield_now().await;
        controller.refresh(&None).await
    });

    assert!(matches!(older, Err(KbError::Cancelled)));
    assert_eq!(newer.unwrap().len(), 2);
    assert!(controller.is_loaded(&None));
    assert_eq!(api.count("list:root"), 2);
}

#[tokio::test]
async fn test_mutation_cancels_in_flight_refetch() {
    let api = FakeApi::with_sample_drive();
    let controller = controller(&api);
    controller.load(&None).await.unwrap();
    let _gate = api.hold_next_listing();

    let (refetch, indexed) = tokio::join!(controller.refresh(&None), async {
        tokio::task::yield_now().await;
        controller.index(&None, &ResourceId::new("f-notes")).await
    });

    assert!(matches!(refetch, Err(KbError::Cancelled)));
    assert!(indexed.is_ok());
    assert_eq!(
        status_of(&controller, &None, "f-notes"),
        Some(ResourceStatus::Indexed)
    );
}

// ============================================================================
// Index
// ============================================================================

#[tokio::test]
async fn test_index_then_de_index_round_trip() {
    let api = FakeApi::with_sample_drive();
    let controller = controller(&api);
    let key = papers();
    let draft = ResourceId::new("f-draft");
    controller.load(&key).await.unwrap();
    api.clear_calls();

    let kb = controller.index(&key, &draft).await.unwrap();

    let calls = api.calls();
    assert_eq!(calls[0], "create:f-draft");
    assert_eq!(calls[1], "org");
    assert_eq!(calls[2], format!("sync:{}:org-1", kb));

    let listing = controller.listing(&key).unwrap();
    assert!(project(&listing, "").is_indexed(&draft));
    let resource = controller.find(&key, &draft).unwrap();
    assert_eq!(resource.knowledge_base_id, Some(kb));
    assert!(!controller.is_pending(&draft));

    let request = DeIndexRequest::for_resource(&resource);
    controller.de_index(&key, &request).await.unwrap();

    let listing = controller.listing(&key).unwrap();
    assert!(!project(&listing, "").is_indexed(&draft));
    assert_eq!(
        status_of(&controller, &key, "f-draft"),
        Some(ResourceStatus::DeIndexed)
    );
    assert_eq!(api.count("delete:"), 1);
}

#[tokio::test]
async fn test_index_failure_restores_snapshot() {
    let api = FakeApi::with_sample_drive();
    api.fail_create_for.lock().unwrap().insert("f-draft".into());
    let controller = controller(&api);
    let key = papers();
    let before = controller.load(&key).await.unwrap();

    let err = controller
        .index(&key, &ResourceId::new("f-draft"))
        .await
        .unwrap_err();

    assert!(matches!(err, KbError::IndexFailed { ref resource_id, .. } if resource_id == "f-draft"));
    assert_eq!(err.kind(), ErrorKind::Mutation);
    assert_eq!(controller.listing(&key).unwrap(), before);
    assert!(controller.pending().is_empty());
    assert_eq!(api.count("sync:"), 0);
}

#[tokio::test]
async fn test_sync_failure_names_orphaned_knowledge_base() {
    let api = FakeApi::with_sample_drive();
    *api.fail_sync.lock().unwrap() = true;
    let controller = controller(&api);
    let before = controller.load(&None).await.unwrap();

    let err = controller
        .index(&None, &ResourceId::new("f-notes"))
        .await
        .unwrap_err();

    let created = api
        .calls()
        .iter()
        .find_map(|c| c.strip_prefix("sync:").map(|rest| rest.to_string()))
        .unwrap();
    match err {
        KbError::SyncTriggerFailed {
            resource_id,
            knowledge_base_id,
            ..
        } => {
            assert_eq!(resource_id, "f-notes");
            assert!(created.starts_with(&knowledge_base_id));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(controller.listing(&None).unwrap(), before);
}

#[tokio::test]
async fn test_index_preconditions_skip_network() {
    let api = FakeApi::with_sample_drive();
    let controller = controller(&api);
    let key = papers();
    controller.load(&key).await.unwrap();
    api.clear_calls();

    let missing = controller.index(&key, &ResourceId::new("nope")).await;
    assert!(matches!(missing, Err(KbError::ResourceNotFound(_))));

    let indexed = controller.index(&key, &ResourceId::new("f-report")).await;
    assert!(matches!(indexed, Err(KbError::AlreadyIndexed(_))));

    assert!(api.calls().is_empty());
    assert!(controller.pending().is_empty());
}

#[tokio::test]
async fn test_overlapping_mutation_is_rejected() {
    let api = FakeApi::with_sample_drive();
    let controller = controller(&api);
    let notes = ResourceId::new("f-notes");
    controller.load(&None).await.unwrap();
    let gate = api.hold_create();

    let (first, (second, seen_status, seen_pending)) =
        tokio::join!(controller.index(&None, &notes), async {
            tokio::task::yield_now().await;
            let status = status_of(&controller, &None, "f-notes");
            let pending = controller.pending();
            let second = controller.index(&None, &notes).await;
            gate.notify_one();
            (second, status, pending)
        });

    assert_eq!(seen_status, Some(ResourceStatus::Indexing));
    assert_eq!(seen_pending, vec![notes.clone()]);
    assert!(matches!(second, Err(KbError::MutationInProgress { .. })));
    assert!(first.is_ok());
    assert_eq!(api.count("create:"), 1);
    assert!(!controller.is_pending(&notes));
}

#[tokio::test]
async fn test_failed_index_keeps_sibling_commit() {
    let api = FakeApi::with_sample_drive();
    api.fail_create_for.lock().unwrap().insert("f-draft".into());
    let controller = controller(&api);
    let key = papers();
    controller.load(&key).await.unwrap();
    let gate = api.hold_create();

    // Creation is released in arrival order: d-2024 commits, then f-draft
    // fails and rolls back.
    let folder_id = ResourceId::new("d-2024");
    let draft_id = ResourceId::new("f-draft");
    let (folder, draft, ()) = tokio::join!(
        controller.index(&key, &folder_id),
        controller.index(&key, &draft_id),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
            tokio::task::yield_now().await;
            gate.notify_one();
        }
    );

    let kb = folder.unwrap();
    assert!(matches!(draft, Err(KbError::IndexFailed { .. })));

    let committed = controller.find(&key, &ResourceId::new("d-2024")).unwrap();
    assert_eq!(committed.status, Some(ResourceStatus::Indexed));
    assert_eq!(committed.knowledge_base_id, Some(kb));
    assert_eq!(status_of(&controller, &key, "f-draft"), None);
    assert!(controller.pending().is_empty());
}

// ============================================================================
// De-index & remove
// ============================================================================

#[tokio::test]
async fn test_de_index_without_knowledge_base_makes_no_call() {
    let api = FakeApi::with_sample_drive();
    let controller = controller(&api);
    let key = papers();
    controller.load(&key).await.unwrap();
    api.clear_calls();

    for knowledge_base_id in [None, Some(NIL_KNOWLEDGE_BASE_ID)] {
        let request = DeIndexRequest {
            knowledge_base_id,
            resource_path: "papers/draft.md".into(),
            resource_id: ResourceId::new("f-draft"),
        };
        let err = controller.de_index(&key, &request).await.unwrap_err();
        assert!(matches!(err, KbError::NotIndexed { .. }));
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    assert_eq!(api.count("delete:"), 0);
    assert_eq!(status_of(&controller, &key, "f-draft"), None);
}

#[tokio::test]
async fn test_de_index_failure_restores_snapshot() {
    let api = FakeApi::with_sample_drive();
    *api.fail_delete.lock().unwrap() = true;
    let controller = controller(&api);
    let key = papers();
    let before = controller.load(&key).await.unwrap();
    let report = controller.find(&key, &ResourceId::new("f-report")).unwrap();

    let err = controller
        .de_index(&key, &DeIndexRequest::for_resource(&report))
        .await
        .unwrap_err();

    assert!(matches!(err, KbError::DeIndexFailed { .. }));
    assert_eq!(controller.listing(&key).unwrap(), before);
    assert_eq!(
        status_of(&controller, &key, "f-report"),
        Some(ResourceStatus::Indexed)
    );
}

#[tokio::test]
async fn test_de_index_targets_knowledge_base_and_path() {
    let api = FakeApi::with_sample_drive();
    let controller = controller(&api);
    let key = papers();
    controller.load(&key).await.unwrap();
    let report = controller.find(&key, &ResourceId::new("f-report")).unwrap();

    controller
        .de_index(&key, &DeIndexRequest::for_resource(&report))
        .await
        .unwrap();

    let kb = Uuid::parse_str(REPORT_KB).unwrap();
    assert!(api
        .calls()
        .contains(&format!("delete:{}:papers/report.pdf", kb)));
    // The knowledge base id stays on the entry.
    let after = controller.find(&key, &report.resource_id).unwrap();
    assert_eq!(after.knowledge_base_id, Some(kb));
}

#[tokio::test]
async fn test_remove_invalidates_listing() {
    let api = FakeApi::with_sample_drive();
    let controller = controller(&api);
    let key = papers();
    controller.load(&key).await.unwrap();
    let report = controller.find(&key, &ResourceId::new("f-report")).unwrap();

    controller
        .remove(&key, &DeIndexRequest::for_resource(&report))
        .await
        .unwrap();

    assert!(!controller.is_loaded(&key));
    controller.load(&key).await.unwrap();
    assert_eq!(api.count("list:d-papers"), 2);
}

#[tokio::test]
async fn test_failed_remove_keeps_listing() {
    let api = FakeApi::with_sample_drive();
    *api.fail_delete.lock().unwrap() = true;
    let controller = controller(&api);
    let key = papers();
    let before = controller.load(&key).await.unwrap();
    let report = controller.find(&key, &ResourceId::new("f-report")).unwrap();

    let result = controller
        .remove(&key, &DeIndexRequest::for_resource(&report))
        .await;

    assert!(result.is_err());
    assert_eq!(controller.listing(&key).unwrap(), before);
}
