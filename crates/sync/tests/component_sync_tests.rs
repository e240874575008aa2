// End-to-end component sync and archive-hash consistency checks.

mod common;

use common::{Harness, MODEL_VERSION, PARTY_MODEL_ID, identity};
use modelvault_metadata::ComponentFilter;
use modelvault_sync::{SyncComponent, SyncError};

fn sync_component(harness: &Harness, host: &str, component: &str) -> SyncComponent {
    SyncComponent::new(
        PARTY_MODEL_ID,
        MODEL_VERSION,
        component,
        harness.store.clone(),
        harness.objects.clone(),
        &harness.config_for_host(host),
    )
    .unwrap()
}

#[tokio::test]
async fn upload_then_download_on_other_host() {
    let harness = Harness::new().await;
    harness.seed_component_rows("trainer", &["lr", "lr_validate"]).await;
    harness.write_component_files("host-a", "trainer", &["lr", "lr_validate"]);

    let component_a = sync_component(&harness, "host-a", "trainer");
    assert!(component_a.get_archive_hash().await.unwrap().is_none());
    assert!(!component_a.remote_exists().await.unwrap());

    let hash = component_a.upload().await.unwrap();
    assert!(component_a.remote_exists().await.unwrap());
    assert_eq!(component_a.get_archive_hash().await.unwrap(), Some(hash));

    let component_b = sync_component(&harness, "host-b", "trainer");
    assert!(!component_b.local_exists().await.unwrap());

    let downloaded = component_b.download().await.unwrap();
    assert_eq!(downloaded, hash);
    assert!(component_b.local_exists().await.unwrap());
    assert!(
        harness
            .cache_for_host("host-b")
            .checkpoint_path()
            .join("trainer")
            .join("epoch_5")
            .is_file()
    );
}

#[tokio::test]
async fn upload_without_metadata_rows_is_not_found() {
    let harness = Harness::new().await;
    harness.write_component_files("host-a", "trainer", &["lr"]);

    let component = sync_component(&harness, "host-a", "trainer");
    match component.upload().await {
        Err(SyncError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
    // The inconsistency was caught before any bytes moved.
    assert!(!component.remote_exists().await.unwrap());
}

#[tokio::test]
async fn download_before_any_upload_is_not_found() {
    let harness = Harness::new().await;
    harness.seed_component_rows("trainer", &["lr"]).await;

    let component = sync_component(&harness, "host-b", "trainer");
    match component.download().await {
        Err(SyncError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn divergent_archive_records_are_inconsistent() {
    let harness = Harness::new().await;
    harness.seed_component_rows("trainer", &["lr", "lr_validate"]).await;

    // Diverge the two alias rows behind the orchestrator's back.
    let base = ComponentFilter::new(identity()).with_component("trainer");
    harness
        .store
        .update_component_archive(&base.clone().with_alias("lr"), &"a".repeat(64), "host-a")
        .await
        .unwrap();
    harness
        .store
        .update_component_archive(
            &base.with_alias("lr_validate"),
            &"b".repeat(64),
            "host-b",
        )
        .await
        .unwrap();

    let component = sync_component(&harness, "host-a", "trainer");
    match component.get_archive_hash().await {
        Err(SyncError::Inconsistent(_)) => {}
        other => panic!("expected Inconsistent, got {other:?}"),
    }
    match component.upload().await {
        Err(SyncError::Inconsistent(_)) => {}
        other => panic!("expected Inconsistent, got {other:?}"),
    }
}

#[tokio::test]
async fn update_archive_hash_covers_all_aliases() {
    let harness = Harness::new().await;
    harness.seed_component_rows("trainer", &["lr", "lr_validate"]).await;
    harness.seed_component_rows("selector", &["binning"]).await;
    harness.write_component_files("host-a", "trainer", &["lr", "lr_validate"]);

    let component = sync_component(&harness, "host-a", "trainer");
    component.upload().await.unwrap();

    // Both trainer rows agree; the selector row is untouched.
    assert!(component.get_archive_hash().await.unwrap().is_some());
    let selector = sync_component(&harness, "host-a", "selector");
    assert!(selector.get_archive_hash().await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_uploads_serialize_on_the_sync_lock() {
    let harness = Harness::new().await;
    harness.seed_component_rows("trainer", &["lr"]).await;
    harness.write_component_files("host-a", "trainer", &["lr"]);

    let a = std::sync::Arc::new(sync_component(&harness, "host-a", "trainer"));
    let b = a.clone();
    let (first, second) = tokio::join!(
        tokio::spawn(async move { a.upload().await }),
        tokio::spawn(async move { b.upload().await }),
    );
    let first = first.unwrap().unwrap();
    let second = second.unwrap().unwrap();

    // Identical tree, so both racers converge on the same recorded hash.
    assert_eq!(first, second);
    let component = sync_component(&harness, "host-a", "trainer");
    assert_eq!(component.get_archive_hash().await.unwrap(), Some(first));
}
