// Define-meta migrations between the metadata store and the file snapshot,
// and metadata replication.

mod common;

use common::{Harness, identity};
use modelvault_core::{DefineMeta, ProtoIndex};
use modelvault_metadata::{ComponentFilter, IdentityPatch};
use modelvault_sync::{ComponentCatalog, SyncError};

fn catalog(harness: &Harness, host: &str) -> ComponentCatalog {
    ComponentCatalog::new(identity(), harness.store.clone(), &harness.config_for_host(host))
}

#[tokio::test]
async fn export_writes_snapshot_and_run_parameters() {
    let harness = Harness::new().await;
    harness.seed_component_rows("trainer", &["lr"]).await;
    harness.seed_component_rows("selector", &["binning"]).await;

    let catalog = catalog(&harness, "host-a");
    catalog.export_define_meta_to_file().await.unwrap();

    let cache = harness.cache_for_host("host-a");
    let meta = cache.read_define_meta().await.unwrap();
    assert_eq!(
        meta.component_names().collect::<Vec<_>>(),
        vec!["selector", "trainer"]
    );
    let parameters = cache.read_run_parameters().await.unwrap();
    assert_eq!(parameters["trainer"]["max_iter"], 100);

    // Re-export refuses to overwrite the snapshot.
    match catalog.export_define_meta_to_file().await {
        Err(SyncError::AlreadyExists(_)) => {}
        other => panic!("expected AlreadyExists, got {other:?}"),
    }
}

#[tokio::test]
async fn export_with_no_rows_is_not_found() {
    let harness = Harness::new().await;
    match catalog(&harness, "host-a").export_define_meta_to_file().await {
        Err(SyncError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn import_loads_snapshot_into_database() {
    let harness = Harness::new().await;
    let cache = harness.cache_for_host("host-a");

    let meta = DefineMeta::from_rows([(
        "trainer".to_string(),
        "HeteroLR".to_string(),
        "lr".to_string(),
        ProtoIndex::from([("param.pb".to_string(), "LRParam".to_string())]),
    )]);
    cache.write_define_meta(&meta).await.unwrap();
    cache
        .write_run_parameters("trainer", &serde_json::json!({"max_iter": 50}))
        .await
        .unwrap();

    let catalog = catalog(&harness, "host-a");
    catalog.import_define_meta_from_file().await.unwrap();

    let rows = harness
        .store
        .find_components(&ComponentFilter::new(identity()))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].component_module_name, "HeteroLR");
    assert_eq!(rows[0].run_parameters.0["max_iter"], 50);

    // Re-import refuses once rows exist.
    match catalog.import_define_meta_from_file().await {
        Err(SyncError::AlreadyExists(_)) => {}
        other => panic!("expected AlreadyExists, got {other:?}"),
    }
}

#[tokio::test]
async fn define_meta_prefers_database_over_snapshot() {
    let harness = Harness::new().await;
    let cache = harness.cache_for_host("host-a");

    let stale = DefineMeta::from_rows([(
        "old_component".to_string(),
        "OldModule".to_string(),
        "old".to_string(),
        ProtoIndex::new(),
    )]);
    cache.write_define_meta(&stale).await.unwrap();
    harness.seed_component_rows("trainer", &["lr"]).await;

    let meta = catalog(&harness, "host-a").get_define_meta().await.unwrap();
    assert_eq!(meta.component_names().collect::<Vec<_>>(), vec!["trainer"]);
}

#[tokio::test]
async fn replicate_forks_rows_for_new_version() {
    let harness = Harness::new().await;
    harness.seed_component_rows("trainer", &["lr", "lr_validate"]).await;

    let patch = IdentityPatch {
        model_version: Some("v2".to_string()),
        ..Default::default()
    };
    let catalog = catalog(&harness, "host-a");
    catalog
        .replicate_define_meta(&patch, &catalog.filter())
        .await
        .unwrap();

    let source = harness
        .store
        .find_components(&ComponentFilter::new(identity()))
        .await
        .unwrap();
    assert_eq!(source.len(), 2);

    let forked_identity =
        modelvault_core::ModelIdentity::new("guest", "9999", "model-a", "v2").unwrap();
    let forked = harness
        .store
        .find_components(&ComponentFilter::new(forked_identity))
        .await
        .unwrap();
    assert_eq!(forked.len(), 2);
    assert!(forked.iter().all(|row| row.model_version == "v2"));
}

#[tokio::test]
async fn replicate_with_no_matching_rows_is_not_found() {
    let harness = Harness::new().await;
    let catalog = catalog(&harness, "host-a");
    match catalog
        .replicate_define_meta(&IdentityPatch::default(), &catalog.filter())
        .await
    {
        Err(SyncError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
}
