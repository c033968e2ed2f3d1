//! End-to-end tests driving the controller through storage events against
//! the in-memory gateways.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use silo_core::config::Config;
use silo_core::paths::StorePath;
use silo_core::storage::{MemoryStore, ObjectStore};
use silo_import::admin::{AdminOp, MemoryTableAdmin, TableAdmin};
use silo_import::controller::RetryPolicy;
use silo_import::job::{JobLauncher, MemoryJobLauncher};
use silo_import::notify::{MemoryPublisher, Publisher};
use silo_import::{Error, ImportController, Outcome, StorageEvent};

const BUCKET: &str = "store-bucket";

struct Harness {
    store: Arc<MemoryStore>,
    admin: Arc<MemoryTableAdmin>,
    launcher: Arc<MemoryJobLauncher>,
    publisher: Arc<MemoryPublisher>,
    controller: ImportController,
}

fn harness(nodes: u32) -> Harness {
    let config = Config {
        project_id: "test-project".into(),
        instance: "test-instance".into(),
        cluster: "test-cluster".into(),
        nodes_high: 9,
        nodes_low: 3,
        job_template: "gs://templates/csv_import.json".into(),
        data_path: format!("gs://{BUCKET}/imports/cache"),
        control_path: format!("gs://{BUCKET}/imports/control"),
        trigger_topic: "projects/test-project/topics/imports".into(),
    };
    let store = Arc::new(MemoryStore::new());
    let admin = Arc::new(MemoryTableAdmin::with_nodes(nodes));
    let launcher = Arc::new(MemoryJobLauncher::new());
    let publisher = Arc::new(MemoryPublisher::new());
    let controller = ImportController::new(
        Arc::clone(&store) as Arc<dyn ObjectStore>,
        Arc::clone(&admin) as Arc<dyn TableAdmin>,
        Arc::clone(&launcher) as Arc<dyn JobLauncher>,
        Arc::clone(&publisher) as Arc<dyn Publisher>,
        config,
    )
    .expect("config should parse")
    .with_retry_policy(RetryPolicy {
        create_table_attempts: 3,
        create_table_backoff: Duration::ZERO,
        gateway_deadline: Duration::from_secs(5),
    });
    Harness {
        store,
        admin,
        launcher,
        publisher,
        controller,
    }
}

async fn seed(store: &MemoryStore, object: &str, body: &str) {
    store
        .write(&StorePath::new(BUCKET, object), Bytes::from(body.to_string()))
        .await
        .expect("seed write");
}

#[tokio::test]
async fn full_lifecycle_from_init_to_scale_down() {
    let h = harness(3);
    let table = "branch_2021_01_01";

    // Init: create table + family, scale up, launch, write marker.
    let outcome = h
        .controller
        .handle_event(&StorageEvent::new(
            BUCKET,
            format!("imports/control/{table}/init.txt"),
        ))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Launched { table_id: table.into() });

    assert_eq!(
        h.admin.operations(),
        vec![
            AdminOp::CreateTable {
                instance: "test-instance".into(),
                table_id: table.into(),
            },
            AdminOp::CreateColumnFamily {
                instance: "test-instance".into(),
                table_id: table.into(),
                family: "csv".into(),
            },
            AdminOp::SetNodeCount {
                instance: "test-instance".into(),
                cluster: "test-cluster".into(),
                nodes: 9,
            },
        ]
    );
    let launches = h.launcher.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].job_name, table);
    assert!(h
        .store
        .exists(&StorePath::new(
            BUCKET,
            format!("imports/control/{table}/launched.txt"),
        ))
        .await
        .unwrap());

    // The batch job writes completed.txt; its event scales the cluster down.
    let outcome = h
        .controller
        .handle_event(&StorageEvent::new(
            BUCKET,
            format!("imports/control/{table}/completed.txt"),
        ))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::ScaledDown { table_id: table.into() });
    assert_eq!(h.admin.node_count("test-instance", "test-cluster").await.unwrap(), 3);

    // A redelivered completed event finds the cluster at low water.
    let outcome = h
        .controller
        .handle_event(&StorageEvent::new(
            BUCKET,
            format!("imports/control/{table}/completed.txt"),
        ))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::ScaleDownSkipped {
            table_id: table.into(),
            nodes: 3,
        }
    );
}

#[tokio::test]
async fn redelivered_init_is_rejected_without_side_effects() {
    let h = harness(3);
    let event = StorageEvent::new(BUCKET, "imports/control/t1/init.txt");

    h.controller.handle_event(&event).await.unwrap();
    let ops = h.admin.operations().len();

    let err = h.controller.handle_event(&event).await.expect_err("guard");
    assert!(matches!(err, Error::AlreadyLaunched { .. }));
    assert_eq!(h.admin.operations().len(), ops);
    assert_eq!(h.launcher.launches().len(), 1);
}

#[tokio::test]
async fn rollback_leaves_no_table_behind_on_launch_failure() {
    let h = harness(3);
    h.launcher.fail_launches();

    let err = h
        .controller
        .handle_event(&StorageEvent::new(BUCKET, "imports/control/t1/init.txt"))
        .await
        .expect_err("launch fails");
    assert!(matches!(err, Error::Launch { .. }));

    assert_eq!(
        h.admin.operations().last(),
        Some(&AdminOp::DeleteTable {
            instance: "test-instance".into(),
            table_id: "t1".into(),
        })
    );
}

#[tokio::test]
async fn trigger_builds_writes_and_publishes_the_manifest() {
    let h = harness(3);
    seed(
        &h.store,
        "demo/data/source1/provenance.json",
        r#"{"name":"Source One","url":"https://one.example/"}"#,
    )
    .await;
    seed(&h.store, "demo/data/source1/schema.mcf", "").await;
    seed(&h.store, "demo/data/source1/smokepm/data.tmcf", "").await;
    seed(&h.store, "demo/data/source1/smokepm/output.csv", "").await;

    let outcome = h
        .controller
        .handle_event(&StorageEvent::new(BUCKET, "demo/internal/control/trigger.txt"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::ManifestPublished {
            import_name: "smokepm".into()
        }
    );

    let written = h
        .store
        .read(&StorePath::new(BUCKET, "demo/internal/config/config.textproto"))
        .await
        .unwrap();
    let text = String::from_utf8(written.to_vec()).unwrap();
    assert!(text.contains("name: \"smokepm\""));
    assert!(text.contains(
        "mapping_path: \"/bigstore/store-bucket/demo/data/source1/smokepm/data.tmcf\""
    ));
    assert!(text.contains("name: \"Source One\""));
    assert!(text.contains("url: \"https://one.example/\""));
    assert!(text.contains("category: SCHEMA"));
    assert!(text.contains("name: \"demo\""));

    let published = h.publisher.published();
    assert_eq!(published.len(), 1);
    let (topic, attributes) = &published[0];
    assert_eq!(topic.to_string(), "projects/test-project/topics/imports");
    assert_eq!(attributes["import_name"], "smokepm");
    assert_eq!(
        attributes["manifest_path"],
        "/bigstore/store-bucket/demo/internal/config/config.textproto"
    );
    assert_eq!(attributes["data_directory"], "/bigstore/store-bucket/demo/data");
}

#[tokio::test]
async fn misplaced_trigger_is_a_fatal_path_error() {
    let h = harness(3);
    let err = h
        .controller
        .handle_event(&StorageEvent::new(BUCKET, "demo/control/trigger.txt"))
        .await
        .expect_err("should fail");
    assert!(matches!(err, Error::TriggerOutsideImportRoot { .. }));
    assert!(h.publisher.published().is_empty());
}

#[tokio::test]
async fn trigger_over_an_empty_root_is_an_error() {
    let h = harness(3);
    let err = h
        .controller
        .handle_event(&StorageEvent::new(BUCKET, "demo/internal/control/trigger.txt"))
        .await
        .expect_err("should fail");
    assert!(matches!(err, Error::EmptyManifest { .. }));
    assert!(h.publisher.published().is_empty());
}

#[tokio::test]
async fn mixed_representation_data_aborts_the_trigger() {
    let h = harness(3);
    seed(&h.store, "demo/data/source1/smokepm/output.csv", "").await;
    seed(&h.store, "demo/data/source1/smokepm/nodes.mcf", "").await;

    let err = h
        .controller
        .handle_event(&StorageEvent::new(BUCKET, "demo/internal/control/trigger.txt"))
        .await
        .expect_err("should fail");
    assert!(matches!(
        err,
        Error::MixedRepresentations { source, table }
            if source == "source1" && table == "smokepm"
    ));
    assert!(h.publisher.published().is_empty());
}
