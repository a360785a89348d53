//! Reconciler against the in-memory API.

mod common;

use common::{LOCATION, PROJECT, TestEnv, config};
use nbrt::config::{DiskSpecConfig, IdleShutdownSettings};
use nbrt::reconciler::diff;
use nbrt::{ManagedTemplate, Phase, Plan, ReconcileError, TemplateField, ValidationPolicy};
use nbrt_client::{ClientError, Field};
use serde_json::json;

const KEY_1: &str = "projects/proj/locations/australia-southeast1/keyRings/r/cryptoKeys/k1";
const KEY_2: &str = "projects/proj/locations/australia-southeast1/keyRings/r/cryptoKeys/k2";

#[tokio::test]
async fn test_create_round_trip() {
    let env = TestEnv::spawn().await;
    let desired = nbrt::TemplateConfig {
        enable_secure_boot: Some(true),
        data_persistent_disk_spec: Some(DiskSpecConfig {
            disk_type: Some("pd-ssd".to_string()),
            disk_size_gb: Some("100".to_string()),
        }),
        idle_shutdown_config: Some(IdleShutdownSettings {
            idle_timeout: Some("3600s".to_string()),
            idle_shutdown_disabled: None,
        }),
        labels: Some([("team".to_string(), "data".to_string())].into()),
        ..config("round-trip")
    };

    let created = env.reconciler.create(&desired).await.unwrap();

    assert!(created.name.starts_with(&format!(
        "projects/{PROJECT}/locations/{LOCATION}/notebookRuntimeTemplates/"
    )));
    assert!(diff(&created, &desired).is_empty());
    // Omitted by the server, filled in on read.
    assert!(!created.is_default);
    assert!(!created.idle_shutdown_config.idle_shutdown_disabled);
    assert!(created.create_time.is_some());

    let read = env.reconciler.read(&created.name).await.unwrap().unwrap();
    assert_eq!(read, created);

    let posts = env.requests("POST").await;
    assert_eq!(posts.len(), 1);
    let body = posts[0].body.as_ref().unwrap();
    assert!(body.get("encryptionSpec").is_none());
    assert_eq!(body["shieldedVmConfig"], json!({ "enableSecureBoot": true }));
    assert!(env.requests("PATCH").await.is_empty());

    env.shutdown().await;
}

#[tokio::test]
async fn test_create_sets_kms_key_with_masked_patch() {
    let env = TestEnv::spawn().await;
    let desired = nbrt::TemplateConfig {
        kms_key_name: Field::Value(KEY_1.to_string()),
        ..config("encrypted")
    };

    let created = env.reconciler.create(&desired).await.unwrap();
    assert_eq!(created.kms_key_name.as_deref(), Some(KEY_1));

    let methods: Vec<String> = env
        .mock()
        .requests()
        .await
        .into_iter()
        .map(|r| r.method)
        .collect();
    assert_eq!(methods, vec!["POST", "GET", "PATCH", "GET"]);

    let patch = &env.requests("PATCH").await[0];
    assert_eq!(
        patch.query.as_deref(),
        Some("updateMask=encryptionSpec.kmsKeyName")
    );
    assert_eq!(
        patch.body,
        Some(json!({
            "name": created.name,
            "encryptionSpec": { "kmsKeyName": KEY_1 }
        }))
    );

    env.shutdown().await;
}

#[tokio::test]
async fn test_update_kms_in_place() {
    let env = TestEnv::spawn().await;
    let before = nbrt::TemplateConfig {
        kms_key_name: Field::Value(KEY_1.to_string()),
        ..config("rotate")
    };
    let prior = env.reconciler.create(&before).await.unwrap();
    env.mock().clear_requests().await;

    let after = nbrt::TemplateConfig {
        kms_key_name: Field::Value(KEY_2.to_string()),
        ..before
    };
    let updated = env.reconciler.update(&prior, &after).await.unwrap();

    assert_eq!(updated.name, prior.name);
    assert_eq!(updated.kms_key_name.as_deref(), Some(KEY_2));
    assert_eq!(env.requests("PATCH").await.len(), 1);
    assert!(env.requests("POST").await.is_empty());
    assert!(env.requests("DELETE").await.is_empty());

    env.shutdown().await;
}

#[tokio::test]
async fn test_update_clears_kms_with_null() {
    let env = TestEnv::spawn().await;
    let before = nbrt::TemplateConfig {
        kms_key_name: Field::Value(KEY_1.to_string()),
        ..config("clear")
    };
    let prior = env.reconciler.create(&before).await.unwrap();

    let after = nbrt::TemplateConfig {
        kms_key_name: Field::Null,
        ..before
    };
    let updated = env.reconciler.update(&prior, &after).await.unwrap();
    assert_eq!(updated.kms_key_name, None);

    let patch = env.requests("PATCH").await.pop().unwrap();
    assert_eq!(
        patch.body,
        Some(json!({ "name": prior.name, "encryptionSpec": { "kmsKeyName": null } }))
    );

    env.shutdown().await;
}

#[tokio::test]
async fn test_update_immutable_field_sends_nothing() {
    let env = TestEnv::spawn().await;
    let before = config("original");
    let prior = env.reconciler.create(&before).await.unwrap();
    env.mock().clear_requests().await;

    let mut after = config("renamed");
    after.machine_spec.machine_type = "n1-standard-8".to_string();
    let err = env.reconciler.update(&prior, &after).await.unwrap_err();

    match err {
        ReconcileError::FieldImmutable { name, fields } => {
            assert_eq!(name, prior.name);
            assert_eq!(
                fields,
                vec![TemplateField::DisplayName, TemplateField::MachineSpec]
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(env.mock().requests().await.is_empty());
    let stored = env.mock().template(&prior.name).await.unwrap();
    assert_eq!(stored["displayName"], json!("original"));

    env.shutdown().await;
}

#[tokio::test]
async fn test_unchanged_update_sends_nothing() {
    let env = TestEnv::spawn().await;
    let desired = config("steady");
    let prior = env.reconciler.create(&desired).await.unwrap();
    env.mock().clear_requests().await;

    let same = env.reconciler.update(&prior, &desired).await.unwrap();
    assert_eq!(same, prior);
    assert!(env.mock().requests().await.is_empty());

    env.shutdown().await;
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let env = TestEnv::spawn().await;
    let created = env.reconciler.create(&config("doomed")).await.unwrap();

    env.reconciler.delete(&created.name).await.unwrap();
    env.reconciler.delete(&created.name).await.unwrap();
    env.reconciler
        .delete("projects/proj/locations/australia-southeast1/notebookRuntimeTemplates/42")
        .await
        .unwrap();

    assert!(env.reconciler.read(&created.name).await.unwrap().is_none());

    env.shutdown().await;
}

#[tokio::test]
async fn test_delete_server_error_propagates() {
    let env = TestEnv::spawn().await;
    env.mock().respond_next(500, json!({ "error": { "code": 500 } })).await;

    let err = env
        .reconciler
        .delete("projects/proj/locations/australia-southeast1/notebookRuntimeTemplates/1")
        .await
        .unwrap_err();
    match err {
        ReconcileError::Api {
            operation, source, ..
        } => {
            assert_eq!(operation, "delete");
            assert!(source.is_server_error());
        }
        other => panic!("unexpected error: {other:?}"),
    }

    env.shutdown().await;
}

#[tokio::test]
async fn test_read_missing_is_none() {
    let env = TestEnv::spawn().await;
    env.reconciler.create(&config("other")).await.unwrap();

    assert!(env.reconciler.read("missing").await.unwrap().is_none());

    env.shutdown().await;
}

#[tokio::test]
async fn test_blocking_violation_prevents_request() {
    let env = TestEnv::spawn().await;
    let mut desired = config("");
    desired.machine_spec.machine_type.clear();

    let err = env.reconciler.create(&desired).await.unwrap_err();
    match err {
        ReconcileError::Validation(violations) => {
            let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
            assert_eq!(paths, vec!["display_name", "machine_spec.machine_type"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(env.mock().requests().await.is_empty());

    env.shutdown().await;
}

#[tokio::test]
async fn test_advisory_violation_still_creates() {
    let env = TestEnv::spawn().await;
    let desired = nbrt::TemplateConfig {
        idle_shutdown_config: Some(IdleShutdownSettings {
            idle_timeout: Some("599s".to_string()),
            idle_shutdown_disabled: None,
        }),
        ..config("short-idle")
    };

    let warnings = env.reconciler.validate(&desired).unwrap();
    assert_eq!(warnings.len(), 1);
    env.reconciler.create(&desired).await.unwrap();
    assert_eq!(env.mock().templates().await.len(), 1);

    env.shutdown().await;
}

#[tokio::test]
async fn test_strict_policy_blocks_advisory_violation() {
    let env = TestEnv::spawn_with(ValidationPolicy::Strict).await;
    let desired = nbrt::TemplateConfig {
        idle_shutdown_config: Some(IdleShutdownSettings {
            idle_timeout: Some("599s".to_string()),
            idle_shutdown_disabled: None,
        }),
        ..config("short-idle")
    };

    let err = env.reconciler.create(&desired).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Validation(_)));
    assert!(env.mock().requests().await.is_empty());

    env.shutdown().await;
}

#[tokio::test]
async fn test_list_normalizes_seeded_templates() {
    let env = TestEnv::spawn().await;
    env.mock()
        .insert(
            PROJECT,
            LOCATION,
            json!({ "displayName": "seeded", "machineSpec": { "machineType": "e2-standard-2" } }),
        )
        .await;
    env.mock()
        .insert("elsewhere", LOCATION, json!({ "displayName": "foreign" }))
        .await;

    let templates = env.reconciler.list().await.unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].display_name, "seeded");
    assert!(!templates[0].network_spec.enable_internet_access);
    assert!(!templates[0].enable_secure_boot);

    env.shutdown().await;
}

#[tokio::test]
async fn test_apply_lifecycle() {
    let env = TestEnv::spawn().await;
    let mut managed = ManagedTemplate::default();
    let desired = config("lifecycle");

    let plan = env.reconciler.apply(&mut managed, &desired, false).await.unwrap();
    assert_eq!(plan, Plan::Create);
    assert_eq!(managed.phase, Phase::Present);
    let first_name = managed.name.clone().unwrap();

    let plan = env.reconciler.apply(&mut managed, &desired, false).await.unwrap();
    assert_eq!(plan, Plan::NoOp);

    let encrypted = nbrt::TemplateConfig {
        kms_key_name: Field::Value(KEY_1.to_string()),
        ..desired.clone()
    };
    let plan = env.reconciler.apply(&mut managed, &encrypted, false).await.unwrap();
    assert_eq!(
        plan,
        Plan::Update {
            fields: vec![TemplateField::KmsKeyName]
        }
    );
    assert_eq!(managed.phase, Phase::Present);
    assert_eq!(
        managed.state.as_ref().unwrap().kms_key_name.as_deref(),
        Some(KEY_1)
    );

    // Immutable change without --replace: refused, nothing touched.
    let renamed = nbrt::TemplateConfig {
        display_name: "lifecycle-v2".to_string(),
        ..encrypted
    };
    let err = env
        .reconciler
        .apply(&mut managed, &renamed, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::FieldImmutable { .. }));
    assert_eq!(managed.phase, Phase::Present);
    assert_eq!(managed.name.as_deref(), Some(first_name.as_str()));

    let plan = env.reconciler.apply(&mut managed, &renamed, true).await.unwrap();
    assert_eq!(
        plan,
        Plan::Replace {
            fields: vec![TemplateField::DisplayName]
        }
    );
    assert_eq!(managed.phase, Phase::Present);
    let second_name = managed.name.clone().unwrap();
    assert_ne!(second_name, first_name);
    assert!(env.mock().template(&first_name).await.is_none());
    let state = managed.state.as_ref().unwrap();
    assert_eq!(state.display_name, "lifecycle-v2");
    assert_eq!(state.kms_key_name.as_deref(), Some(KEY_1));

    env.reconciler.destroy(&mut managed).await.unwrap();
    assert_eq!(managed, ManagedTemplate::default());
    assert!(env.mock().templates().await.is_empty());

    // Destroying nothing is a no-op.
    env.reconciler.destroy(&mut managed).await.unwrap();

    env.shutdown().await;
}

#[tokio::test]
async fn test_refresh_detects_out_of_band_removal() {
    let env = TestEnv::spawn().await;
    let mut managed = ManagedTemplate::default();
    let desired = config("vanishing");
    env.reconciler.apply(&mut managed, &desired, false).await.unwrap();
    let name = managed.name.clone().unwrap();

    assert!(env.mock().remove(&name).await);
    env.reconciler.refresh(&mut managed).await.unwrap();
    assert_eq!(managed.phase, Phase::Absent);
    assert!(managed.name.is_none());

    let plan = env.reconciler.apply(&mut managed, &desired, false).await.unwrap();
    assert_eq!(plan, Plan::Create);
    assert_eq!(managed.phase, Phase::Present);

    env.shutdown().await;
}

#[tokio::test]
async fn test_refresh_keeps_template_when_list_fails() {
    let env = TestEnv::spawn().await;
    let mut managed = ManagedTemplate::default();
    let desired = config("keep");
    env.reconciler.apply(&mut managed, &desired, false).await.unwrap();
    let name = managed.name.clone().unwrap();

    env.mock()
        .respond_next_to("GET", 404, json!({ "error": { "code": 404 } }))
        .await;
    let err = env.reconciler.refresh(&mut managed).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Api {
            operation: "read",
            source: ClientError::Response { code: 404, .. },
            ..
        }
    ));
    assert_eq!(managed.phase, Phase::Failed);
    assert_eq!(managed.name.as_deref(), Some(name.as_str()));
    assert!(env.mock().template(&name).await.is_some());

    // The next apply finds the same template rather than creating another.
    let plan = env.reconciler.apply(&mut managed, &desired, false).await.unwrap();
    assert_eq!(plan, Plan::NoOp);
    assert_eq!(managed.phase, Phase::Present);
    assert_eq!(env.mock().templates().await.len(), 1);

    env.shutdown().await;
}

#[tokio::test]
async fn test_failed_create_returns_to_absent() {
    let env = TestEnv::spawn().await;
    let mut managed = ManagedTemplate::default();
    env.mock().respond_next_to("POST", 503, json!({})).await;

    let err = env
        .reconciler
        .apply(&mut managed, &config("unlucky"), false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Api {
            operation: "create",
            source: ClientError::Response { code: 503, .. },
            ..
        }
    ));
    assert_eq!(managed.phase, Phase::Absent);
    assert!(managed.name.is_none());
    assert!(managed.last_error.is_some());

    env.shutdown().await;
}

#[tokio::test]
async fn test_failed_kms_patch_tracks_created_template() {
    let env = TestEnv::spawn().await;
    let mut managed = ManagedTemplate::default();
    let desired = nbrt::TemplateConfig {
        kms_key_name: Field::Value(KEY_1.to_string()),
        ..config("half-done")
    };
    env.mock().respond_next_to("PATCH", 503, json!({})).await;

    let err = env
        .reconciler
        .apply(&mut managed, &desired, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Api { operation: "update", .. }));
    assert_eq!(managed.phase, Phase::Failed);
    let name = managed.name.clone().unwrap();
    assert!(env.mock().template(&name).await.is_some());

    // The retry finds the template and finishes the key.
    let plan = env.reconciler.apply(&mut managed, &desired, false).await.unwrap();
    assert_eq!(
        plan,
        Plan::Update {
            fields: vec![TemplateField::KmsKeyName]
        }
    );
    assert_eq!(managed.phase, Phase::Present);
    assert_eq!(managed.name.as_deref(), Some(name.as_str()));
    assert!(managed.last_error.is_none());
    assert_eq!(env.mock().templates().await.len(), 1);

    env.shutdown().await;
}

#[tokio::test]
async fn test_failed_destroy_can_be_retried() {
    let env = TestEnv::spawn().await;
    let mut managed = ManagedTemplate::default();
    env.reconciler
        .apply(&mut managed, &config("sticky"), false)
        .await
        .unwrap();
    env.mock().respond_next_to("DELETE", 500, json!({})).await;

    assert!(env.reconciler.destroy(&mut managed).await.is_err());
    assert_eq!(managed.phase, Phase::Failed);
    assert!(managed.name.is_some());

    env.reconciler.destroy(&mut managed).await.unwrap();
    assert_eq!(managed.phase, Phase::Absent);
    assert!(env.mock().templates().await.is_empty());

    env.shutdown().await;
}

#[tokio::test]
async fn test_state_file_survives_between_runs() {
    let env = TestEnv::spawn().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(nbrt::state::DEFAULT_STATE_FILE);
    let desired = config("persisted");

    let mut managed = nbrt::state::load(&path).await.unwrap();
    env.reconciler.apply(&mut managed, &desired, false).await.unwrap();
    nbrt::state::save(&path, &managed).await.unwrap();

    let mut reloaded = nbrt::state::load(&path).await.unwrap();
    assert_eq!(reloaded, managed);
    let plan = env.reconciler.apply(&mut reloaded, &desired, false).await.unwrap();
    assert_eq!(plan, Plan::NoOp);
    assert_eq!(env.mock().templates().await.len(), 1);

    env.shutdown().await;
}
