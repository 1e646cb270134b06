//! Config store, migration and settings integration tests

mod common;

use std::sync::Arc;

use tempfile::tempdir;

use common::MockEngine;
use uawire_client_core::{
    apply_settings, ClientError, ConfigStore, MigrateContext, SettingsSnapshot, SettingsUpdate,
};

const TEMPLATE: &str = "\
# default config
module_tmp uuid.so
module avcodec.so
module opensles.so
dyn_dns no
audio_buffer 40-500
";

fn ctx() -> MigrateContext {
    MigrateContext {
        has_camera: false,
        dns_servers: Vec::new(),
        recordings_dir: "/data/recordings".to_string(),
    }
}

async fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
    ConfigStore::open(dir.path().join("config"), TEMPLATE)
        .await
        .unwrap()
}

#[tokio::test]
async fn missing_file_is_seeded_from_template() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    assert_eq!(store.variable("dyn_dns").await, vec!["no"]);
}

#[tokio::test]
async fn initialize_is_idempotent_on_disk() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    store.initialize(&ctx()).await.unwrap();
    let first = tokio::fs::read(store.path()).await.unwrap();

    // Second migration of the same document must be byte identical.
    store.initialize(&ctx()).await.unwrap();
    let second = tokio::fs::read(store.path()).await.unwrap();
    assert_eq!(first, second);

    // And so must a migration after a fresh reload from disk.
    let reopened = store_in(&dir).await;
    reopened.initialize(&ctx()).await.unwrap();
    let third = tokio::fs::read(store.path()).await.unwrap();
    assert_eq!(first, third);
}

#[tokio::test]
async fn multi_valued_directives_keep_insertion_order() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    store.add_line("x 1").await;
    store.add_line("x 2").await;
    assert_eq!(store.variable("x").await, vec!["1", "2"]);
}

#[tokio::test]
async fn replace_variable_collapses_all_prior_lines() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    store.add_line("log_level 1").await;
    store.add_line("log_level 3").await;
    store.replace_variable("log_level", "0").await;
    assert_eq!(store.variable("log_level").await, vec!["0"]);
}

#[tokio::test]
async fn save_and_reload_round_trips_directives() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    store.add_line("dns_server 8.8.8.8:53").await;
    store.add_line("dyn_dns no").await;
    store.add_line("").await;
    store.save().await.unwrap();

    let reopened = store_in(&dir).await;
    assert_eq!(reopened.variable("dns_server").await, vec!["8.8.8.8:53"]);
    // The template line and the added one are both present, in order.
    assert_eq!(reopened.variable("dyn_dns").await, vec!["no", "no"]);

    let bytes = tokio::fs::read(store.path()).await.unwrap();
    assert!(bytes.ends_with(b"\n"));
    assert!(!String::from_utf8_lossy(&bytes).contains("\n\n"));
}

#[tokio::test]
async fn remove_variable_drops_every_line() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    store.add_line("dns_server 8.8.8.8:53").await;
    store.add_line("dyn_dns no").await;
    assert_eq!(store.variable("dyn_dns").await, vec!["no", "no"]);

    store.remove_variable("dns_server").await;
    assert_eq!(store.variable("dns_server").await, Vec::<String>::new());
}

#[tokio::test]
async fn reset_restores_the_template() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    store.replace_variable("dyn_dns", "yes").await;
    store.add_line("sip_listen 0.0.0.0:5060").await;
    store.save().await.unwrap();

    store.reset().await.unwrap();
    assert_eq!(store.variable("dyn_dns").await, vec!["no"]);
    assert!(store.variable("sip_listen").await.is_empty());

    // The reset is already durable.
    let reopened = store_in(&dir).await;
    assert!(reopened.variable("sip_listen").await.is_empty());
}

#[tokio::test]
async fn settings_snapshot_reads_current_values() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    store.add_line("auto_start yes").await;
    store.add_line("sip_listen 10.0.0.1:5060").await;
    store.add_line("dns_server 8.8.8.8:53").await;
    store.add_line("log_level 0").await;

    let snapshot = SettingsSnapshot::read(&store).await;
    assert!(snapshot.auto_start);
    assert_eq!(snapshot.listen_address, "10.0.0.1:5060");
    assert_eq!(snapshot.dns_servers, vec!["8.8.8.8:53"]);
    assert!(snapshot.debug);
    assert!(!snapshot.verify_server);
}

#[tokio::test]
async fn invalid_listen_address_leaves_document_untouched() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    let engine = Arc::new(MockEngine::new());

    let err = apply_settings(
        &store,
        engine.as_ref(),
        SettingsUpdate {
            listen_address: Some("not-an-address".to_string()),
            auto_start: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClientError::InvalidListenAddress { .. }));
    assert!(store.variable("sip_listen").await.is_empty());
    assert!(store.variable("auto_start").await.is_empty());
}

#[tokio::test]
async fn static_dns_servers_are_completed_validated_and_pushed() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    let engine = Arc::new(MockEngine::new());

    let outcome = apply_settings(
        &store,
        engine.as_ref(),
        SettingsUpdate {
            dns_servers: Some(vec!["8.8.8.8".to_string(), "1.1.1.1:5353".to_string()]),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(outcome.saved);
    assert!(!outcome.restart_required);

    assert_eq!(
        store.variable("dns_server").await,
        vec!["8.8.8.8:53", "1.1.1.1:5353"]
    );
    assert_eq!(store.variable("dyn_dns").await, vec!["no"]);
    assert!(engine
        .journal()
        .contains(&"set_name_servers 8.8.8.8:53,1.1.1.1:5353".to_string()));
}

#[tokio::test]
async fn clearing_dns_servers_switches_back_to_dynamic() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    let engine = Arc::new(MockEngine::new());
    store.add_line("dns_server 8.8.8.8:53").await;
    store.replace_variable("dyn_dns", "no").await;

    let outcome = apply_settings(
        &store,
        engine.as_ref(),
        SettingsUpdate {
            dns_servers: Some(Vec::new()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(outcome.saved);
    assert!(store.variable("dns_server").await.is_empty());
    assert_eq!(store.variable("dyn_dns").await, vec!["yes"]);
}

#[tokio::test]
async fn verify_server_requires_a_ca_file() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    let engine = Arc::new(MockEngine::new());

    let err = apply_settings(
        &store,
        engine.as_ref(),
        SettingsUpdate {
            verify_server: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClientError::VerifyServerWithoutCa));

    store.add_line("sip_cafile /data/ca_certs.crt").await;
    let outcome = apply_settings(
        &store,
        engine.as_ref(),
        SettingsUpdate {
            verify_server: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(outcome.saved);
    assert!(outcome.restart_required);
    assert_eq!(store.variable("sip_verify_server").await, vec!["yes"]);
}

#[tokio::test]
async fn unchanged_update_saves_nothing() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir).await;
    let engine = Arc::new(MockEngine::new());

    let outcome = apply_settings(
        &store,
        engine.as_ref(),
        SettingsUpdate {
            auto_start: Some(false),
            debug: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(!outcome.saved);
    assert!(!outcome.restart_required);
    assert!(engine.journal().is_empty());
}
