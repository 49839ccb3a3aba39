//! Opening the engine from an `ordo.toml` file.

use crate::common::store;
use ordo::{ConfigError, EngineConfig, Error, StorageEngine, SystemClock};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn open_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(ordo_engine::CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        r#"
table_name = "events"
index_name = "events-global"
node_id = "worker-7"
claim_timeout_ms = 2500
payload_type_prefix = "com.example.orders."
"#,
    )
    .unwrap();

    let settings = EngineConfig::from_file(&path).unwrap();
    assert_eq!(settings.claim_timeout, Duration::from_millis(2500));

    let engine = StorageEngine::from_settings(settings, store(), Arc::new(SystemClock)).unwrap();
    assert_eq!(engine.claims().node_id(), "worker-7");

    engine
        .events()
        .append(&[crate::common::event("order-1", 0, "Placed")])
        .unwrap();
    let stored = engine.events().read_stream("order-1", 0).unwrap();
    assert_eq!(stored[0].payload.type_name, "com.example.orders.Placed");
}

#[test]
fn incomplete_config_file_names_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ordo.toml");
    std::fs::write(&path, "node_id = \"worker-7\"\n").unwrap();

    match EngineConfig::from_file(&path) {
        Err(Error::Config(ConfigError::MissingFields(fields))) => {
            assert_eq!(fields, vec!["table_name", "index_name"]);
        }
        other => panic!("unexpected {:?}", other),
    }
}
