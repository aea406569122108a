//! Integration tests for `VaultStorage`: the full file lifecycle,
//! corruption handling and structural validation.

use std::fs;
use std::path::PathBuf;

use assert_fs::TempDir;
use serde_json::{json, Map, Value};

use pryx_vault::crypto::VaultConfig;
use pryx_vault::errors::StorageError;
use pryx_vault::storage::{EntryData, EntryType, EntryUpdate, VaultStorage};

const PASSWORD: &[u8] = b"test-password-123";

fn storage(tmp: &TempDir) -> VaultStorage {
    VaultStorage::new(tmp.path().join("backups")).with_vault_config(VaultConfig {
        time_cost: 1,
        memory_cost: 8_192,
        parallelism: 1,
        ..VaultConfig::default()
    })
}

fn vault_path(tmp: &TempDir) -> PathBuf {
    tmp.path().join("vault.json")
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}

#[tokio::test]
async fn full_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp);
    let path = vault_path(&tmp);

    let mut vault = storage.create_empty_vault();
    let entry = storage
        .add_entry(
            &mut vault,
            EntryData::new(
                EntryType::ApiKey,
                "OpenAI API Key",
                object(json!({"apiKey": "sk-test123", "provider": "openai"})),
            ),
            PASSWORD,
        )
        .await
        .unwrap();
    storage.save(&path, &mut vault).unwrap();

    let mut loaded = storage.load(&path, PASSWORD).await.unwrap();
    assert_eq!(loaded.entries.len(), 1);

    let data = storage
        .get_entry(&mut loaded, &entry.id, PASSWORD)
        .await
        .unwrap();
    assert_eq!(data.name, "OpenAI API Key");
    assert_eq!(data.data["apiKey"], "sk-test123");

    storage
        .update_entry(
            &mut loaded,
            &entry.id,
            EntryUpdate {
                name: Some("Renamed".into()),
                data: Some(object(json!({"apiKey": "sk-rotated"}))),
            },
            PASSWORD,
        )
        .await
        .unwrap();
    storage.save(&path, &mut loaded).unwrap();

    let mut reloaded = storage.load(&path, PASSWORD).await.unwrap();
    let data = storage
        .get_entry(&mut reloaded, &entry.id, PASSWORD)
        .await
        .unwrap();
    assert_eq!(data.name, "Renamed");
    assert_eq!(data.data["apiKey"], "sk-rotated");

    storage.delete_entry(&mut reloaded, &entry.id).unwrap();
    assert!(storage.list_entries(&reloaded).is_empty());
}

#[tokio::test]
async fn every_entry_type_roundtrips() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp);
    let mut vault = storage.create_empty_vault();

    let types = [
        EntryType::Credential,
        EntryType::ApiKey,
        EntryType::Token,
        EntryType::Note,
    ];
    let mut ids = Vec::new();
    for t in types {
        let entry = storage
            .add_entry(
                &mut vault,
                EntryData::new(t, t.as_str(), object(json!({"kind": t.as_str()}))),
                PASSWORD,
            )
            .await
            .unwrap();
        ids.push(entry.id);
    }

    let listed = storage.list_entries(&vault);
    assert_eq!(listed.len(), 4);
    for (meta, t) in listed.iter().zip(types) {
        assert_eq!(meta.entry_type, t);
    }

    for (id, t) in ids.iter().zip(types) {
        let data = storage.get_entry(&mut vault, id, PASSWORD).await.unwrap();
        assert_eq!(data.entry_type, t);
        assert_eq!(data.data["kind"], t.as_str());
    }
}

#[tokio::test]
async fn large_entry_roundtrips() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp);
    let path = vault_path(&tmp);
    let mut vault = storage.create_empty_vault();

    let large = "x".repeat(10_000);
    let entry = storage
        .add_entry(
            &mut vault,
            EntryData::new(EntryType::Note, "Large", object(json!({"content": large}))),
            PASSWORD,
        )
        .await
        .unwrap();
    storage.save(&path, &mut vault).unwrap();

    let mut loaded = storage.load(&path, PASSWORD).await.unwrap();
    let data = storage
        .get_entry(&mut loaded, &entry.id, PASSWORD)
        .await
        .unwrap();
    assert_eq!(data.data["content"].as_str().unwrap().len(), 10_000);
}

#[tokio::test]
async fn corrupted_entry_is_reported_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp);
    let path = vault_path(&tmp);
    let mut vault = storage.create_empty_vault();

    let mut ids = Vec::new();
    for name in ["good", "bad"] {
        let entry = storage
            .add_entry(
                &mut vault,
                EntryData::new(EntryType::Note, name, object(json!({"n": name}))),
                PASSWORD,
            )
            .await
            .unwrap();
        ids.push(entry.id);
    }
    storage.save(&path, &mut vault).unwrap();

    let mut raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    raw["entries"][1]["encryptedData"] = json!("corrupted-data");
    fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

    let mut loaded = storage.load(&path, PASSWORD).await.unwrap();
    let report = storage.verify_integrity(&loaded, Some(PASSWORD)).await;
    assert!(!report.valid);
    assert_eq!(report.entry_count, 2);
    assert_eq!(report.corrupted_entries, vec![ids[1].clone()]);

    // The healthy entry is still readable.
    storage
        .get_entry(&mut loaded, &ids[0], PASSWORD)
        .await
        .unwrap();

    match storage.get_entry(&mut loaded, &ids[1], PASSWORD).await {
        Err(StorageError::CorruptedVault(msg)) => assert!(msg.contains(&ids[1])),
        other => panic!("expected CorruptedVault, got {other:?}"),
    }
}

#[tokio::test]
async fn wrong_password_is_rejected_on_load() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp);
    let path = vault_path(&tmp);
    let mut vault = storage.create_empty_vault();
    storage
        .add_entry(
            &mut vault,
            EntryData::new(EntryType::Token, "t", object(json!({"v": 1}))),
            PASSWORD,
        )
        .await
        .unwrap();
    storage.save(&path, &mut vault).unwrap();

    assert!(matches!(
        storage.load(&path, b"wrong-password").await,
        Err(StorageError::CorruptedVault(_))
    ));
}

#[tokio::test]
async fn verify_without_password_skips_decryption() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp);
    let mut vault = storage.create_empty_vault();
    storage
        .add_entry(
            &mut vault,
            EntryData::new(EntryType::Note, "n", Map::new()),
            PASSWORD,
        )
        .await
        .unwrap();
    vault.entries[0].encrypted_data = "corrupted-data".into();

    let report = storage.verify_integrity(&vault, None).await;
    assert!(report.valid);
    assert_eq!(report.entry_count, 1);
    assert!(report.corrupted_entries.is_empty());
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp);

    assert!(matches!(
        storage.load(&tmp.path().join("nope.json"), PASSWORD).await,
        Err(StorageError::FileNotFound(_))
    ));
}

#[tokio::test]
async fn malformed_files_are_corrupted() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp);
    let path = vault_path(&tmp);

    for (contents, expected) in [
        ("not json at all", "Invalid JSON format"),
        ("{\"version\": 1}", "Missing or invalid createdAt"),
        ("42", "Vault is not an object"),
    ] {
        fs::write(&path, contents).unwrap();
        match storage.load(&path, PASSWORD).await {
            Err(StorageError::CorruptedVault(msg)) => assert_eq!(msg, expected),
            other => panic!("expected CorruptedVault for {contents:?}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn unknown_version_needs_migration() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp);
    let path = vault_path(&tmp);
    let mut vault = storage.create_empty_vault();
    vault.version = 2;
    storage.save(&path, &mut vault).unwrap();

    assert!(matches!(
        storage.load(&path, PASSWORD).await,
        Err(StorageError::Migration { from: 2, to: 1 })
    ));
}

#[tokio::test]
async fn duplicate_and_missing_ids() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp);
    let mut vault = storage.create_empty_vault();

    let data = EntryData::new(EntryType::Credential, "db", Map::new()).with_id("db-main");
    storage
        .add_entry(&mut vault, data.clone(), PASSWORD)
        .await
        .unwrap();

    assert!(matches!(
        storage.add_entry(&mut vault, data, PASSWORD).await,
        Err(StorageError::DuplicateEntry(id)) if id == "db-main"
    ));
    assert!(matches!(
        storage.get_entry(&mut vault, "missing", PASSWORD).await,
        Err(StorageError::EntryNotFound(_))
    ));
    assert!(matches!(
        storage
            .update_entry(&mut vault, "missing", EntryUpdate::default(), PASSWORD)
            .await,
        Err(StorageError::EntryNotFound(_))
    ));
    assert!(matches!(
        storage.delete_entry(&mut vault, "missing"),
        Err(StorageError::EntryNotFound(_))
    ));
}

#[tokio::test]
async fn saved_file_uses_wire_field_names() {
    let tmp = TempDir::new().unwrap();
    let storage = storage(&tmp);
    let path = tmp.path().join("nested/dir/vault.json");
    let mut vault = storage.create_empty_vault();
    storage
        .add_entry(
            &mut vault,
            EntryData::new(EntryType::ApiKey, "k", Map::new()),
            PASSWORD,
        )
        .await
        .unwrap();
    storage.save(&path, &mut vault).unwrap();

    let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["version"], 1);
    assert_eq!(raw["metadata"]["algorithm"], "argon2id+aes-256-gcm");
    assert_eq!(raw["metadata"]["memoryCost"], 8_192);
    assert_eq!(raw["entries"][0]["type"], "api-key");
    assert_eq!(raw["entries"][0]["accessCount"], 0);
    assert!(raw["entries"][0]["encryptedData"].is_string());
}
