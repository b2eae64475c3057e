//! End-to-end secret lifecycle integration tests.
//!
//! These walk the flows the application layer stitches together: the
//! first-boot key ceremony, a simulated restart with the externally
//! persisted key, and full account cleanup across both stores.

use std::sync::Arc;

use haven_core::SecretString;
use haven_secrets::{
    CredentialStore, Database, EncryptionService, ImageStore, ListQuery, MasterKey,
    MasterKeyProvider, NewImage, Outcome,
};
use tempfile::TempDir;

fn new_image(prompt: &str) -> NewImage {
    NewImage {
        prompt: prompt.to_string(),
        model_id: "sdxl-turbo".to_string(),
        data: format!("payload-{prompt}"),
        size: Some("512x512".to_string()),
        quality: Some("standard".to_string()),
    }
}

/// First boot: generate a key, disclose it exactly once, write secrets,
/// then "restart" by rebuilding everything from the disclosed key and the
/// database file. Data written before the restart must decrypt after it.
#[tokio::test]
async fn test_setup_ceremony_and_restart() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("secrets.db");

    // --- first boot, no admin yet ---
    let provider = Arc::new(MasterKeyProvider::generate());
    let disclosed = provider.reveal_once().expect("first disclosure succeeds");
    assert!(provider.reveal_once().is_none(), "disclosure is one-shot");

    {
        let db = Arc::new(Database::open(&db_path).await.unwrap());
        let crypto = EncryptionService::new(provider.clone());
        let credentials = CredentialStore::new(db.clone(), crypto.clone());
        let images = ImageStore::new(db, crypto);

        assert_eq!(
            credentials.set_api_key("weather", "sk-live-1", None).await,
            Outcome::Found(())
        );
        assert!(images.save("default", new_image("sunrise")).await.is_found());
    }

    // --- restart: the admin persisted the disclosed key externally ---
    let restored = MasterKey::from_hex(disclosed.expose()).unwrap();
    let provider = Arc::new(MasterKeyProvider::from_key(restored));

    let db = Arc::new(Database::open(&db_path).await.unwrap());
    let crypto = EncryptionService::new(provider);
    let credentials = CredentialStore::new(db.clone(), crypto.clone());
    let images = ImageStore::new(db, crypto);

    assert_eq!(
        credentials
            .get_api_key("weather", "HAVEN_ITEST_UNSET_VAR", None)
            .await,
        Outcome::Found(SecretString::new("sk-live-1"))
    );

    let page = images
        .list("default", ListQuery::default())
        .await
        .found()
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].prompt, "sunrise");
    assert_eq!(page.items[0].data, "payload-sunrise");
}

/// A restart with the wrong key must degrade, not crash: credentials fall
/// back to the environment and images surface with placeholders.
#[tokio::test]
async fn test_lost_key_degrades_but_serves() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("secrets.db");

    {
        let provider = Arc::new(MasterKeyProvider::generate());
        let db = Arc::new(Database::open(&db_path).await.unwrap());
        let crypto = EncryptionService::new(provider);
        let credentials = CredentialStore::new(db.clone(), crypto.clone());
        let images = ImageStore::new(db, crypto);

        credentials.set_api_key("weather", "sk-old", None).await;
        images.save("default", new_image("lost")).await;
    }

    // Different key: every ciphertext in the database is now foreign.
    let provider = Arc::new(MasterKeyProvider::generate());
    let db = Arc::new(Database::open(&db_path).await.unwrap());
    let crypto = EncryptionService::new(provider);
    let credentials = CredentialStore::new(db.clone(), crypto.clone());
    let images = ImageStore::new(db, crypto);

    std::env::set_var("HAVEN_ITEST_LOSTKEY_VAR", "env-rescue");
    assert_eq!(
        credentials
            .get_api_key("weather", "HAVEN_ITEST_LOSTKEY_VAR", None)
            .await,
        Outcome::Found(SecretString::new("env-rescue"))
    );
    std::env::remove_var("HAVEN_ITEST_LOSTKEY_VAR");

    let page = images
        .list("default", ListQuery::default())
        .await
        .found()
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].prompt, "");
    assert_eq!(page.items[0].data, "");
}

/// Account deletion: both stores are swept for the owner, other tenants are
/// untouched, and repeating the cleanup is still success.
#[tokio::test]
async fn test_account_deletion_cascade() {
    let provider = Arc::new(MasterKeyProvider::generate());
    let db = Arc::new(Database::open_in_memory().await.unwrap());
    let crypto = EncryptionService::new(provider);
    let credentials = CredentialStore::new(db.clone(), crypto.clone());
    let images = ImageStore::new(db, crypto);

    credentials.set_api_key("weather", "a-1", Some("alice")).await;
    credentials.set_api_key("imagegen", "a-2", Some("alice")).await;
    credentials.set_api_key("weather", "b-1", Some("bob")).await;
    images.save("alice", new_image("one")).await;
    images.save("alice", new_image("two")).await;
    images.save("bob", new_image("three")).await;

    assert_eq!(credentials.delete_all_for_owner("alice").await, Outcome::Found(2));
    assert_eq!(images.delete_all("alice").await, Outcome::Found(2));

    assert_eq!(
        credentials.get_credentials(Some("alice")).await,
        Outcome::Found(vec![])
    );
    let alice_page = images.list("alice", ListQuery::default()).await.found().unwrap();
    assert_eq!(alice_page.total, 0);

    // Bob is untouched.
    assert!(credentials
        .get_api_key("weather", "HAVEN_ITEST_UNSET_VAR", Some("bob"))
        .await
        .is_found());
    let bob_page = images.list("bob", ListQuery::default()).await.found().unwrap();
    assert_eq!(bob_page.total, 1);

    // Re-running the cascade is success with nothing removed.
    assert_eq!(credentials.delete_all_for_owner("alice").await, Outcome::Found(0));
    assert_eq!(images.delete_all("alice").await, Outcome::Found(0));
}

/// Stores built before storage initializes become functional once the
/// database handle is attached.
#[tokio::test]
async fn test_late_storage_initialization() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("secrets.db");

    let provider = Arc::new(MasterKeyProvider::generate());
    let db = Arc::new(Database::detached());
    let crypto = EncryptionService::new(provider);
    let credentials = CredentialStore::new(db.clone(), crypto);

    assert_eq!(
        credentials.set_api_key("weather", "sk", None).await,
        Outcome::Unavailable
    );

    db.attach(&db_path).await.unwrap();

    assert_eq!(
        credentials.set_api_key("weather", "sk", None).await,
        Outcome::Found(())
    );
    assert_eq!(
        credentials
            .get_api_key("weather", "HAVEN_ITEST_UNSET_VAR", None)
            .await,
        Outcome::Found(SecretString::new("sk"))
    );
}
