//! Credential lifecycle through real storage and every provider kind.

use std::sync::Arc;

use lockbox::{
    IssuedCertificate, KeyConfig, KeyId, KeySource, Lockbox, LockboxConfig, LockboxError,
    MemoryAuthorityStore, ProviderConfig, ProviderKind, ProviderRegistry, SqliteStore,
};
use lockbox::store::Store;
use lockbox_pki::{AuthorityStore, CertificateAuthority, CertificateRequest, DEFAULT_CA_NAME};

const SALT: &str = "0123456789abcdef";

fn password_provider(name: &str, passphrase: &str) -> ProviderConfig {
    ProviderConfig {
        name: name.to_string(),
        kind: ProviderKind::Password {
            passphrase: passphrase.to_string(),
            salt: SALT.to_string(),
        },
        key_creation_enabled: false,
    }
}

async fn sqlite_lockbox(config: LockboxConfig) -> (Arc<SqliteStore>, Lockbox<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_memory().unwrap());
    let lockbox = Lockbox::new(
        Arc::clone(&store),
        Arc::new(MemoryAuthorityStore::new()),
        ProviderRegistry::new(),
        config,
    )
    .await
    .unwrap();
    (store, lockbox)
}

#[tokio::test]
async fn sqlite_round_trip() {
    let config = LockboxConfig::single_password_provider("internal", "test passphrase", SALT);
    let (_store, lockbox) = sqlite_lockbox(config).await;

    lockbox
        .set_credential("alice", "/prod/api-token", b"tok-123")
        .await
        .unwrap();

    assert_eq!(
        lockbox
            .get_credential("alice", "/prod/api-token")
            .await
            .unwrap(),
        b"tok-123"
    );
}

#[tokio::test]
async fn rotated_out_key_still_decrypts() -> anyhow::Result<()> {
    let old_key = KeyId::generate();
    let new_key = KeyId::generate();
    let store = Arc::new(SqliteStore::open_memory()?);

    let old_config = LockboxConfig {
        providers: vec![password_provider("internal", "old passphrase")],
        keys: vec![KeyConfig {
            id: old_key,
            provider: "internal".into(),
            source: KeySource::Derived,
            active: true,
        }],
        acl_enforced: false,
    };

    {
        let lockbox = Lockbox::new(
            Arc::clone(&store),
            Arc::new(MemoryAuthorityStore::new()),
            ProviderRegistry::new(),
            old_config,
        )
        .await?;
        lockbox
            .set_credential("alice", "/old/secret", b"sealed long ago")
            .await?;
    }

    // Rotation: a second provider's key becomes active, the old one stays
    // on the ring for decryption.
    let rotated_config = LockboxConfig {
        providers: vec![
            password_provider("internal", "old passphrase"),
            password_provider("internal-2", "new passphrase"),
        ],
        keys: vec![
            KeyConfig {
                id: old_key,
                provider: "internal".into(),
                source: KeySource::Derived,
                active: false,
            },
            KeyConfig {
                id: new_key,
                provider: "internal-2".into(),
                source: KeySource::Derived,
                active: true,
            },
        ],
        acl_enforced: false,
    };

    let lockbox = Lockbox::new(
        Arc::clone(&store),
        Arc::new(MemoryAuthorityStore::new()),
        ProviderRegistry::new(),
        rotated_config,
    )
    .await?;

    // Old value decrypts under the retired key.
    assert_eq!(
        lockbox.get_credential("alice", "/old/secret").await?,
        b"sealed long ago"
    );

    // New writes use the new key.
    lockbox
        .set_credential("alice", "/new/secret", b"fresh")
        .await?;
    let raw = lockbox
        .store()
        .find_credential("/new/secret")
        .await?
        .expect("credential was just written");
    assert_eq!(raw.value.expect("value present").key_id, new_key);

    Ok(())
}

#[tokio::test]
async fn unknown_key_id_is_an_integrity_error() {
    let store = Arc::new(SqliteStore::open_memory().unwrap());

    // Writer and reader use separate configs, so the reader's ring never
    // learns the key id the writer sealed with.
    let writer = Lockbox::new(
        Arc::clone(&store),
        Arc::new(MemoryAuthorityStore::new()),
        ProviderRegistry::new(),
        LockboxConfig::single_password_provider("internal", "test passphrase", SALT)
            .with_open_access(),
    )
    .await
    .unwrap();
    writer
        .set_credential("alice", "/orphan", b"value")
        .await
        .unwrap();

    let reader = Lockbox::new(
        Arc::clone(&store),
        Arc::new(MemoryAuthorityStore::new()),
        ProviderRegistry::new(),
        LockboxConfig::single_password_provider("internal", "test passphrase", SALT)
            .with_open_access(),
    )
    .await
    .unwrap();

    let err = reader.get_credential("alice", "/orphan").await.unwrap_err();
    assert!(matches!(err, LockboxError::Crypto(_)));
}

#[tokio::test]
async fn hsm_provider_end_to_end() {
    let config = LockboxConfig {
        providers: vec![ProviderConfig {
            name: "luna".into(),
            kind: ProviderKind::Hsm {
                partition: "partition-a".into(),
                partition_password: "hunter2".into(),
            },
            key_creation_enabled: true,
        }],
        keys: vec![KeyConfig {
            id: KeyId::generate(),
            provider: "luna".into(),
            source: KeySource::Label("lockbox-key-1".into()),
            active: true,
        }],
        acl_enforced: true,
    };

    // The default registry backs HSM providers with the soft device, and
    // key creation is enabled, so assembly provisions the key.
    let (_store, lockbox) = sqlite_lockbox(config).await;

    lockbox
        .set_credential("alice", "/hw/secret", b"in the device")
        .await
        .unwrap();
    assert_eq!(
        lockbox.get_credential("alice", "/hw/secret").await.unwrap(),
        b"in the device"
    );
}

#[tokio::test]
async fn certificate_credential_round_trip() {
    let authorities = Arc::new(MemoryAuthorityStore::new());
    authorities
        .save(CertificateAuthority::generate_root(DEFAULT_CA_NAME, "Lockbox Root", 3650).unwrap())
        .await
        .unwrap();

    let store = Arc::new(SqliteStore::open_memory().unwrap());
    let lockbox = Lockbox::new(
        Arc::clone(&store),
        authorities,
        ProviderRegistry::new(),
        LockboxConfig::single_password_provider("internal", "test passphrase", SALT),
    )
    .await
    .unwrap();

    let request = CertificateRequest {
        organization: Some("my-org".into()),
        state: Some("NY".into()),
        country: Some("USA".into()),
        common_name: Some("My Common Name".into()),
        alternative_names: vec!["example.com".into()],
        ..Default::default()
    };

    let issued = lockbox
        .generate_certificate("alice", "/certs/web", &request)
        .await
        .unwrap();
    assert!(issued.ca_certificate_pem.is_some());

    // The stored credential decrypts back to the same artifact.
    let bytes = lockbox.get_credential("alice", "/certs/web").await.unwrap();
    let stored: IssuedCertificate = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(stored.certificate_pem, issued.certificate_pem);
    assert_eq!(stored.private_key_pem, issued.private_key_pem);

    // And nobody else can read the private key.
    assert!(matches!(
        lockbox.get_credential("bob", "/certs/web").await,
        Err(LockboxError::AccessDenied { .. })
    ));
}
