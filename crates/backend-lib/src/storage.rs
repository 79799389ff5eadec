// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! Identity persistence with a flat-file implementation.
use async_trait::async_trait;
use authgate_common::PublicIdentity;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::{fs as tokio_fs, io::AsyncWriteExt, sync::Mutex};
use tracing::warn;
use uuid::Uuid;

/// Errors raised by an identity store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("an identity with this email already exists")]
    Duplicate,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt identity document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted identity record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: i64,
    pub token_version: i64,
}

impl Identity {
    /// Client-facing view without the password digest
    pub fn public(&self) -> PublicIdentity {
        PublicIdentity {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            created_at: self.created_at,
            token_version: self.token_version,
        }
    }
}

/// Trait for identity storage backends
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up an identity by its (normalized) email
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StorageError>;

    /// Look up an identity by id; malformed ids are simply not found
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StorageError>;

    /// Insert a new identity, failing with [`StorageError::Duplicate`] if
    /// the email is taken. This is the authoritative uniqueness check.
    async fn insert(&self, identity: &Identity) -> Result<(), StorageError>;

    /// Atomically bump `token_version` from `expected` to `expected + 1`.
    ///
    /// Returns the new version, or `None` when the stored version differs
    /// or the identity no longer exists.
    async fn compare_and_increment_version(
        &self,
        id: &str,
        expected: i64,
    ) -> Result<Option<i64>, StorageError>;

    /// Unconditionally bump `token_version`, returning the new value
    async fn increment_version(&self, id: &str) -> Result<Option<i64>, StorageError>;
}

/// Flat-file implementation of [`IdentityStore`]
///
/// Layout under `root`:
///
/// ```text
/// identities/{uuid}.json          identity document
/// email-index/{sha256(email)}    id owning the email, created with O_EXCL
/// ```
///
/// Writers are serialized by an async mutex and replace documents through
/// write-to-temp + rename, so readers never observe a torn document.
pub struct FlatFileStorage {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("identities"))?;
        std::fs::create_dir_all(root.join("email-index"))?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn identity_path(&self, id: &Uuid) -> PathBuf {
        self.root.join("identities").join(format!("{id}.json"))
    }

    fn index_path(&self, email: &str) -> PathBuf {
        let digest = Sha256::digest(email.as_bytes());
        self.root.join("email-index").join(format!("{digest:x}"))
    }

    async fn read_identity(&self, id: &Uuid) -> Result<Option<Identity>, StorageError> {
        match tokio_fs::read_to_string(self.identity_path(id)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_identity(&self, identity: &Identity, id: &Uuid) -> Result<(), StorageError> {
        let path = self.identity_path(id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(identity)?;

        let mut file = tokio_fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        tokio_fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// An index entry left behind by an interrupted insert: its id is
    /// unreadable or names no document. Callers hold the write lock.
    async fn is_orphan_claim(&self, index: &Path) -> Result<bool, StorageError> {
        let owner = match tokio_fs::read_to_string(index).await {
            Ok(owner) => owner,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
            Err(err) => return Err(err.into()),
        };
        match Uuid::parse_str(owner.trim()) {
            Ok(uuid) => Ok(!tokio_fs::try_exists(self.identity_path(&uuid)).await?),
            Err(_) => Ok(true),
        }
    }

    async fn bump(
        &self,
        id: &str,
        expected: Option<i64>,
    ) -> Result<Option<i64>, StorageError> {
        let Ok(uuid) = Uuid::parse_str(id) else {
            return Ok(None);
        };

        let _guard = self.write_lock.lock().await;
        let Some(mut identity) = self.read_identity(&uuid).await? else {
            return Ok(None);
        };
        if expected.is_some_and(|v| v != identity.token_version) {
            return Ok(None);
        }

        identity.token_version += 1;
        self.write_identity(&identity, &uuid).await?;
        Ok(Some(identity.token_version))
    }
}

#[async_trait]
impl IdentityStore for FlatFileStorage {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StorageError> {
        let id = match tokio_fs::read_to_string(self.index_path(email)).await {
            Ok(id) => id,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        self.find_by_id(id.trim()).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StorageError> {
        match Uuid::parse_str(id) {
            Ok(uuid) => self.read_identity(&uuid).await,
            Err(_) => Ok(None),
        }
    }

    async fn insert(&self, identity: &Identity) -> Result<(), StorageError> {
        let uuid = Uuid::parse_str(&identity.id).map_err(|e| {
            StorageError::Io(std::io::Error::new(ErrorKind::InvalidInput, e))
        })?;
        let index = self.index_path(&identity.email);

        let _guard = self.write_lock.lock().await;

        // claim the email first; the exclusive create is the uniqueness guard
        let mut claim = match tokio_fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&index)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                if !self.is_orphan_claim(&index).await? {
                    return Err(StorageError::Duplicate);
                }
                warn!(email = %identity.email, "reclaiming email index without an identity document");
                tokio_fs::OpenOptions::new()
                    .write(true)
                    .truncate(true)
                    .open(&index)
                    .await?
            }
            Err(err) => return Err(err.into()),
        };

        let written: Result<(), StorageError> = async {
            claim.write_all(identity.id.as_bytes()).await?;
            claim.sync_all().await?;
            self.write_identity(identity, &uuid).await
        }
        .await;

        if let Err(err) = written {
            let _ = tokio_fs::remove_file(&index).await;
            return Err(err);
        }
        Ok(())
    }

    async fn compare_and_increment_version(
        &self,
        id: &str,
        expected: i64,
    ) -> Result<Option<i64>, StorageError> {
        self.bump(id, Some(expected)).await
    }

    async fn increment_version(&self, id: &str) -> Result<Option<i64>, StorageError> {
        self.bump(id, None).await
    }
}
