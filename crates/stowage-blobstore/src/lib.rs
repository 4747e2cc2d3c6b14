use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Startup probe: attempts and fixed backoff before giving up on the
/// storage directory. A failed probe fails process startup.
const INIT_ATTEMPTS: u32 = 5;
const INIT_BACKOFF: Duration = Duration::from_secs(1);

/// Content-addressed blob store on local disk.
///
/// Each blob lives at `{dir}/{sha256-hex}`. Storing is idempotent: identical
/// bytes always resolve to the same hash and the same file, so uploads of
/// duplicate content deduplicate here rather than in the metadata layer.
/// Nothing in this store tracks ownership; orphaned blobs are harmless and
/// left to an external reaper.
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    /// Open the store, probing the directory for writability with bounded
    /// retries so a slow-mounting volume does not kill the process on the
    /// first try.
    pub async fn open(dir: PathBuf) -> Result<Self> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::probe(&dir).await {
                Ok(()) => break,
                Err(e) if attempt < INIT_ATTEMPTS => {
                    warn!(
                        "Blob store at {} not ready (attempt {attempt}): {e}. Retrying...",
                        dir.display()
                    );
                    tokio::time::sleep(INIT_BACKOFF).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!(
                            "blob store at {} unavailable after {INIT_ATTEMPTS} attempts",
                            dir.display()
                        )
                    });
                }
            }
        }

        info!("Blob store directory: {}", dir.display());
        Ok(Self { dir })
    }

    async fn probe(dir: &PathBuf) -> Result<()> {
        fs::create_dir_all(dir).await?;
        let marker = dir.join(format!(".probe-{}", Uuid::new_v4()));
        fs::write(&marker, b"").await?;
        fs::remove_file(&marker).await?;
        Ok(())
    }

    /// Path of the blob for a content hash.
    pub fn blob_path(&self, hash: &str) -> PathBuf {
        self.dir.join(hash)
    }

    /// Store bytes under their SHA-256 and return the hash. Re-storing
    /// existing content is a no-op that returns the same hash.
    pub async fn store(&self, bytes: &[u8]) -> Result<String> {
        if bytes.is_empty() {
            bail!("refusing to store an empty blob");
        }

        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hash = hex::encode(hasher.finalize());

        let path = self.blob_path(&hash);
        if fs::try_exists(&path).await? {
            return Ok(hash);
        }

        // Write to a temp name first so a crashed write never leaves a
        // half-written blob under its final hash.
        let tmp = self.dir.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);
        fs::rename(&tmp, &path).await?;

        Ok(hash)
    }

    pub async fn contains(&self, hash: &str) -> Result<bool> {
        Ok(fs::try_exists(self.blob_path(hash)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> BlobStore {
        let dir = std::env::temp_dir().join(format!("stowage-blobs-{}", Uuid::new_v4()));
        BlobStore::open(dir).await.unwrap()
    }

    #[tokio::test]
    async fn store_is_content_addressed_and_idempotent() {
        let store = test_store().await;

        let first = store.store(b"hello stowage").await.unwrap();
        let second = store.store(b"hello stowage").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64); // sha256 hex
        assert!(store.contains(&first).await.unwrap());

        let other = store.store(b"different bytes").await.unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn empty_blobs_are_rejected() {
        let store = test_store().await;
        assert!(store.store(b"").await.is_err());
    }
}
