use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Content-addressed blob store: each artifact is named by the SHA-256 of
/// its bytes, so identical regressors share one file.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn key_for(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.bin"))
    }

    /// Store `bytes` and return their key
    pub async fn put(&self, bytes: &[u8]) -> Result<String> {
        let key = Self::key_for(bytes);
        let path = self.path_for(&key);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(key);
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create artifact dir {}", self.dir.display()))?;

        // Rename is atomic, so readers never see a partial file
        let staging = self.dir.join(format!("{key}.{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&staging, bytes)
            .await
            .with_context(|| format!("failed to write {}", staging.display()))?;
        tokio::fs::rename(&staging, &path)
            .await
            .with_context(|| format!("failed to move artifact into {}", path.display()))?;
        Ok(key)
    }

    /// Load an artifact, rejecting files whose content no longer matches the key
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read artifact {}", path.display()))?;

        let actual = Self::key_for(&bytes);
        if actual != key {
            bail!("artifact {key} is corrupt (content hash {actual})");
        }
        Ok(bytes)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("artifacts"));

        let key = store.put(b"forest bytes").await.unwrap();
        assert_eq!(key, ArtifactStore::key_for(b"forest bytes"));
        assert_eq!(store.get(&key).await.unwrap(), b"forest bytes");

        // identical content reuses the same file
        assert_eq!(store.put(b"forest bytes").await.unwrap(), key);
        let mut entries = tokio::fs::read_dir(store.dir()).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_corrupt_and_missing_artifacts_fail() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let key = store.put(b"original").await.unwrap();
        tokio::fs::write(store.path_for(&key), b"tampered").await.unwrap();
        let err = store.get(&key).await.unwrap_err();
        assert!(err.to_string().contains("corrupt"));

        assert!(store.get("0000").await.is_err());
    }
}
