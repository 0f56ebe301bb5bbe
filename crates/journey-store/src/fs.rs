use crate::{StateStore, StoreEntry, StoreError, StoreResult, codec::to_canonical_cbor, io_error};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::{
    fmt,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

/// Filesystem backend rooted at `<root>/.journeys`.
///
/// Entries live in one canonical-CBOR file each, named by the SHA-256 of the
/// canonical identifier string. Creation opens the file with `create_new`, so
/// the first writer wins even across processes; rewrites go through a temp
/// file plus rename.
#[derive(Clone)]
pub struct FsStateStore {
    entries_dir: PathBuf,
}

impl fmt::Debug for FsStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsStateStore")
            .field("entries_dir", &self.entries_dir)
            .finish()
    }
}

impl FsStateStore {
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let entries_dir = root.as_ref().join(".journeys").join("sha256");
        fs::create_dir_all(&entries_dir).map_err(|e| io_error(&entries_dir, e))?;
        Ok(Self { entries_dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.entries_dir.join(hex::encode(digest))
    }

    fn read_entry(&self, key: &str) -> StoreResult<Option<StoreEntry>> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(path, err)),
        };
        Ok(Some(serde_cbor::from_slice(&bytes)?))
    }

    fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn rewrite(&self, key: &str, entry: &StoreEntry) -> StoreResult<()> {
        let path = self.entry_path(key);
        let bytes = to_canonical_cbor(entry)?;
        let tmp = path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)
            .map_err(|e| io_error(&tmp, e))?;
        file.write_all(&bytes).map_err(|e| io_error(&tmp, e))?;
        file.sync_all().map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))
    }
}

#[async_trait]
impl StateStore for FsStateStore {
    async fn create(&self, key: &str, entry: StoreEntry) -> StoreResult<()> {
        let path = self.entry_path(key);
        let bytes = to_canonical_cbor(&entry)?;
        match Self::write_new(&path, &bytes) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(key.to_string()))
            }
            Err(err) => Err(io_error(path, err)),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoreEntry>> {
        self.read_entry(key)
    }

    async fn update_state(&self, key: &str, state: Vec<u8>) -> StoreResult<()> {
        let mut entry = self
            .read_entry(key)?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        entry.state = state;
        self.rewrite(key, &entry)
    }

    async fn complete(&self, key: &str) -> StoreResult<()> {
        let mut entry = self
            .read_entry(key)?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        entry.completed = true;
        self.rewrite(key, &entry)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(err) => Err(io_error(path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_types::StateType;
    use tempfile::TempDir;

    fn entry(state: &[u8]) -> StoreEntry {
        StoreEntry::new(
            "wiz",
            StateType::from_static("state/v1"),
            state.to_vec(),
            Default::default(),
        )
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = TempDir::new().expect("tmp");
        {
            let store = FsStateStore::open(dir.path()).expect("open");
            store.create("wiz?id=1", entry(b"one")).await.expect("create");
        }
        let store = FsStateStore::open(dir.path()).expect("reopen");
        let loaded = store.get("wiz?id=1").await.expect("get").expect("entry");
        assert_eq!(loaded.journey_name, "wiz");
        assert_eq!(loaded.state, b"one");
    }

    #[tokio::test]
    async fn create_is_first_writer_wins() {
        let dir = TempDir::new().expect("tmp");
        let store = FsStateStore::open(dir.path()).expect("open");
        store.create("wiz?id=1", entry(b"one")).await.expect("create");
        let err = store.create("wiz?id=1", entry(b"two")).await.expect_err("dup");
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        let loaded = store.get("wiz?id=1").await.expect("get").expect("entry");
        assert_eq!(loaded.state, b"one");
    }

    #[tokio::test]
    async fn update_complete_delete_cycle() {
        let dir = TempDir::new().expect("tmp");
        let store = FsStateStore::open(dir.path()).expect("open");
        store.create("wiz?id=1", entry(b"one")).await.expect("create");
        store
            .update_state("wiz?id=1", b"two".to_vec())
            .await
            .expect("update");
        store.complete("wiz?id=1").await.expect("complete");
        let loaded = store.get("wiz?id=1").await.expect("get").expect("entry");
        assert_eq!(loaded.state, b"two");
        assert!(loaded.completed);
        store.delete("wiz?id=1").await.expect("delete");
        assert!(store.get("wiz?id=1").await.expect("get").is_none());
        let err = store.delete("wiz?id=1").await.expect_err("gone");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn distinct_keys_do_not_collide() {
        let dir = TempDir::new().expect("tmp");
        let store = FsStateStore::open(dir.path()).expect("open");
        store.create("wiz?id=1", entry(b"one")).await.expect("create");
        store.create("wiz?id=2", entry(b"two")).await.expect("create");
        assert_eq!(
            store.get("wiz?id=2").await.expect("get").expect("entry").state,
            b"two"
        );
    }
}
