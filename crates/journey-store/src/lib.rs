//! Persistence boundary for journey instances: an opaque-bytes store contract
//! plus filesystem and in-memory reference backends.

mod codec;
mod fs;
mod mem;

pub use codec::{CborCodec, CodecError, JsonCodec, StateCodec, decode_state, encode_state};
pub use fs::FsStateStore;
pub use mem::MemStateStore;

use async_trait::async_trait;
use indexmap::IndexMap;
use journey_types::StateType;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::{io, path::PathBuf, sync::Arc};

pub type StoreResult<T> = Result<T, StoreError>;
pub type DynStateStore = Arc<dyn StateStore>;

/// Property bag attached to an instance at creation time and never mutated
/// afterward.
pub type Properties = IndexMap<String, JsonValue>;

/// Persisted form of one journey instance. Entry existence is the sole source
/// of truth for "does this instance exist"; the state payload is opaque bytes
/// produced by a [`StateCodec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub journey_name: String,
    pub state_type: StateType,
    #[serde(with = "serde_bytes")]
    pub state: Vec<u8>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: Properties,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl StoreEntry {
    pub fn new(
        journey_name: impl Into<String>,
        state_type: StateType,
        state: Vec<u8>,
        properties: Properties,
    ) -> Self {
        Self {
            journey_name: journey_name.into(),
            state_type,
            state,
            properties,
            completed: false,
            deleted: false,
        }
    }
}

/// Contract implemented by every persistence backend.
///
/// All operations are keyed by the identifier's canonical string. The store
/// performs no type or lifecycle checking: payloads are opaque bytes, and
/// gating mutations against completed/deleted instances belongs entirely to
/// the layer above.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persists a brand-new entry; fails if the key is already present.
    async fn create(&self, key: &str, entry: StoreEntry) -> StoreResult<()>;

    async fn get(&self, key: &str) -> StoreResult<Option<StoreEntry>>;

    /// Replaces the serialized state of an existing entry.
    async fn update_state(&self, key: &str, state: Vec<u8>) -> StoreResult<()>;

    /// Marks an existing entry completed.
    async fn complete(&self, key: &str) -> StoreResult<()>;

    /// Removes an existing entry.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("an entry already exists for '{0}'")]
    AlreadyExists(String),
    #[error("no entry exists for '{0}'")]
    NotFound(String),
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("entry encoding error: {0}")]
    Cbor(#[from] serde_cbor::Error),
}

pub(crate) fn io_error(path: impl Into<PathBuf>, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
