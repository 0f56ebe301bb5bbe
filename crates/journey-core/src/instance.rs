use crate::JourneyError;
use journey_store::{DynStateStore, Properties, StateCodec, StoreEntry, decode_state, encode_state};
use journey_types::{JourneyInstanceId, JourneyState, StateType};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One resolved journey instance: the serialized state payload plus monotonic
/// lifecycle flags, gated so no mutation can bypass the store.
///
/// The in-memory cell holds the payload in its serialized form; typed reads
/// reconstitute it on demand after asserting the caller's type against the
/// declared tag. Every mutation persists through the store *before* touching
/// the cell, and the cell's mutex is held across that await. A failed store
/// call therefore leaves the in-memory view untouched, and the view never
/// diverges from the last successful persist.
pub struct JourneyInstance {
    journey_name: String,
    id: JourneyInstanceId,
    key: String,
    state_type: StateType,
    properties: Properties,
    store: DynStateStore,
    codec: Arc<dyn StateCodec>,
    cell: Mutex<LifecycleCell>,
}

struct LifecycleCell {
    state: Vec<u8>,
    completed: bool,
    deleted: bool,
}

impl JourneyInstance {
    pub(crate) fn from_entry(
        id: JourneyInstanceId,
        entry: StoreEntry,
        store: DynStateStore,
        codec: Arc<dyn StateCodec>,
    ) -> Self {
        let key = id.to_canonical_string();
        Self {
            journey_name: entry.journey_name,
            id,
            key,
            state_type: entry.state_type,
            properties: entry.properties,
            store,
            codec,
            cell: Mutex::new(LifecycleCell {
                state: entry.state,
                completed: entry.completed,
                deleted: entry.deleted,
            }),
        }
    }

    pub fn journey_name(&self) -> &str {
        &self.journey_name
    }

    pub fn id(&self) -> &JourneyInstanceId {
        &self.id
    }

    /// The canonical identifier string this instance is persisted under.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state_type(&self) -> &StateType {
        &self.state_type
    }

    /// Properties established at creation. Never mutated afterward.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub async fn completed(&self) -> bool {
        self.cell.lock().await.completed
    }

    pub async fn deleted(&self) -> bool {
        self.cell.lock().await.deleted
    }

    /// The current state payload. Readable regardless of lifecycle stage;
    /// always reflects the last successfully persisted value.
    pub async fn state<T: JourneyState>(&self) -> Result<T, JourneyError> {
        self.ensure_state_type::<T>()?;
        let cell = self.cell.lock().await;
        Ok(decode_state(&*self.codec, &cell.state)?)
    }

    /// Replaces the state payload. Allowed only while the instance is active.
    pub async fn update_state<T: JourneyState>(&self, state: &T) -> Result<(), JourneyError> {
        self.ensure_state_type::<T>()?;
        let bytes = encode_state(&*self.codec, state)?;
        let mut cell = self.cell.lock().await;
        if cell.deleted {
            return Err(self.invalid_state("deleted"));
        }
        if cell.completed {
            return Err(self.invalid_state("completed"));
        }
        self.store.update_state(&self.key, bytes.clone()).await?;
        cell.state = bytes;
        Ok(())
    }

    /// Marks the instance completed. Idempotent: a second call is a silent
    /// no-op and the store is not re-invoked. Fails once deleted.
    pub async fn complete(&self) -> Result<(), JourneyError> {
        let mut cell = self.cell.lock().await;
        if cell.deleted {
            return Err(self.invalid_state("deleted"));
        }
        if cell.completed {
            return Ok(());
        }
        self.store.complete(&self.key).await?;
        cell.completed = true;
        Ok(())
    }

    /// Deletes the instance. Allowed from active or completed; a second call
    /// is a silent no-op. Terminal: nothing mutates a deleted instance.
    pub async fn delete(&self) -> Result<(), JourneyError> {
        let mut cell = self.cell.lock().await;
        if cell.deleted {
            return Ok(());
        }
        self.store.delete(&self.key).await?;
        cell.deleted = true;
        Ok(())
    }

    fn ensure_state_type<T: JourneyState>(&self) -> Result<(), JourneyError> {
        if T::state_type() != self.state_type {
            return Err(JourneyError::IncompatibleStateType {
                journey: self.journey_name.clone(),
                declared: self.state_type.clone(),
                requested: T::state_type(),
            });
        }
        Ok(())
    }

    fn invalid_state(&self, stage: &'static str) -> JourneyError {
        JourneyError::InvalidState {
            id: self.key.clone(),
            stage,
        }
    }
}

impl std::fmt::Debug for JourneyInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JourneyInstance")
            .field("journey_name", &self.journey_name)
            .field("key", &self.key)
            .field("state_type", &self.state_type)
            .finish()
    }
}
