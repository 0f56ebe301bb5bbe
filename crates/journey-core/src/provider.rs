use crate::{DescriptorRegistry, JourneyError, JourneyInstance, RequestScope};
use journey_store::{
    CborCodec, DynStateStore, Properties, StateCodec, StoreEntry, encode_state,
};
use journey_types::{JourneyDescriptor, JourneyInstanceId, JourneyState};
use std::{future::Future, sync::Arc};

/// Resolves, creates, and caches journey instances for request scopes.
///
/// Owns nothing per-request: all request-lived state sits in the
/// [`RequestScope`] passed into each call, so one provider serves every
/// request in the process.
pub struct JourneyProvider {
    store: DynStateStore,
    codec: Arc<dyn StateCodec>,
    registry: Arc<DescriptorRegistry>,
}

impl JourneyProvider {
    /// Builds a provider over the given store and registry with the default
    /// canonical-CBOR codec.
    pub fn new(store: DynStateStore, registry: Arc<DescriptorRegistry>) -> Self {
        Self {
            store,
            codec: Arc::new(CborCodec),
            registry,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn StateCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Looks up the descriptor for the journey the current request's handler
    /// declared. With `require`, missing metadata is an error; metadata
    /// naming an unregistered journey is always one, since that is a
    /// configuration bug rather than a resolution miss.
    pub fn resolve_descriptor(
        &self,
        scope: &RequestScope,
        require: bool,
    ) -> Result<Option<&JourneyDescriptor>, JourneyError> {
        let Some(metadata) = scope.metadata()? else {
            return if require {
                Err(JourneyError::NoJourneyMetadata)
            } else {
                Ok(None)
            };
        };
        match self.registry.get(metadata.journey_name()) {
            Some(descriptor) => Ok(Some(descriptor)),
            None => Err(JourneyError::UnknownJourney(
                metadata.journey_name().to_string(),
            )),
        }
    }

    /// Locates the instance the current request already names, if any.
    ///
    /// Misses (no metadata, unresolvable identifier, no persisted entry, or
    /// an entry that fails validation) come back as `Ok(None)`. Stale and
    /// foreign identifiers routinely arrive via tampered or reused links, so
    /// they are treated as absent rather than as errors. The winner lands in
    /// the request cache; later calls within the same request return it
    /// without touching the store again.
    pub async fn try_resolve_existing(
        &self,
        scope: &RequestScope,
    ) -> Result<Option<Arc<JourneyInstance>>, JourneyError> {
        if let Some(instance) = scope.cached_instance() {
            return Ok(Some(instance));
        }
        let Some(descriptor) = self.resolve_descriptor(scope, false)? else {
            return Ok(None);
        };
        let data = scope.request_data()?;
        let Some(id) = JourneyInstanceId::try_resolve(descriptor, data) else {
            return Ok(None);
        };
        let key = id.to_canonical_string();
        let Some(entry) = self.store.get(&key).await? else {
            return Ok(None);
        };
        if entry.journey_name != descriptor.name() {
            log::warn!(
                "entry '{key}' belongs to journey '{}', not '{}'; treating as absent",
                entry.journey_name,
                descriptor.name()
            );
            return Ok(None);
        }
        if entry.state_type != *descriptor.state_type() {
            log::warn!(
                "entry '{key}' has state type '{}', expected '{}'; treating as absent",
                entry.state_type,
                descriptor.state_type()
            );
            return Ok(None);
        }
        if entry.deleted {
            log::debug!("entry '{key}' is deleted; treating as absent");
            return Ok(None);
        }
        let instance = Arc::new(JourneyInstance::from_entry(
            id,
            entry,
            self.store.clone(),
            self.codec.clone(),
        ));
        Ok(Some(scope.cache_if_absent(instance)))
    }

    /// Creates and persists a new instance for the current request.
    ///
    /// Derives a fresh identifier, minting a new unique token when the
    /// descriptor requires one. The caller must propagate that token (say, in
    /// a follow-up redirect) or the new instance becomes unreachable.
    pub async fn create_instance<T: JourneyState>(
        &self,
        scope: &RequestScope,
        state: &T,
        properties: Properties,
    ) -> Result<Arc<JourneyInstance>, JourneyError> {
        let descriptor = self.require_descriptor(scope)?;
        ensure_state_type::<T>(descriptor)?;
        let data = scope.request_data()?;
        let id = JourneyInstanceId::derive(descriptor, data)?;
        let key = id.to_canonical_string();
        // Fresh identifiers should never collide; check anyway before
        // overwriting someone else's entry.
        if self.store.get(&key).await?.is_some() {
            return Err(JourneyError::InstanceAlreadyExists(key));
        }
        let entry = StoreEntry::new(
            descriptor.name(),
            descriptor.state_type().clone(),
            encode_state(&*self.codec, state)?,
            properties,
        );
        self.store.create(&key, entry.clone()).await?;
        log::debug!("created journey instance '{key}'");
        let instance = Arc::new(JourneyInstance::from_entry(
            id,
            entry,
            self.store.clone(),
            self.codec.clone(),
        ));
        scope.cache_replace(instance.clone());
        Ok(instance)
    }

    /// Returns the request's existing instance, or creates one from the
    /// factory. The factory runs only on the create path, exactly once.
    pub async fn get_or_create_instance<T, F>(
        &self,
        scope: &RequestScope,
        properties: Properties,
        factory: F,
    ) -> Result<Arc<JourneyInstance>, JourneyError>
    where
        T: JourneyState,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.try_resolve_existing(scope).await? {
            return Ok(existing);
        }
        let state = factory();
        self.create_instance(scope, &state, properties).await
    }

    /// [`Self::get_or_create_instance`] with a suspending factory.
    pub async fn get_or_create_instance_async<T, F, Fut>(
        &self,
        scope: &RequestScope,
        properties: Properties,
        factory: F,
    ) -> Result<Arc<JourneyInstance>, JourneyError>
    where
        T: JourneyState,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(existing) = self.try_resolve_existing(scope).await? {
            return Ok(existing);
        }
        let state = factory().await;
        self.create_instance(scope, &state, properties).await
    }

    /// True iff the instance the current request resolves to carries the
    /// candidate identifier. After a create minted a fresh token, callers use
    /// this to notice the request's identity moved and redirect.
    pub async fn is_current_instance(
        &self,
        scope: &RequestScope,
        candidate: &JourneyInstanceId,
    ) -> Result<bool, JourneyError> {
        Ok(self
            .try_resolve_existing(scope)
            .await?
            .is_some_and(|instance| instance.id() == candidate))
    }

    fn require_descriptor(&self, scope: &RequestScope) -> Result<&JourneyDescriptor, JourneyError> {
        self.resolve_descriptor(scope, true)?
            .ok_or(JourneyError::NoJourneyMetadata)
    }
}

fn ensure_state_type<T: JourneyState>(descriptor: &JourneyDescriptor) -> Result<(), JourneyError> {
    if T::state_type() != *descriptor.state_type() {
        return Err(JourneyError::IncompatibleStateType {
            journey: descriptor.name().to_string(),
            declared: descriptor.state_type().clone(),
            requested: T::state_type(),
        });
    }
    Ok(())
}

impl std::fmt::Debug for JourneyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JourneyProvider")
            .field("codec", &self.codec.name())
            .field("registered", &self.registry.len())
            .finish()
    }
}
