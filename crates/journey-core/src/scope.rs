use crate::{JourneyError, JourneyInstance};
use journey_types::RequestData;
use std::sync::{Arc, RwLock};

/// Journey metadata a matched handler declared at route-registration time.
/// How it gets attached to a request is the host framework's business; this
/// is the resolvable product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneyMetadata {
    journey_name: String,
}

impl JourneyMetadata {
    pub fn new(journey_name: impl Into<String>) -> Self {
        Self {
            journey_name: journey_name.into(),
        }
    }

    pub fn journey_name(&self) -> &str {
        &self.journey_name
    }
}

/// Explicit per-request context threaded through every provider call.
///
/// Lives exactly one inbound request and is dropped afterward. Besides the
/// request-derived data and handler metadata it owns the request-scoped
/// instance cache, so a request resolves its instance against the store at
/// most once.
pub struct RequestScope {
    parts: Option<ScopeParts>,
    resolved: RwLock<Option<Arc<JourneyInstance>>>,
}

struct ScopeParts {
    data: RequestData,
    metadata: Option<JourneyMetadata>,
}

impl RequestScope {
    pub fn new(data: RequestData, metadata: Option<JourneyMetadata>) -> Self {
        Self {
            parts: Some(ScopeParts { data, metadata }),
            resolved: RwLock::new(None),
        }
    }

    /// A scope with no request behind it (background jobs, CLI entry points).
    /// Journey operations against it fail with
    /// [`JourneyError::NoRequestContext`].
    pub fn detached() -> Self {
        Self {
            parts: None,
            resolved: RwLock::new(None),
        }
    }

    pub fn request_data(&self) -> Result<&RequestData, JourneyError> {
        self.parts
            .as_ref()
            .map(|parts| &parts.data)
            .ok_or(JourneyError::NoRequestContext)
    }

    pub fn metadata(&self) -> Result<Option<&JourneyMetadata>, JourneyError> {
        self.parts
            .as_ref()
            .map(|parts| parts.metadata.as_ref())
            .ok_or(JourneyError::NoRequestContext)
    }

    /// The instance already resolved for this request, if any.
    pub fn cached_instance(&self) -> Option<Arc<JourneyInstance>> {
        self.resolved.read().unwrap().clone()
    }

    /// Insert-if-absent, then re-read: concurrent populators within one
    /// request all converge on whichever instance won the race. Best-effort,
    /// since "first" is not meaningfully orderable across a request's
    /// concurrent branches.
    pub(crate) fn cache_if_absent(&self, instance: Arc<JourneyInstance>) -> Arc<JourneyInstance> {
        let mut guard = self.resolved.write().unwrap();
        guard.get_or_insert(instance).clone()
    }

    /// Unconditionally installs a freshly created instance as this request's
    /// current one.
    pub(crate) fn cache_replace(&self, instance: Arc<JourneyInstance>) {
        *self.resolved.write().unwrap() = Some(instance);
    }
}

impl std::fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScope")
            .field("detached", &self.parts.is_none())
            .field("resolved", &self.resolved.read().unwrap().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_scope_has_no_request_data() {
        let scope = RequestScope::detached();
        assert!(matches!(
            scope.request_data(),
            Err(JourneyError::NoRequestContext)
        ));
        assert!(matches!(
            scope.metadata(),
            Err(JourneyError::NoRequestContext)
        ));
    }

    #[test]
    fn live_scope_exposes_parts() {
        let scope = RequestScope::new(
            RequestData::from_pairs([("id", "7")]),
            Some(JourneyMetadata::new("wiz")),
        );
        assert!(scope.request_data().expect("data").contains("id"));
        assert_eq!(
            scope.metadata().expect("metadata").map(|m| m.journey_name()),
            Some("wiz")
        );
        assert!(scope.cached_instance().is_none());
    }
}
