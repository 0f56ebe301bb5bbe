use crate::{JourneyState, StateType, identity::UNIQUE_TOKEN_KEY};
use thiserror::Error;

/// Error raised while building a [`JourneyDescriptor`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("journey name must not be empty")]
    EmptyName,
    #[error("duplicate dependent key '{0}'")]
    DuplicateDependentKey(String),
    #[error("dependent key '{0}' collides with the reserved unique-token key")]
    ReservedKey(String),
}

/// Immutable metadata describing one journey type: its name, the tag of its
/// state payload, the ordered request keys its identity depends on, and
/// whether each instance carries a freshly minted unique token.
///
/// Built once at route-registration time and indexed by name in a
/// process-wide registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneyDescriptor {
    name: String,
    state_type: StateType,
    dependent_keys: Vec<String>,
    requires_unique_token: bool,
}

impl JourneyDescriptor {
    pub fn new<K>(
        name: impl Into<String>,
        state_type: StateType,
        dependent_keys: impl IntoIterator<Item = K>,
        requires_unique_token: bool,
    ) -> Result<Self, DescriptorError>
    where
        K: Into<String>,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(DescriptorError::EmptyName);
        }
        let mut keys: Vec<String> = Vec::new();
        for key in dependent_keys {
            let key = key.into();
            if key.eq_ignore_ascii_case(UNIQUE_TOKEN_KEY) {
                return Err(DescriptorError::ReservedKey(key));
            }
            if keys.iter().any(|seen| seen.eq_ignore_ascii_case(&key)) {
                return Err(DescriptorError::DuplicateDependentKey(key));
            }
            keys.push(key);
        }
        Ok(Self {
            name,
            state_type,
            dependent_keys: keys,
            requires_unique_token,
        })
    }

    /// Convenience constructor taking the state type from a [`JourneyState`]
    /// implementation.
    pub fn for_state<T, K>(
        name: impl Into<String>,
        dependent_keys: impl IntoIterator<Item = K>,
        requires_unique_token: bool,
    ) -> Result<Self, DescriptorError>
    where
        T: JourneyState,
        K: Into<String>,
    {
        Self::new(name, T::state_type(), dependent_keys, requires_unique_token)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state_type(&self) -> &StateType {
        &self.state_type
    }

    /// Dependent keys in declaration order. Order matters: it fixes the
    /// canonical serialization of every identifier derived from this
    /// descriptor.
    pub fn dependent_keys(&self) -> &[String] {
        &self.dependent_keys
    }

    pub fn requires_unique_token(&self) -> bool {
        self.requires_unique_token
    }
}
