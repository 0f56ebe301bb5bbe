use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use std::{borrow::Cow, fmt};

/// Stable, human-readable tag identifying a journey's state payload type.
///
/// The tag is what gets persisted next to the serialized payload, so it must
/// stay constant across builds and processes. Declared types provide theirs
/// through [`JourneyState::STATE_TYPE`]; tags read back from a store entry
/// are owned strings.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StateType(Cow<'static, str>);

impl StateType {
    pub const fn from_static(tag: &'static str) -> Self {
        StateType(Cow::Borrowed(tag))
    }

    pub fn new(tag: impl Into<String>) -> Self {
        StateType(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StateType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StateType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(StateType::new(s))
    }
}

impl From<&'static str> for StateType {
    fn from(value: &'static str) -> Self {
        StateType::from_static(value)
    }
}

/// Marker trait for journey state payloads.
///
/// Implementations pick an explicit tag rather than relying on
/// `std::any::type_name`, which is not stable enough to key persisted data.
pub trait JourneyState: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable tag persisted alongside the serialized payload.
    const STATE_TYPE: &'static str;

    fn state_type() -> StateType {
        StateType::from_static(Self::STATE_TYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Checkout {
        total_cents: u64,
    }

    impl JourneyState for Checkout {
        const STATE_TYPE: &'static str = "checkout/v1";
    }

    #[test]
    fn tag_equality_is_string_equality() {
        assert_eq!(Checkout::state_type(), StateType::new("checkout/v1"));
        assert_ne!(Checkout::state_type(), StateType::from_static("checkout/v2"));
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Checkout::state_type()).expect("encode");
        assert_eq!(json, "\"checkout/v1\"");
        let back: StateType = serde_json::from_str(&json).expect("decode");
        assert_eq!(back, Checkout::state_type());
    }
}
