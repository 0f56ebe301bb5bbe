use crate::JourneyError;
use journey_types::JourneyDescriptor;
use std::collections::HashMap;

/// Process-wide index of journey descriptors, keyed by journey name.
///
/// Populated at route-registration time, then shared read-only behind an
/// `Arc`. Every journey a handler references must be registered before the
/// first request naming it arrives.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    descriptors: HashMap<String, JourneyDescriptor>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: JourneyDescriptor) -> Result<(), JourneyError> {
        if self.descriptors.contains_key(descriptor.name()) {
            return Err(JourneyError::DuplicateJourney(descriptor.name().to_string()));
        }
        self.descriptors
            .insert(descriptor.name().to_string(), descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&JourneyDescriptor> {
        self.descriptors.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_types::StateType;

    fn descriptor(name: &str) -> JourneyDescriptor {
        JourneyDescriptor::new(name, StateType::from_static("state/v1"), ["id"], false)
            .expect("descriptor")
    }

    #[test]
    fn register_and_get() {
        let mut registry = DescriptorRegistry::new();
        registry.register(descriptor("wiz")).expect("register");
        assert!(registry.get("wiz").is_some());
        assert!(registry.get("other").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = DescriptorRegistry::new();
        registry.register(descriptor("wiz")).expect("register");
        let err = registry.register(descriptor("wiz")).expect_err("duplicate");
        assert!(matches!(err, JourneyError::DuplicateJourney(name) if name == "wiz"));
    }
}
