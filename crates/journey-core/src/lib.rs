//! Journey instance resolution and lifecycle: the descriptor registry, the
//! per-request scope and its instance cache, the lifecycle-gated instance
//! object, and the provider orchestrating them against a state store.

mod error;
mod instance;
mod provider;
mod registry;
mod scope;

pub use error::JourneyError;
pub use instance::JourneyInstance;
pub use provider::JourneyProvider;
pub use registry::DescriptorRegistry;
pub use scope::{JourneyMetadata, RequestScope};
