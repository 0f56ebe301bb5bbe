//! Journey metadata core: descriptors, state-type tags, request-derived data,
//! and canonical instance identifiers.

mod descriptor;
mod identity;
mod request;
mod state;

pub use descriptor::{DescriptorError, JourneyDescriptor};
pub use identity::{IdentityError, JourneyInstanceId, UNIQUE_TOKEN_KEY};
pub use request::{KeyValues, RequestData};
pub use state::{JourneyState, StateType};
