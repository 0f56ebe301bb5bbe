use journey_store::{CodecError, StoreError};
use journey_types::{IdentityError, StateType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JourneyError {
    /// No request context is available to resolve identity from. Raised for
    /// journey operations against a detached scope; never recovered locally.
    #[error("no request context available to resolve journey data")]
    NoRequestContext,
    /// The current request's handler declared no journey metadata.
    #[error("no journey metadata attached to the current request")]
    NoJourneyMetadata,
    /// Metadata names a journey nobody registered. A configuration bug,
    /// always surfaced, never absorbed into a resolution miss.
    #[error("journey '{0}' is not registered")]
    UnknownJourney(String),
    #[error("journey '{0}' is already registered")]
    DuplicateJourney(String),
    /// The caller's assumed payload type disagrees with the declared one.
    #[error("state type mismatch for journey '{journey}': declared '{declared}', requested '{requested}'")]
    IncompatibleStateType {
        journey: String,
        declared: StateType,
        requested: StateType,
    },
    /// A freshly derived identifier collided with a persisted entry.
    #[error("an instance already exists for '{0}'")]
    InstanceAlreadyExists(String),
    /// Mutation attempted on a completed or deleted instance.
    #[error("instance '{id}' is {stage} and can no longer be mutated")]
    InvalidState { id: String, stage: &'static str },
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}
