pub mod identity;
pub mod credit;
pub mod documents;
pub mod notify;

pub use identity::{Actor, Capability, CapabilitySet, IdentityResolver};
pub use credit::{CreditProfile, CreditProfileLookup, CreditStatus};
pub use documents::{DocumentRenderer, Recipient, RenderedGuide, ShippingGuidePayload};
pub use notify::StatusPublisher;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
    #[error("Identity verification failed: {0}")]
    IdentityError(String),
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
