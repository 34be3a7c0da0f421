pub mod events;
pub mod pii;

pub use events::{InvoiceEvent, InvoiceWebhook, StatusChangedEvent};
pub use pii::Masked;
