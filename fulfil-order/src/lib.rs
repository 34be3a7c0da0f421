pub mod models;
pub mod methods;
pub mod records;
pub mod error;
pub mod repository;
pub mod memory;
pub mod routing;
pub mod validation;
pub mod rules;
pub mod recipient;
pub mod guards;
pub mod writer;
pub mod ledger;
pub mod messenger;
pub mod carriers;
pub mod lifecycle;
pub mod ingest;

pub use models::{MessengerState, Money, NewOrder, Order, OrderStatus, OrderSummary, Precondition};
pub use methods::{DeliveryMethod, PaymentMethod};
pub use records::{
    Carrier, CarrierChangeLog, CashEntryStatus, CashLedgerEntry, DeliveryTracking, EvidenceRef, TrackingEvent,
    ValidationStatus, WalletValidation,
};
pub use error::{OrderError, OrderResult};
pub use repository::{LedgerInsert, StoreError, Stores};
pub use routing::{Department, PaymentRoutingPolicy, RoutingDecision};
pub use validation::{PaymentRejection, PaymentSubmission, PaymentValidationEngine, ToleranceRule, ValidationReport};
pub use rules::EngineRules;
pub use ledger::{CashLedger, RegisterCash, RegisterOutcome};
pub use messenger::MessengerAssignment;
pub use carriers::CarrierDirectory;
pub use lifecycle::{AutoDelivery, Classification, OrderLifecycle, ReadyOutcome};
pub use ingest::{IngestAck, IngestError, IngestOutcome, WebhookIngestor};
