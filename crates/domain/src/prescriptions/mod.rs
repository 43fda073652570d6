/// Prescription aggregate
pub mod aggregate;

/// Commands
pub mod commands;

/// Events
pub mod events;

/// Input DTOs
pub mod inputs;

/// Transition input rules
pub mod validation;

/// Clock, dispense ids and limits injected into the aggregate
pub mod services;

/// Persisted prescription list
pub mod store;

/// Seed data
pub mod seed;

/// Queries fed by committed events
pub mod view;

/// Dispense workflow engine
pub mod workflow;

/// Wiring
pub mod cqrs;

pub use aggregate::{
    Attachment, DispenseItem, NewPrescription, Prescription, PrescriptionStatus, Priority,
    AGGREGATE_TYPE,
};
pub use commands::Command;
pub use events::Event;
pub use services::{AttachmentLimits, Services};
pub use store::{PrescriptionFilter, PrescriptionStore, PrescriptionSummary};
pub use view::{ActivityQuery, EventBroadcast};
pub use workflow::{DispenseReceipt, DispenseWorkflow};
