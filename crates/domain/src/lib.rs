//! Hospital Pharmacy Domain Models

/// Prescription aggregate and dispense workflow
pub mod prescriptions;

/// Role-based view gating
pub mod roles;

/// Pharmacy activity trail
pub mod activity;

/// Durable key-value slots
pub mod persistence;

/// Environment configuration
pub mod config;

/// Domain errors
pub mod errors;

/// Domain events wrapper
pub mod event;

pub use config::Config;
pub use errors::Error;
pub use event::DomainEvent;
