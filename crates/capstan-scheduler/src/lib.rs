//! Capstan Scheduler - admission of deployments onto clusters
//!
//! This crate provides:
//! - Resource ledger (all-or-nothing reservation, clamped release)
//! - Admission queue with priority requeue
//! - Scheduling pass and background worker

pub mod error;
pub mod ledger;
pub mod queue;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SchedulerError};
pub use ledger::{Reservation, ResourceLedger};
pub use queue::AdmissionQueue;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use types::{AdmissionOutcome, PassReport};
