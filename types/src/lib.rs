//! Core value types for pledge.
//!
//! This crate holds the data that flows through promises: settlement status,
//! identifiers, and failure reasons. Nothing here schedules or performs IO.

mod ids;
mod reason;
mod status;

pub use ids::{PromiseId, TimerId};
pub use reason::{AggregateError, ChainCycle, Reason};
pub use status::{Settled, Status};
