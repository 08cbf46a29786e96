//! Availability and conflict engine for shared club facilities.
//!
//! Collaborators hold an [`engine::Engine`] and call it with validated
//! requests: conflict checks, bulk hold syncs, bookings and their payment
//! reconciliation, and timeline projections for display.

pub mod calendar;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod journal;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
