//! Courier is a self-hosted outbound mail service.
//!
//! # Features
//!
//! - Durable mail queue (SQLite or PostgreSQL)
//!     - applications only insert rows, delivery happens out of band
//!     - every row is sent or failed at most once
//! - Delivery worker
//!     - in process next to the HTTP server, or as a time-boxed cron run
//! - Render endpoint
//!     - message bodies rebuilt from templates on demand
//!     - guarded by per-message capability keys ("view in browser" links)
//! - Cooldown gates for mail-triggering user actions (in memory or Redis)

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

// Re-export shared types and adapter traits from courier-types
pub use courier_types::cooldown_adapter;
pub use courier_types::error;
pub use courier_types::params;
pub use courier_types::queue_adapter;
pub use courier_types::types;

// Feature crate re-exports
pub use courier_core::cooldown;
pub use courier_email as email;

// Local modules
pub mod app;
pub mod prelude;
pub mod routes;

pub use crate::app::{App, AppBuilder};

// vim: ts=4
