//! Core infrastructure for Courier.
//!
//! Application state shared by the HTTP handlers and the delivery worker,
//! the option set it is built from, and the cooldown gate that throttles
//! mail-triggering user actions.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod app;
pub mod cooldown;
pub mod extensions;
pub mod prelude;

pub use app::{App, AppBuilderOpts, AppState, SmtpOpts, TlsMode, VERSION};
pub use cooldown::{CooldownGate, CooldownPolicy, CooldownSubject};

// vim: ts=4
