//! Shared types, adapter traits, and core utilities for Courier.
//!
//! This crate contains the foundational types that are shared between the
//! application crates and all adapter implementations. Keeping them apart
//! lets the storage adapters compile without pulling in the mail stack.

pub mod cooldown_adapter;
pub mod error;
pub mod params;
pub mod prelude;
pub mod queue_adapter;
pub mod types;

// vim: ts=4
