//! Cooldown gates
//!
//! Attempt counters that throttle how often mail-triggering user actions
//! (password reset, confirmation resend, e-mail change) may run for a given
//! IP address, account or e-mail address. Counters live in a
//! [`CooldownAdapter`](courier_types::cooldown_adapter::CooldownAdapter);
//! losing them only weakens the throttling.

mod error;
mod limiter;
mod memory;
mod policy;
mod subject;

pub use error::CooldownError;
pub use limiter::CooldownGate;
pub use memory::MemoryCooldownStore;
pub use policy::CooldownPolicy;
pub use subject::CooldownSubject;

// vim: ts=4
