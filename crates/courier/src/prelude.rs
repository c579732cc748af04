pub use courier_core::prelude::*;

// vim: ts=4
