pub use crate::app::App;
pub use courier_types::prelude::*;

// vim: ts=4
