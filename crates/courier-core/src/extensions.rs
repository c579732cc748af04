//! Type-keyed storage for feature state on AppState
//!
//! Feature crates (mail rendering, transport) register their own state here
//! so the core crate does not depend on them.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct Extensions {
	entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a value; a previous value of the same type is replaced
	pub fn insert<T: Send + Sync + 'static>(&mut self, val: T) -> &mut Self {
		self.entries.insert(TypeId::of::<T>(), Arc::new(val));
		self
	}

	pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
		self.entries.get(&TypeId::of::<T>()).and_then(|entry| entry.downcast_ref::<T>())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, PartialEq)]
	struct Marker(u32);

	#[test]
	fn test_insert_and_replace() {
		let mut ext = Extensions::new();
		assert!(ext.get::<Marker>().is_none());

		ext.insert(Marker(1)).insert(String::from("x"));
		assert_eq!(ext.get::<Marker>(), Some(&Marker(1)));
		assert_eq!(ext.len(), 2);

		ext.insert(Marker(2));
		assert_eq!(ext.get::<Marker>(), Some(&Marker(2)));
		assert_eq!(ext.len(), 2);
	}
}

// vim: ts=4
