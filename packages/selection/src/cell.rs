//! Versioned state cells.

use serde::Serialize;

/// A value owned by the map session, with a version that bumps on every
/// change so observers can tell whether they are stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateCell<T> {
    value: T,
    version: u64,
}

impl<T> StateCell<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self { value, version: 0 }
    }

    #[must_use]
    pub const fn get(&self) -> &T {
        &self.value
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Replaces the value unconditionally and returns the old one.
    pub fn replace(&mut self, value: T) -> T {
        self.version += 1;
        std::mem::replace(&mut self.value, value)
    }
}

impl<T: PartialEq> StateCell<T> {
    /// Stores `value` if it differs from the current one. Returns `true`
    /// on change.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.replace(value);
        true
    }
}
