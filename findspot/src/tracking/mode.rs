//! Collection mode selector.
//!
//! Read on every hit, so it is a single atomic byte rather than a lock.
//! Hits already in flight observe whichever mode was current when they
//! loaded it.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::domain::CollectionMode;

#[derive(Debug, Default)]
pub struct ModeSwitch(AtomicU8);

impl ModeSwitch {
    #[must_use]
    pub fn new(initial: CollectionMode) -> Self {
        Self(AtomicU8::new(initial.as_u8()))
    }

    #[must_use]
    pub fn current(&self) -> CollectionMode {
        CollectionMode::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Switch modes, returning the previous one.
    pub fn set(&self, mode: CollectionMode) -> CollectionMode {
        CollectionMode::from_u8(self.0.swap(mode.as_u8(), Ordering::AcqRel))
    }
}
