//! Type aliases for the handles shared between tasks.
//!
//! The poller, the extended-refresh task and the UI run on independent
//! schedules. They share the snapshot through a reader-writer lock and
//! serialise every UI mutation through one mutex.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use duetscreen_core::types::*;
//!
//! let snapshot: SharedSnapshot = shared_snapshot();
//! let ui = UiLock::new();
//! ui.with(|| render(&snapshot.read()));
//! ```

use crate::data::MachineSnapshot;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;

/// The machine-state snapshot as shared between the poller and its readers.
///
/// The poller holds the only write path.
pub type SharedSnapshot = Arc<RwLock<MachineSnapshot>>;

/// Create a fresh, all-unknown shared snapshot.
pub fn shared_snapshot() -> SharedSnapshot {
    Arc::new(RwLock::new(MachineSnapshot::new()))
}

/// The single lock guarding UI-owned objects.
///
/// Any task other than the UI task must hold it for the duration of a UI
/// mutation and release it right after.
#[derive(Debug, Clone, Default)]
pub struct UiLock {
    inner: Arc<Mutex<()>>,
}

impl UiLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the lock until the returned guard is dropped.
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        self.inner.lock()
    }

    /// Run `f` while holding the lock.
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.lock();
        f()
    }

    /// Whether another task currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}
