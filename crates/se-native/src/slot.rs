//! Process-wide ownership of the native core
//!
//! The core module keeps global state, so only one session may drive it at a
//! time. A session checks the core out of the [`CoreSlot`] and the returned
//! [`CoreLease`] checks it back in when dropped.

use crate::interface::{CoreControls, CoreInterface};
use parking_lot::{Mutex, MutexGuard};
use se_core::NativeError;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct SlotInner {
    core: Mutex<Box<dyn CoreInterface>>,
    checked_out: AtomicBool,
}

/// Owner of the single native core instance
pub struct CoreSlot {
    inner: Arc<SlotInner>,
    controls: Arc<dyn CoreControls>,
}

impl CoreSlot {
    /// Take ownership of a core and run its one-time `init`
    pub fn initialize(mut core: Box<dyn CoreInterface>, data_dir: &Path) -> Result<Self, NativeError> {
        tracing::info!("Initializing native core (data dir {})", data_dir.display());

        if !core.init(data_dir) {
            tracing::error!("Native core init failed");
            return Err(NativeError::InitFailed(data_dir.to_path_buf()));
        }

        let controls = core.controls();
        Ok(Self {
            inner: Arc::new(SlotInner {
                core: Mutex::new(core),
                checked_out: AtomicBool::new(false),
            }),
            controls,
        })
    }

    /// Check the core out for exclusive use by one session
    pub fn acquire(&self) -> Result<CoreLease, NativeError> {
        if self
            .inner
            .checked_out
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Native core requested while already checked out");
            return Err(NativeError::CoreBusy);
        }

        tracing::debug!("Native core checked out");
        Ok(CoreLease {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Whether no session currently holds the core
    pub fn is_available(&self) -> bool {
        !self.inner.checked_out.load(Ordering::Acquire)
    }

    /// Side-channel controls; usable regardless of who holds the lease
    pub fn controls(&self) -> Arc<dyn CoreControls> {
        Arc::clone(&self.controls)
    }
}

/// Exclusive access to the native core, returned to its slot on drop
pub struct CoreLease {
    inner: Arc<SlotInner>,
}

impl CoreLease {
    /// Borrow the core for a call sequence
    pub fn core(&self) -> MutexGuard<'_, Box<dyn CoreInterface>> {
        self.inner.core.lock()
    }
}

impl Drop for CoreLease {
    fn drop(&mut self) {
        self.inner.checked_out.store(false, Ordering::Release);
        tracing::debug!("Native core checked in");
    }
}

impl std::fmt::Debug for CoreLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreLease").finish_non_exhaustive()
    }
}
