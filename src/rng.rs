//! Random source shared between threads.

use std::fmt;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};

static GLOBAL: OnceLock<SharedRng> = OnceLock::new();

/// A seeded random number generator guarded by a lock.
///
/// Used to break ties between active connections and by [`RandomSelector`][crate::peer::RandomSelector].
pub struct SharedRng {
    inner: Mutex<StdRng>,
}

impl SharedRng {
    /// Create a generator seeded from the current time.
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or_default();
        Self::seeded(nanos)
    }

    /// Create a generator with a fixed seed, for reproducible choices.
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// The process-wide generator.
    pub fn global() -> &'static SharedRng {
        GLOBAL.get_or_init(SharedRng::new)
    }

    /// A uniform index in `0..len`.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero.
    pub fn index(&self, len: usize) -> usize {
        assert!(len > 0, "index of an empty range");
        self.inner.lock().random_range(0..len)
    }
}

impl Default for SharedRng {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRng").finish_non_exhaustive()
    }
}
