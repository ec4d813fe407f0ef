// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Platform Hooks
//!
//! The IPC core does not own a clock or a scheduler. The embedding kernel
//! installs a [`Platform`] once at boot; blocking points read deadlines
//! from it and call [`relax`] between polls.
//!
//! Until a platform is installed, a tick clock is used: time advances by
//! one nanosecond per [`relax`] call so bounded waits still terminate.

use crate::rustux::types::Nanoseconds;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Once;

/// Clock and CPU-relax hooks provided by the rest of the kernel
pub trait Platform: Sync {
    /// Current monotonic time in nanoseconds
    fn current_time(&self) -> Nanoseconds;

    /// Give the CPU away while a blocked thread polls its condition
    fn relax(&self);
}

/// Installed platform
static PLATFORM: Once<&'static dyn Platform> = Once::new();

/// Ticks of the fallback clock
static BOOT_TICKS: AtomicU64 = AtomicU64::new(0);

/// Install the platform hooks
///
/// Only the first call has an effect.
pub fn install(platform: &'static dyn Platform) {
    PLATFORM.call_once(|| platform);
}

/// Whether a platform has been installed
pub fn is_installed() -> bool {
    PLATFORM.get().is_some()
}

/// Current time on the platform clock
pub fn current_time() -> Nanoseconds {
    match PLATFORM.get() {
        Some(platform) => platform.current_time(),
        None => BOOT_TICKS.load(Ordering::Relaxed),
    }
}

/// Yield while polling
pub fn relax() {
    match PLATFORM.get() {
        Some(platform) => platform.relax(),
        None => {
            BOOT_TICKS.fetch_add(1, Ordering::Relaxed);
            core::hint::spin_loop();
        }
    }
}

/// Host platform backed by the standard library
#[cfg(any(test, feature = "std"))]
pub mod host {
    use super::Platform;
    use crate::rustux::types::Nanoseconds;
    use std::sync::OnceLock;
    use std::time::Instant;

    /// Platform for hosted builds and tests
    pub struct HostPlatform {
        epoch: OnceLock<Instant>,
    }

    impl HostPlatform {
        /// Create a host platform; the clock starts at first use
        pub const fn new() -> Self {
            Self { epoch: OnceLock::new() }
        }
    }

    impl Default for HostPlatform {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Platform for HostPlatform {
        fn current_time(&self) -> Nanoseconds {
            let epoch = self.epoch.get_or_init(Instant::now);
            // Offset by one so the clock never reads DEADLINE_PAST
            epoch.elapsed().as_nanos() as Nanoseconds + 1
        }

        fn relax(&self) {
            std::thread::yield_now();
        }
    }

    /// Process-wide host platform
    pub static HOST_PLATFORM: HostPlatform = HostPlatform::new();

    /// Install [`HOST_PLATFORM`]
    pub fn install() {
        super::install(&HOST_PLATFORM);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_clock_is_monotonic() {
        host::install();
        assert!(is_installed());
        let a = current_time();
        relax();
        let b = current_time();
        assert!(b >= a);
        assert!(a > 0);
    }
}
