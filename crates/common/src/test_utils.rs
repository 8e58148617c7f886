//! Test utilities shared across crates
//!
//! The link core runs on plain OS threads, so these helpers poll rather
//! than await.

use std::time::{Duration, Instant};

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll `condition` until it returns true or `timeout` elapses
///
/// Returns whether the condition became true. Polling interval is 5 ms,
/// short enough for timing-sensitive link tests.
pub fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
