#![allow(unused)]

use std::time::{Duration, Instant};

/// Installs a `tracing` subscriber writing to the test harness's captured output. `try_init`
/// rather than `init`: several `#[test]` functions in the same file share one process-global
/// subscriber slot, and only the first call may set it.
pub(crate) fn init_tracing() {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();
}

/// Poll `cond` every 5ms until it returns `true` or `timeout` elapses. Returns whether it
/// succeeded. Scenario tests use this in place of a direct completion callback, since task
/// functions are bare `fn()` items with no channel back to the test thread beyond what they
/// write into shared state reachable through their own arguments.
pub(crate) fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    loop {
        if cond() {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
