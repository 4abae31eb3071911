// Copyright 2026 taskboard contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Synchronization primitives used by the ready queues and message queues.
//!
//! Swapped for `loom`'s mocked equivalents under `cfg(loom)` so the ready-queue tests can
//! model-check the mutex/condvar pair a ready queue relies on. The board's other locks (lifecycle,
//! concurrency counter) are left on `std::sync` directly, since modeling every lock in the board
//! would make the loom state space intractable for little additional confidence: the queue
//! mutex/condvar pair is where the interesting interleavings are.

cfg_if::cfg_if! {
    if #[cfg(loom)] {
        pub use loom::sync::{Condvar, Mutex};
    } else {
        pub use std::sync::{Condvar, Mutex};
    }
}
