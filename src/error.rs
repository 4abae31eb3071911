// Copyright 2026 taskboard contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Error types for every fallible surface of the task board.
//!
//! Each fallible entry point gets its own `thiserror`-derived enum rather than one crate-wide
//! error type, so callers only have to match the variants relevant to the call they made.

use thiserror::Error;

/// Returned by [`crate::task_create`] when a task cannot be admitted or constructed.
#[derive(Debug, Error)]
pub enum TaskCreateError {
    /// The board already holds `MAX_TASKS` concurrently live tasks.
    #[error("admission denied: board already holds the maximum number of concurrent tasks")]
    Admission,
    /// The underlying coroutine stack could not be allocated.
    #[error("failed to allocate coroutine stack: {0}")]
    CoroutineCreate(#[source] std::io::Error),
}

/// Returned by [`crate::blocking_task_create`].
#[derive(Debug, Error)]
pub enum BlockingTaskError {
    /// Called from outside any running task; there is no parent to suspend.
    #[error("blocking_task_create called with no current task")]
    NotInTask,
    /// The child's coroutine stack could not be allocated.
    #[error("failed to allocate coroutine stack: {0}")]
    CoroutineCreate(#[source] std::io::Error),
}

/// Returned by [`crate::remote_task_create`].
#[derive(Debug, Error)]
pub enum RemoteTaskError {
    /// Called from outside any running task; there is no caller to record.
    #[error("remote_task_create called with no current task")]
    NotInTask,
}

/// Returned by board lifecycle operations.
#[derive(Debug, Error)]
pub enum BoardError {
    /// `start` was called on a board that is already `Started`.
    #[error("board already started")]
    AlreadyStarted,
}
