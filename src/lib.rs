// Copyright 2026 taskboard contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A cooperative, multi-priority task board: a user-space scheduler that runs many short-lived
//! tasks as stackful coroutines across a small pool of worker threads.
//!
//! One primary executor drains the primary queue (`Priority` at its head, `Primary` at its tail)
//! and opportunistically helps whichever secondary queue is longest, unless a `Priority` task is
//! currently in flight. Each secondary executor is bound to exactly one secondary queue. A task
//! suspends itself at explicit points ([`task_yield`], [`blocking_task_create`], or
//! [`remote_task_create`]) and is always either running on exactly one executor thread or sitting
//! in exactly one ready queue, never both (see the invariants enumerated in the test suite).
//!
//! A blocking subtask ([`blocking_task_create`]) replaces its parent in the execution pool: the
//! parent suspends and is only reinserted once the child completes. A remote task
//! ([`remote_task_create`]) is handed to an external [`RemoteTransport`] over a pair of message
//! queues and, for a blocking send, reinserts its caller once a response arrives.
//!
//! There is no process-global board: every call threads an `Arc<TaskBoard>` explicitly. An
//! embedder that wants a singleton wraps one in its own `OnceLock` or similar.
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskboard::{task_create, task_fn, BoardConfig, TaskBoard, TaskClass};
//!
//! fn greet() {
//!     println!("hello from a task");
//! }
//!
//! let board = TaskBoard::create(BoardConfig::new());
//! board.start().unwrap();
//! task_create(&board, task_fn!(greet), TaskClass::Primary, None).unwrap();
//! # Arc::clone(&board).destroy();
//! ```

mod board;
mod current;
mod error;
mod executor;
mod history;
mod id;
mod message;
mod queue;
mod sync;
mod task;

use std::any::Any;
use std::io;
use std::sync::Arc;

use current::{PendingHandoff, ResumeValue, YieldReason};

pub use board::{BoardConfig, TaskBoard, MAX_SECONDARIES, MAX_TASKS};
pub use error::{BlockingTaskError, BoardError, RemoteTaskError, TaskCreateError};
pub use history::{History, HistoryEntry};
pub use id::Func;
pub use message::{
    Messages, RemoteStatus, RemoteTask, RemoteTransport, ResponseBuf, ResponseBuffer,
    MAX_MSG_LENGTH,
};
pub use task::{TaskClass, TaskOrigin, TaskState, STACK_SIZE};

use task::{Task, TaskOrigin as Origin};

/// Allocate a task, admit it against [`MAX_TASKS`], record an execution in history, and place it
/// in the queue its class selects.
///
/// Returns [`TaskCreateError::Admission`] if the board already holds `MAX_TASKS` concurrently
/// live tasks, or [`TaskCreateError::CoroutineCreate`] if the coroutine's stack could not be
/// allocated. In the latter case the admission slot is released and no history entry is recorded.
pub fn task_create(
    board: &Arc<TaskBoard>,
    func: Func,
    class: TaskClass,
    args: Option<Box<dyn Any + Send>>,
) -> Result<(), TaskCreateError> {
    board.add_concurrent().ok_or(TaskCreateError::Admission)?;

    let task = match Task::new(func, class, Origin::Local, args) {
        Ok(task) => Box::new(task),
        Err(err) => {
            board.dec_concurrent();
            return Err(TaskCreateError::CoroutineCreate(err));
        }
    };

    board.history.record_exec(func);
    if class == TaskClass::Priority {
        board.priority_started();
    }
    board.place_new(task);
    Ok(())
}

/// Spawn a blocking child from within a running task: the child replaces the caller in the
/// execution pool (it does not count against [`MAX_TASKS`]) and the caller suspends until the
/// child completes, resuming with `true` iff the child terminated normally.
///
/// Must be called from inside a task body; returns [`BlockingTaskError::NotInTask`] otherwise.
/// Nesting is allowed (a blocking child may itself spawn a blocking child), and destruction is
/// recursive parent-first (see [`TaskBoard::destroy`]).
pub fn blocking_task_create(
    board: &Arc<TaskBoard>,
    func: Func,
    class: TaskClass,
    args: Option<Box<dyn Any + Send>>,
) -> Result<bool, BlockingTaskError> {
    if current::current_task().is_none() {
        return Err(BlockingTaskError::NotInTask);
    }

    let child = Task::new(func, class, Origin::BlockingChild, args)
        .map_err(BlockingTaskError::CoroutineCreate)?;

    board.history.record_exec(func);
    if class == TaskClass::Priority {
        board.priority_started();
    }

    // The child can't be placed yet: it would let another executor race to run it before this
    // task's own `Task` (still owned by the dispatching executor's stack frame) is handed over
    // as the child's `blocked_parent`. Stash it and let the executor complete the handoff right
    // after this suspend returns control to it (see `crate::current` and `crate::executor`).
    current::stash_pending(PendingHandoff::BlockingChild(Box::new(child)));

    match current::suspend_current(YieldReason::SpawnedBlockingChild) {
        Some(ResumeValue::ChildDone(ok)) => Ok(ok),
        _ => Ok(false),
    }
}

/// Issue a remote request from within a running task.
///
/// `message` is truncated to [`MAX_MSG_LENGTH`] bytes. The record is enqueued on the board's
/// outbound message queue for a [`RemoteTransport`] to consume.
///
/// For a non-blocking send, the caller is reinserted immediately and this returns `Ok(None)` as
/// soon as the request is on the queue; the response, if any, is only observable through a
/// [`ResponseBuffer::CallerOwned`] buffer the caller polls itself.
///
/// For a blocking send, the caller suspends until the response arrives. If the caller requested
/// [`ResponseBuffer::CallerOwned`], the transport wrote the response in place and this returns
/// `Ok(None)`; the caller reads its own buffer. If the caller requested no buffer at all and the
/// transport replied anyway, the remote record's owned allocation is returned as `Ok(Some(buf))`.
///
/// Must be called from inside a task body; returns [`RemoteTaskError::NotInTask`] otherwise.
pub fn remote_task_create(
    board: &Arc<TaskBoard>,
    message: &str,
    buffer: ResponseBuffer,
    blocking: bool,
) -> Result<Option<Vec<u8>>, RemoteTaskError> {
    if current::current_task().is_none() {
        return Err(RemoteTaskError::NotInTask);
    }

    let mut remote = RemoteTask::new(message, blocking);
    remote.data = match buffer {
        ResponseBuffer::None => ResponseBuf::None,
        ResponseBuffer::CallerOwned(ptr) => ResponseBuf::CallerOwned(ptr),
    };

    if blocking {
        // Same handoff constraint as `blocking_task_create`: the record can't own the caller's
        // `Task` until the executor hands it over after this suspend returns.
        current::stash_pending(PendingHandoff::RemoteBlocking(Box::new(remote)));
    } else {
        // No rendezvous needed: the caller is reinserted immediately by the executor's
        // `RemoteSend { blocking: false }` branch, so there is no race to avoid.
        board.messages.send(Box::new(remote));
    }

    match current::suspend_current(YieldReason::RemoteSend { blocking }) {
        Some(ResumeValue::RemoteDone(payload)) => Ok(payload),
        _ => Ok(None),
    }
}

/// Suspend the current task, reinserting it at the tail (or head, per
/// [`BoardConfig::reinsert_at_head`]) of its own class queue. A no-op outside any task.
pub fn task_yield() {
    let Some(mut task_ptr) = current::current_task() else {
        return;
    };
    // Safety: `current_task` only ever returns a pointer valid for the duration of the task's
    // own `step()` call, which is exactly the dynamic extent of this function.
    let task_ref = unsafe { task_ptr.as_mut() };
    task_ref.yields += 1;
    if let Some(board_ptr) = current::current_board() {
        let board_ref = unsafe { board_ptr.as_ref() };
        board_ref.history.record_yield(task_ref.func());
    }
    current::suspend_current(YieldReason::Plain);
}

/// Recover the argument passed to [`task_create`]/[`blocking_task_create`] for the task currently
/// running on this thread, downcast to `T`. Returns `None` outside any task, or if `T` does not
/// match the type actually stored.
///
/// The `'static` lifetime mirrors the original implementation's `void *` out-pointer: the
/// reference is only meaningful for as long as the caller remains inside its own task body.
pub fn task_get_args<T: 'static>() -> Option<&'static T> {
    let task_ptr = current::current_task()?;
    // Safety: see `task_yield`; the borrow does not outlive the coroutine's own execution despite
    // the lifetime annotation, by the same convention as the original's `void *`.
    let task_ref: &Task = unsafe { task_ptr.as_ref() };
    let arg_ref = task_ref.args_ref::<T>()?;
    Some(unsafe { &*(arg_ref as *const T) })
}

/// Format every history entry as `task '<name>' completed C/E times, yielding Y times with mean
/// execution time T`, one line per task function, to `writer`.
pub fn history_print_records<W: io::Write>(board: &Arc<TaskBoard>, writer: W) -> io::Result<()> {
    board.history().print_records(writer)
}
