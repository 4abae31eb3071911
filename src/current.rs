// Copyright 2026 taskboard contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Thread-local "currently running task" bookkeeping.
//!
//! The original C implementation recovers the currently-running task from the coroutine
//! library's per-coroutine user-data slot. `corosensei` has no such slot, and more importantly a
//! stackful coroutine switches stacks but *not* OS threads, so a thread-local pointer set
//! immediately around `coroutine.resume()` serves the same purpose: within the task body,
//! [`current_task`] always observes the task currently being resumed on this thread.
//!
//! A second thread-local holds the `corosensei::Yielder` for the coroutine currently executing on
//! this thread, so that [`crate::task_yield`], [`crate::blocking_task_create`], and
//! [`crate::remote_task_create`] can suspend from arbitrary call depth inside the task body
//! without threading a `Yielder` through every function signature. This is `corosensei`'s own
//! documented pattern for ergonomic generator-style yielding.
//!
//! A third thread-local is the handoff slot for `blocking_task_create`/`remote_task_create`: both
//! build a record (a child [`Task`] or a [`RemoteTask`]) that cannot yet be placed on a shared
//! queue, because placing it would let another thread race to consume it before the *current*
//! task's own [`Task`] (still owned by the executor's stack frame, not by the record) is handed
//! over. Stashing it here and suspending lets the executor, which regains control in the same
//! call frame that owns the current task, complete the handoff without a race. See
//! [`crate::executor`] for the other half of this protocol.

use std::cell::{Cell, RefCell};
use std::ptr::NonNull;

use corosensei::Yielder;

use crate::board::TaskBoard;
use crate::message::RemoteTask;
use crate::task::Task;

pub(crate) type TaskYielder = Yielder<ResumeValue, YieldReason>;

/// Why a task's coroutine suspended itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum YieldReason {
    /// A plain `task_yield()` call.
    Plain,
    /// `blocking_task_create` built a child and stashed it; waiting for it to complete.
    SpawnedBlockingChild,
    /// `remote_task_create` sent (or stashed, for blocking sends) a request.
    RemoteSend { blocking: bool },
}

/// What a task's coroutine is resumed with: ordinarily nothing of note, but a task parked on
/// [`YieldReason::SpawnedBlockingChild`] or a blocking [`YieldReason::RemoteSend`] needs its
/// result delivered through the very next resume, since `corosensei` has no other channel back
/// into a suspended coroutine.
#[derive(Debug)]
pub(crate) enum ResumeValue {
    Continue,
    /// The blocking child finished; `true` iff it completed normally.
    ChildDone(bool),
    /// The blocking remote round trip finished. `Some(buf)` only when the caller did not supply
    /// its own buffer (the remote record owned the allocation); `None` when the response was
    /// written in place into a caller-owned buffer, or there simply was no payload.
    RemoteDone(Option<Vec<u8>>),
}

/// A record built by `blocking_task_create`/`remote_task_create` that is complete except for the
/// ownership handoff only the executor can perform.
pub(crate) enum PendingHandoff {
    BlockingChild(Box<Task>),
    RemoteBlocking(Box<RemoteTask>),
}

thread_local! {
    static CURRENT_TASK: Cell<*mut Task> = const { Cell::new(std::ptr::null_mut()) };
    static CURRENT_YIELDER: Cell<*const TaskYielder> = const { Cell::new(std::ptr::null()) };
    static PENDING_HANDOFF: RefCell<Option<PendingHandoff>> = const { RefCell::new(None) };
    static CURRENT_BOARD: Cell<*const TaskBoard> = const { Cell::new(std::ptr::null()) };
}

/// Set the board this executor thread is running for, returning the previous value.
pub(crate) fn set_current_board(board: *const TaskBoard) -> *const TaskBoard {
    CURRENT_BOARD.with(|cell| cell.replace(board))
}

/// The board owning the task currently being resumed on this thread, if any. Lets
/// `task_yield`/`blocking_task_create`/`remote_task_create` reach the board (for history and
/// queue placement) without the task body threading an `Arc<TaskBoard>` through every call.
pub(crate) fn current_board() -> Option<NonNull<TaskBoard>> {
    let ptr = CURRENT_BOARD.with(Cell::get);
    NonNull::new(ptr as *mut TaskBoard)
}

/// Set the task currently being resumed on this thread, returning the previous value so the
/// executor can restore it (relevant when the primary helps a secondary and nests calls).
pub(crate) fn set_current_task(task: *mut Task) -> *mut Task {
    CURRENT_TASK.with(|cell| cell.replace(task))
}

/// The task currently being resumed on this OS thread, if any.
pub(crate) fn current_task() -> Option<NonNull<Task>> {
    let ptr = CURRENT_TASK.with(Cell::get);
    NonNull::new(ptr)
}

/// Run `f` with the yielder for the coroutine currently executing on this thread installed,
/// restoring whatever was installed before (there is none, in this crate's usage, since tasks do
/// not nest coroutines on the same thread).
pub(crate) fn with_yielder_installed<R>(yielder: &TaskYielder, f: impl FnOnce() -> R) -> R {
    let prev = CURRENT_YIELDER.with(|cell| cell.replace(yielder as *const TaskYielder));
    let result = f();
    CURRENT_YIELDER.with(|cell| cell.set(prev));
    result
}

/// Suspend the coroutine currently executing on this thread with `reason`, returning whatever it
/// is next resumed with.
///
/// Returns `None` if called from outside any task.
pub(crate) fn suspend_current(reason: YieldReason) -> Option<ResumeValue> {
    let ptr = CURRENT_YIELDER.with(Cell::get);
    // Safety: `ptr` is only ever non-null for the duration of `with_yielder_installed`, which
    // wraps the entire lifetime of the coroutine's entry closure on this thread.
    let yielder = unsafe { ptr.as_ref()? };
    Some(yielder.suspend(reason))
}

/// Stash a handoff record for the executor to pick up right after this thread's `step()` call
/// returns. Overwrites any previous value; callers never stash twice without an intervening
/// suspend.
pub(crate) fn stash_pending(handoff: PendingHandoff) {
    PENDING_HANDOFF.with(|cell| *cell.borrow_mut() = Some(handoff));
}

/// Take whatever was stashed on this thread, if anything.
pub(crate) fn take_pending() -> Option<PendingHandoff> {
    PENDING_HANDOFF.with(|cell| cell.borrow_mut().take())
}
