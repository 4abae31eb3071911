// Copyright 2026 taskboard contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The worker loop: each executor thread runs the sequencer, then picks a task, resumes it, and
//! interprets the yield per the protocol documented at the crate root.

use std::sync::Arc;
use std::time::Duration;

use crate::board::TaskBoard;
use crate::current::{self, PendingHandoff, ResumeValue, YieldReason};
use crate::message::{RemoteStatus, ResponseBuf};
use crate::task::{StepOutcome, Task, TaskClass, TaskState};

/// How long the primary waits on its own condvar between attempts to help a secondary. Short
/// enough that a secondary backlog gets picked up promptly, long enough to not spin.
const PRIMARY_HELP_POLL: Duration = Duration::from_millis(20);

/// Which queue(s) an executor thread drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutorRole {
    Primary,
    Secondary(usize),
}

/// Entry point spawned by [`TaskBoard::start`] for every executor thread.
pub(crate) fn run(board: Arc<TaskBoard>, role: ExecutorRole) {
    let span = tracing::info_span!("executor", role = ?role);
    let _enter = span.enter();
    tracing::debug!("executor starting");

    loop {
        sequencer_step(&board);

        if board.is_shutdown() {
            break;
        }

        let Some(task) = next_task(&board, role) else {
            if board.is_shutdown() {
                break;
            }
            continue;
        };

        dispatch(&board, task);
    }

    tracing::debug!("executor exiting");
}

/// The sequencer: drain every inbound response, reinserting blocking callers and discarding
/// non-blocking ones (whose caller was already reinserted at send time).
fn sequencer_step(board: &TaskBoard) {
    for mut response in board.messages.drain_inbound() {
        debug_assert_eq!(response.status, RemoteStatus::Recv);
        if let Some(mut caller) = response.caller.take() {
            let payload = match std::mem::replace(&mut response.data, ResponseBuf::None) {
                ResponseBuf::Owned(buf) => Some(buf),
                ResponseBuf::CallerOwned(_) | ResponseBuf::None => None,
            };
            caller.pending_resume = ResumeValue::RemoteDone(payload);
            tracing::trace!(task.name = caller.func().name, "reinserting blocking remote caller");
            board.reinsert(caller);
        }
        // Non-blocking records carry no caller; dropping `response` here is the whole of their
        // teardown.
    }
}

/// Pick the next task to run. The primary may opportunistically help a secondary whose queue is
/// the longest, provided its own queue is empty, no `Priority` task is in flight, and there is at
/// least one secondary to help.
fn next_task(board: &TaskBoard, role: ExecutorRole) -> Option<Box<Task>> {
    match role {
        ExecutorRole::Primary => loop {
            if let Some(task) = board.primary.try_pop() {
                return Some(task);
            }
            if board.is_shutdown() {
                return None;
            }
            if !board.any_priority_inflight() {
                if let Some(task) = try_help_secondary(board) {
                    return Some(task);
                }
            }
            // Wait briefly on our own condvar; a secondary insert may also have signalled it
            // (see `BoardConfig::signal_primary_on_secondary_insert`).
            if let Some(task) = board.primary.try_pop_wait(PRIMARY_HELP_POLL) {
                return Some(task);
            }
        },
        ExecutorRole::Secondary(index) => {
            let queue = &board.secondaries[index];
            queue.pop_wait(|| board.is_shutdown())
        }
    }
}

/// Steal one task from whichever non-empty secondary queue is currently longest. Non-blocking:
/// returns `None` immediately if every secondary is empty.
fn try_help_secondary(board: &TaskBoard) -> Option<Box<Task>> {
    let (_, longest) = board
        .secondaries
        .iter()
        .enumerate()
        .filter(|(_, q)| !q.is_empty())
        .max_by_key(|(_, q)| q.len())?;
    longest.try_pop()
}

/// Run one task to its next suspension point and act on the outcome.
fn dispatch(board: &TaskBoard, mut task: Box<Task>) {
    task.state = TaskState::Running;
    let task_ptr: *mut Task = &mut *task;
    let prev_task = current::set_current_task(task_ptr);
    let prev_board = current::set_current_board(board as *const TaskBoard);

    let outcome = task.step();

    current::set_current_board(prev_board);
    current::set_current_task(prev_task);

    match outcome {
        StepOutcome::Finished => on_finished(board, task),
        StepOutcome::Yielded(reason) => on_yielded(board, task, reason),
    }
}

fn on_finished(board: &TaskBoard, mut task: Box<Task>) {
    task.state = TaskState::Completed;
    board
        .history
        .record_completion(task.func(), task.cpu_time(), task.yields());
    // Blocking children never went through `add_concurrent` (they replace their parent in the
    // execution pool); only tasks admitted through `task_create` decrement it back.
    if task.origin() != crate::task::TaskOrigin::BlockingChild {
        board.dec_concurrent();
    }
    tracing::trace!(
        task.name = task.func().name,
        cpu_time = ?task.cpu_time(),
        yields = task.yields(),
        "task completed"
    );

    if task.class() == TaskClass::Priority {
        board.priority_finished();
    }

    if let Some(mut parent) = task.blocked_parent.take() {
        parent.pending_resume = ResumeValue::ChildDone(true);
        tracing::trace!(task.name = parent.func().name, "reinserting blocking parent");
        board.reinsert(parent);
    }
    // `task` (the child, or any ordinary completed task) is dropped here, destroying its
    // coroutine context. Its own `blocked_parent`, if still present (only possible if the child
    // itself panicked before clearing it, which never happens, see above), would recurse.
}

fn on_yielded(board: &TaskBoard, mut task: Box<Task>, reason: YieldReason) {
    match reason {
        YieldReason::Plain => {
            board.reinsert(task);
        }
        YieldReason::SpawnedBlockingChild => {
            let Some(PendingHandoff::BlockingChild(mut child)) = current::take_pending() else {
                // `blocking_task_create` always stashes before suspending with this reason.
                unreachable!("SpawnedBlockingChild yield with no pending child");
            };
            child.blocked_parent = Some(task);
            board.place_new(child);
        }
        YieldReason::RemoteSend { blocking: false } => {
            board.reinsert(task);
        }
        YieldReason::RemoteSend { blocking: true } => {
            let Some(PendingHandoff::RemoteBlocking(mut remote)) = current::take_pending() else {
                unreachable!("blocking RemoteSend yield with no pending remote record");
            };
            remote.caller = Some(task);
            board.messages.send(remote);
        }
    }
}
