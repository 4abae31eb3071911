// Copyright 2026 taskboard contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The task model: a coroutine context plus the bookkeeping the board and executors need.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use corosensei::stack::DefaultStack;
use corosensei::{Coroutine, CoroutineResult};

use crate::current::{with_yielder_installed, ResumeValue, YieldReason};
use crate::id::Func;

/// Default stack size for a task's coroutine: 56 KiB, matching the original implementation.
pub const STACK_SIZE: usize = 57_344;

/// Where a task's placement decision comes from.
///
/// `Priority` bypasses to the head of the primary queue; `Primary` goes to the primary queue's
/// tail; `Secondary` goes to whichever secondary queue is currently shortest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
    Priority,
    Primary,
    Secondary,
}

/// What created a task, kept for diagnostics and for the invariants in the crate-level docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOrigin {
    /// Created directly by a call to [`crate::task_create`].
    Local,
    /// Created by [`crate::remote_task_create`]'s reinsertion path.
    Remote,
    /// A blocking child created by [`crate::blocking_task_create`].
    BlockingChild,
    /// A non-blocking child (reserved for future use; the current protocol only spawns blocking
    /// children).
    NonBlockingChild,
}

/// A task's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Initialized,
    Running,
    Completed,
}

/// Outcome of resuming a task's coroutine for one executor step.
pub(crate) enum StepOutcome {
    Finished,
    Yielded(YieldReason),
}

/// A task: coroutine context, placement class, and the stats the executor needs after each step.
///
/// Exactly one executor resumes a task at any moment (enforced by the ready-queue protocol, not
/// by any lock on the task itself): `Running` implies the task is absent from every ready queue,
/// and `Completed` implies its coroutine has been destroyed.
pub struct Task {
    pub(crate) origin: TaskOrigin,
    pub(crate) state: TaskState,
    pub(crate) class: TaskClass,
    pub(crate) cpu_time: Duration,
    pub(crate) yields: u64,
    pub(crate) func: Func,
    pub(crate) args: Option<Box<dyn Any + Send>>,
    pub(crate) coroutine: Coroutine<ResumeValue, YieldReason, (), DefaultStack>,
    /// What to resume this task's coroutine with on its next `step()`. Ordinarily `Continue`;
    /// set to `ChildDone`/`RemoteDone` by whichever code reinserts a task that was suspended
    /// waiting on a blocking child or a blocking remote round trip, since that is the only
    /// channel `corosensei` gives us back into an already-suspended coroutine.
    pub(crate) pending_resume: ResumeValue,
    /// Set only for blocking children: the suspended parent this task's completion will wake.
    /// Owning, not a back-reference; see the module-level handoff protocol in [`crate::current`]
    /// for why the child, not the executor, ends up holding this.
    pub(crate) blocked_parent: Option<Box<Task>>,
    /// Which secondary queue this task is bound to, set at placement for `Secondary`-class
    /// tasks. Reinsertion after a plain yield returns the task here directly rather than
    /// recomputing the shortest queue, so a task run under primary-helping goes back to its
    /// origin queue (see the executor helping policy in the crate-level docs).
    pub(crate) secondary_index: Option<usize>,
}

// Safety: the ready-queue/executor protocol ensures exactly one thread ever touches a `Task` at
// a time (either an executor resuming it, or the board during drain after all executors joined).
unsafe impl Send for Task {}

impl Task {
    pub(crate) fn new(
        func: Func,
        class: TaskClass,
        origin: TaskOrigin,
        args: Option<Box<dyn Any + Send>>,
    ) -> std::io::Result<Self> {
        let stack = DefaultStack::new(STACK_SIZE)?;
        let coroutine = Coroutine::with_stack(stack, move |yielder, _first_resume| {
            with_yielder_installed(yielder, || (func.f)());
        });

        Ok(Task {
            origin,
            state: TaskState::Initialized,
            class,
            cpu_time: Duration::ZERO,
            yields: 0,
            func,
            args,
            coroutine,
            pending_resume: ResumeValue::Continue,
            blocked_parent: None,
            secondary_index: None,
        })
    }

    pub fn class(&self) -> TaskClass {
        self.class
    }
    pub fn origin(&self) -> TaskOrigin {
        self.origin
    }
    pub fn state(&self) -> TaskState {
        self.state
    }
    pub fn func(&self) -> Func {
        self.func
    }
    pub fn cpu_time(&self) -> Duration {
        self.cpu_time
    }
    pub fn yields(&self) -> u64 {
        self.yields
    }

    /// Downcast this task's stored argument. See [`crate::task_get_args`] for the public,
    /// thread-local-lookup version callers actually use from inside a running task.
    pub(crate) fn args_ref<T: 'static>(&self) -> Option<&T> {
        self.args.as_deref()?.downcast_ref::<T>()
    }

    /// Resume the coroutine, accounting the wall-clock time spent into `cpu_time`. A panic inside
    /// the task body unwinds only up to `corosensei`'s boundary, which converts it to a
    /// `CoroutineResult` rather than letting it propagate into the executor thread.
    pub(crate) fn step(&mut self) -> StepOutcome {
        debug_assert_eq!(self.state, TaskState::Running);
        let resume = std::mem::replace(&mut self.pending_resume, ResumeValue::Continue);
        let start = std::time::Instant::now();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| self.coroutine.resume(resume)));
        self.cpu_time += start.elapsed();

        match result {
            Ok(CoroutineResult::Yield(reason)) => StepOutcome::Yielded(reason),
            Ok(CoroutineResult::Return(())) => StepOutcome::Finished,
            Err(_) => {
                tracing::warn!(task.name = self.func.name, "task panicked, treating as completed");
                StepOutcome::Finished
            }
        }
    }
}
