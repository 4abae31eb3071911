// Copyright 2026 taskboard contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The task board: the owning aggregate of queues, executors, the concurrency counter, history,
//! and shutdown state.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread::JoinHandle;

use smallvec::SmallVec;
use static_assertions::const_assert;

use crate::error::BoardError;
use crate::executor::{self, ExecutorRole};
use crate::history::History;
use crate::message::Messages;
use crate::queue::{Reinsert, ReadyQueue};
use crate::task::{Task, TaskClass, TaskState};

/// Hard cap on simultaneously live tasks, matching the original `MAX_TASKS`.
pub const MAX_TASKS: u32 = 65_536;
/// Hard cap on the number of secondary executors/queues, matching the original `MAX_SECONDARIES`.
pub const MAX_SECONDARIES: usize = 10;

const_assert!(MAX_SECONDARIES <= u8::MAX as usize);

/// Inline storage for the common case (a handful of secondary queues); spills to the heap only
/// past [`MAX_SECONDARIES`], which nothing can exceed anyway since [`BoardConfig::secondaries`]
/// clamps to it.
type Secondaries = SmallVec<[ReadyQueue; MAX_SECONDARIES]>;

/// Policy knobs fixed once at board creation: reinsertion order, whether a secondary placement
/// also wakes the primary, and the admission ceiling. Plain configuration, defaulted to the
/// documented values.
#[derive(Debug, Clone, Copy)]
pub struct BoardConfig {
    pub(crate) secondaries: usize,
    pub(crate) reinsert_at_head: bool,
    pub(crate) signal_primary_on_secondary_insert: bool,
    pub(crate) max_tasks: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        BoardConfig {
            secondaries: 4,
            reinsert_at_head: true,
            signal_primary_on_secondary_insert: true,
            max_tasks: MAX_TASKS,
        }
    }
}

impl BoardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of secondary executors/queues, capped at [`MAX_SECONDARIES`].
    pub fn secondaries(mut self, n: usize) -> Self {
        self.secondaries = n.min(MAX_SECONDARIES);
        self
    }

    pub fn reinsert_at_head(mut self, yes: bool) -> Self {
        self.reinsert_at_head = yes;
        self
    }

    pub fn primary_helps_secondaries_signal(mut self, yes: bool) -> Self {
        self.signal_primary_on_secondary_insert = yes;
        self
    }

    /// Override the admission cap below [`MAX_TASKS`], e.g. to exercise admission-denied behavior
    /// without actually creating 65536 tasks. Values above `MAX_TASKS` are clamped to it; the
    /// constant remains the hard ceiling the contract documents.
    pub fn max_tasks(mut self, n: u32) -> Self {
        self.max_tasks = n.min(MAX_TASKS);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoardStatus {
    Created,
    Started,
}

struct ExecutorHandles {
    primary: JoinHandle<()>,
    secondaries: Vec<JoinHandle<()>>,
}

/// The owning aggregate: queues, executors, concurrency counter, history, lifecycle state.
///
/// There is no process-global board: embedders thread an `Arc<TaskBoard>` through every call, or
/// stash one behind their own accessor if they want a default.
pub struct TaskBoard {
    pub(crate) config: BoardConfig,
    pub(crate) primary: ReadyQueue,
    pub(crate) secondaries: Secondaries,
    pub(crate) messages: Messages,
    pub(crate) history: History,
    concurrent: Mutex<u32>,
    pub(crate) priority_inflight: AtomicUsize,
    status: Mutex<BoardStatus>,
    pub(crate) shutdown: AtomicBool,
    /// Outermost "protection" mutex: callers that want to inspect final state around shutdown
    /// acquire this before calling `kill`; `destroy` blocks on it after joining.
    board_mutex: Mutex<()>,
    board_cv: Condvar,
    handles: Mutex<Option<ExecutorHandles>>,
}

impl TaskBoard {
    /// Create a board in the `Created` state. No threads are spawned until [`TaskBoard::start`].
    pub fn create(config: BoardConfig) -> std::sync::Arc<Self> {
        let secondaries: Secondaries = (0..config.secondaries).map(|_| ReadyQueue::new()).collect();
        std::sync::Arc::new(TaskBoard {
            config,
            primary: ReadyQueue::new(),
            secondaries,
            messages: Messages::new(),
            history: History::new(),
            concurrent: Mutex::new(0),
            priority_inflight: AtomicUsize::new(0),
            status: Mutex::new(BoardStatus::Created),
            shutdown: AtomicBool::new(false),
            board_mutex: Mutex::new(()),
            board_cv: Condvar::new(),
            handles: Mutex::new(None),
        })
    }

    /// Spawn the primary executor thread and `sqs` secondary executor threads.
    pub fn start(self: &std::sync::Arc<Self>) -> Result<(), BoardError> {
        let mut status = self.status.lock().unwrap();
        if *status == BoardStatus::Started {
            return Err(BoardError::AlreadyStarted);
        }

        let primary = {
            let board = self.clone();
            std::thread::Builder::new()
                .name("taskboard-primary".into())
                .spawn(move || executor::run(board, ExecutorRole::Primary))
                .expect("failed to spawn primary executor thread")
        };

        let secondaries = (0..self.secondaries.len())
            .map(|index| {
                let board = self.clone();
                std::thread::Builder::new()
                    .name(format!("taskboard-secondary-{index}"))
                    .spawn(move || executor::run(board, ExecutorRole::Secondary(index)))
                    .expect("failed to spawn secondary executor thread")
            })
            .collect();

        *self.handles.lock().unwrap() = Some(ExecutorHandles {
            primary,
            secondaries,
        });
        *status = BoardStatus::Started;
        tracing::info!(secondaries = self.secondaries.len(), "task board started");
        Ok(())
    }

    /// Signal shutdown and join every executor thread. Idempotent: returns `false` if the board
    /// was never started, or if a previous call already completed the join.
    pub fn kill(&self) -> bool {
        if *self.status.lock().unwrap() != BoardStatus::Started {
            return false;
        }

        let handles = self.handles.lock().unwrap().take();
        let Some(handles) = handles else {
            // Another thread already took the handles and is (or already did) joining.
            return false;
        };

        self.shutdown.store(true, Ordering::SeqCst);
        self.primary.notify_all();
        for q in &self.secondaries {
            q.notify_all();
        }
        self.messages.notify_all();

        handles.primary.join().ok();
        for h in handles.secondaries {
            h.join().ok();
        }

        self.board_cv.notify_all();
        tracing::info!("task board killed");
        true
    }

    /// Block until shutdown completes (calling [`TaskBoard::kill`] if it hasn't been already),
    /// then drain every queue, freeing every remaining task and its argument.
    pub fn destroy(self: std::sync::Arc<Self>) {
        let _guard = self.board_mutex.lock().unwrap();
        self.kill();

        for task in self.primary.drain() {
            drop(task);
        }
        for q in &self.secondaries {
            for task in q.drain() {
                drop(task);
            }
        }
        let (outbound, inbound) = self.messages.drain_all();
        drop(outbound);
        drop(inbound);
        self.messages.notify_all();
        tracing::info!("task board destroyed");
    }

    /// Current number of concurrently live tasks.
    pub fn concurrent(&self) -> u32 {
        *self.concurrent.lock().unwrap()
    }

    /// Atomically increment iff `current < MAX_TASKS`; returns the new count, or `None` on
    /// overflow. Blocking children never call this (they replace their parent in the pool).
    pub(crate) fn add_concurrent(&self) -> Option<u32> {
        let mut count = self.concurrent.lock().unwrap();
        if *count >= self.config.max_tasks {
            return None;
        }
        *count += 1;
        Some(*count)
    }

    pub(crate) fn dec_concurrent(&self) {
        let mut count = self.concurrent.lock().unwrap();
        *count = count.saturating_sub(1);
    }

    /// Place a freshly created task: `Priority` to the primary head, `Primary` to the primary
    /// tail, `Secondary` to whichever secondary queue is currently shortest (ties broken by
    /// lowest index). Binds `task.secondary_index` so later reinsertions return to this same
    /// queue rather than recomputing the shortest one (see the executor helping policy).
    pub(crate) fn place_new(&self, mut task: Box<Task>) {
        task.state = TaskState::Initialized;
        match task.class {
            TaskClass::Priority => self.primary.push_front(task),
            TaskClass::Primary => self.primary.push_back(task),
            TaskClass::Secondary => {
                let (index, queue) = self
                    .secondaries
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, q)| q.len())
                    .expect("board always has at least one secondary queue");
                task.secondary_index = Some(index);
                queue.push_back(task);
                if self.config.signal_primary_on_secondary_insert {
                    self.primary.notify_all();
                }
            }
        }
    }

    /// Reinsert a task that yielded or whose blocking child just completed: back into its own
    /// class queue, at head or tail per [`BoardConfig::reinsert_at_head`].
    pub(crate) fn reinsert(&self, mut task: Box<Task>) {
        task.state = TaskState::Initialized;
        let reinsert = if self.config.reinsert_at_head {
            Reinsert::Head
        } else {
            Reinsert::Tail
        };
        match task.class {
            TaskClass::Priority | TaskClass::Primary => self.primary.push(task, reinsert),
            TaskClass::Secondary => {
                let index = task.secondary_index.unwrap_or(0);
                let queue = self.secondaries.get(index).unwrap_or(&self.primary);
                queue.push(task, reinsert);
            }
        }
    }

    /// Mark one more `Priority` task as in flight (created but not yet completed). While any are
    /// in flight, primary-helping of secondaries is suppressed.
    pub(crate) fn priority_started(&self) {
        self.priority_inflight.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn priority_finished(&self) {
        self.priority_inflight.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn any_priority_inflight(&self) -> bool {
        self.priority_inflight.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// The outbound/inbound message queues a [`crate::RemoteTransport`] drives.
    pub fn messages(&self) -> &Messages {
        &self.messages
    }
}
