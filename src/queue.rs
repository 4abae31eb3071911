// Copyright 2026 taskboard contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Ready queues: FIFO task queues, each guarded by its own mutex and condition variable.

use std::collections::VecDeque;
use std::time::Duration;

use crate::sync::{Condvar, Mutex};
use crate::task::Task;

/// Where a reinserted (yielded) task goes: the head, so it resumes next unless another executor
/// intervenes, or the tail, for plain round-robin. Head is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reinsert {
    Head,
    Tail,
}

/// One FIFO ready queue with its own mutex and condvar, matching the per-queue locking the board
/// relies on (see the lock-acquisition order in the crate-level docs).
pub struct ReadyQueue {
    tasks: Mutex<VecDeque<Box<Task>>>,
    not_empty: Condvar,
}

impl ReadyQueue {
    pub fn new() -> Self {
        ReadyQueue {
            tasks: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert at the tail and wake one waiter.
    pub fn push_back(&self, task: Box<Task>) {
        let mut guard = self.tasks.lock().unwrap();
        guard.push_back(task);
        self.not_empty.notify_one();
    }

    /// Insert at the head and wake one waiter. Used for `Priority` tasks and head-reinsertion.
    pub fn push_front(&self, task: Box<Task>) {
        let mut guard = self.tasks.lock().unwrap();
        guard.push_front(task);
        self.not_empty.notify_one();
    }

    pub fn push(&self, task: Box<Task>, reinsert: Reinsert) {
        match reinsert {
            Reinsert::Head => self.push_front(task),
            Reinsert::Tail => self.push_back(task),
        }
    }

    /// Pop the head if present, without blocking.
    pub fn try_pop(&self) -> Option<Box<Task>> {
        self.tasks.lock().unwrap().pop_front()
    }

    /// Try to pop the head; if empty, wait on the condvar for at most `timeout` and try once
    /// more. Used by the primary executor's helping loop, which needs to interleave a bounded
    /// wait with opportunistically stealing from a secondary queue rather than blocking
    /// indefinitely on its own condvar alone.
    pub fn try_pop_wait(&self, timeout: Duration) -> Option<Box<Task>> {
        let mut guard = self.tasks.lock().unwrap();
        if let Some(task) = guard.pop_front() {
            return Some(task);
        }
        let (mut guard, _timeout) = self.not_empty.wait_timeout(guard, timeout).unwrap();
        guard.pop_front()
    }

    /// Pop the head, blocking on the condvar while empty and `should_stop` returns false.
    /// Returns `None` only when `should_stop` became true while waiting.
    pub fn pop_wait(&self, should_stop: impl Fn() -> bool) -> Option<Box<Task>> {
        let mut guard = self.tasks.lock().unwrap();
        loop {
            if let Some(task) = guard.pop_front() {
                return Some(task);
            }
            if should_stop() {
                return None;
            }
            let (g, _timeout) = self
                .not_empty
                .wait_timeout(guard, Duration::from_millis(50))
                .unwrap();
            guard = g;
        }
    }

    /// Wake every waiter without inserting anything; used on shutdown so parked executors observe
    /// the shutdown flag promptly instead of waiting out their poll timeout.
    pub fn notify_all(&self) {
        self.not_empty.notify_all();
    }

    /// Drain every remaining task, freeing them. Used by `TaskBoard::destroy`.
    pub fn drain(&self) -> Vec<Box<Task>> {
        self.tasks.lock().unwrap().drain(..).collect()
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Func;
    use crate::task::{TaskClass, TaskOrigin};

    fn noop() {}

    fn new_task() -> Box<Task> {
        Box::new(
            Task::new(
                Func::new(noop, "noop"),
                TaskClass::Secondary,
                TaskOrigin::Local,
                None,
            )
            .expect("stack allocation for a test task should not fail"),
        )
    }

    #[test]
    fn fifo_tail_insert_head_dequeue() {
        let queue = ReadyQueue::new();
        queue.push_back(new_task());
        queue.push_back(new_task());
        assert_eq!(queue.len(), 2);
        assert!(queue.try_pop().is_some());
        assert_eq!(queue.len(), 1);
        assert!(queue.try_pop().is_some());
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn push_front_bypasses_to_head() {
        let queue = ReadyQueue::new();
        let first = new_task();
        let first_addr: *const Task = &*first;
        queue.push_back(first);
        queue.push_back(new_task());
        queue.push_front(new_task());

        let popped = queue.try_pop().unwrap();
        // The just-pushed-to-front task, not the tail-inserted one, comes out first.
        assert_ne!(&*popped as *const Task, first_addr);
    }

    #[test]
    fn drain_empties_the_queue_and_returns_everything() {
        let queue = ReadyQueue::new();
        for _ in 0..5 {
            queue.push_back(new_task());
        }
        let drained = queue.drain();
        assert_eq!(drained.len(), 5);
        assert!(queue.is_empty());
    }

    #[test]
    fn try_pop_wait_returns_none_on_timeout_when_empty() {
        let queue = ReadyQueue::new();
        assert!(queue
            .try_pop_wait(std::time::Duration::from_millis(10))
            .is_none());
    }

    #[test]
    fn pop_wait_stops_when_should_stop_becomes_true() {
        let queue = ReadyQueue::new();
        assert!(queue.pop_wait(|| true).is_none());
    }
}

/// Model-checks the mutex/condvar pair under every interleaving `loom` is willing to explore.
/// Run with `RUSTFLAGS="--cfg loom" cargo test --release --test-threads 1 -- --ignored loom`.
#[cfg(all(test, loom))]
mod loom_tests {
    use std::sync::Arc;

    use loom::thread;

    use super::*;
    use crate::id::Func;
    use crate::task::{TaskClass, TaskOrigin};

    fn noop() {}

    fn new_task() -> Box<Task> {
        Box::new(
            Task::new(
                Func::new(noop, "noop"),
                TaskClass::Secondary,
                TaskOrigin::Local,
                None,
            )
            .expect("stack allocation for a loom test task should not fail"),
        )
    }

    /// One producer pushes while one consumer pops; every pushed task is eventually observed by
    /// exactly one side (push/pop never lose or duplicate a task), under any scheduling loom
    /// explores of the queue's mutex and condvar.
    #[test]
    fn concurrent_push_and_pop_never_lose_a_task() {
        loom::model(|| {
            let queue = Arc::new(ReadyQueue::new());

            let producer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    queue.push_back(new_task());
                })
            };

            let mut got = false;
            for _ in 0..2 {
                if queue.try_pop().is_some() {
                    got = true;
                    break;
                }
                thread::yield_now();
            }

            producer.join().unwrap();

            if !got {
                // The push may not have landed before our polling window; drain whatever is left
                // so the total across both paths is exactly one task, never zero or two.
                got = !queue.drain().is_empty();
            }
            assert!(got, "the single pushed task must be observed exactly once");
        });
    }

    /// `notify_all` concurrent with a waiter must not leave the waiter parked forever: this is
    /// the exact interleaving `TaskBoard::kill` relies on to wake sleeping executors.
    #[test]
    fn notify_all_concurrent_with_waiter_does_not_deadlock() {
        loom::model(|| {
            let queue = Arc::new(ReadyQueue::new());
            let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

            let waiter = {
                let queue = Arc::clone(&queue);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    queue.pop_wait(|| stop.load(std::sync::atomic::Ordering::SeqCst));
                })
            };

            stop.store(true, std::sync::atomic::Ordering::SeqCst);
            queue.notify_all();

            waiter.join().unwrap();
        });
    }
}
