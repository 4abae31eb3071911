// Copyright 2026 taskboard contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Per-function execution statistics.
//!
//! Touched on every task completion; guarded by a single mutex over the whole table (innermost
//! lock in the board's acquisition order, see the crate-level docs).

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

use crate::id::Func;

/// Aggregate statistics for every completion of one task function.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryEntry {
    name: &'static str,
    /// Incremental mean of CPU time per completion.
    mean_t: Duration,
    /// Incremental mean of yields per completion.
    mean_yield: f64,
    /// Running total of yields across all executions, completed or not.
    yields: u64,
    /// Every `task_create`/`blocking_task_create` start, whether or not it finishes.
    executions: u64,
    /// Every normal terminal exit.
    completions: u64,
}

impl HistoryEntry {
    fn new(name: &'static str) -> Self {
        HistoryEntry {
            name,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
    pub fn mean_time(&self) -> Duration {
        self.mean_t
    }
    pub fn mean_yields(&self) -> f64 {
        self.mean_yield
    }
    pub fn yields(&self) -> u64 {
        self.yields
    }
    pub fn executions(&self) -> u64 {
        self.executions
    }
    pub fn completions(&self) -> u64 {
        self.completions
    }
}

/// The board's execution-history table.
#[derive(Default)]
pub struct History {
    table: Mutex<HashMap<usize, HistoryEntry>>,
}

impl History {
    pub fn new() -> Self {
        History {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Record a task start: create the entry if missing, then increment `executions`.
    pub fn record_exec(&self, func: Func) {
        let mut table = self.table.lock().unwrap();
        let entry = table
            .entry(func.addr())
            .or_insert_with(|| HistoryEntry::new(func.name));
        entry.executions += 1;
        tracing::trace!(task.name = func.name, entry.executions, "record_exec");
    }

    /// Lookup-only; does not create an entry.
    pub fn fetch_exec(&self, func: Func) -> Option<HistoryEntry> {
        self.table.lock().unwrap().get(&func.addr()).copied()
    }

    /// Called once per yield, while the task is still running.
    pub fn record_yield(&self, func: Func) {
        let mut table = self.table.lock().unwrap();
        if let Some(entry) = table.get_mut(&func.addr()) {
            entry.yields += 1;
        }
    }

    /// Called exactly once per normal completion; recomputes both incremental means.
    pub fn record_completion(&self, func: Func, cpu_time: Duration, task_yields: u64) {
        let mut table = self.table.lock().unwrap();
        let entry = table
            .entry(func.addr())
            .or_insert_with(|| HistoryEntry::new(func.name));
        entry.completions += 1;
        let n = entry.completions as f64;
        let prev_t = entry.mean_t.as_secs_f64();
        entry.mean_t = Duration::from_secs_f64(prev_t + (cpu_time.as_secs_f64() - prev_t) / n);
        entry.mean_yield += (task_yields as f64 - entry.mean_yield) / n;
        tracing::trace!(
            task.name = func.name,
            entry.completions,
            ?cpu_time,
            "record_completion"
        );
    }

    /// `task 'name' completed C/E times, yielding Y times with mean execution time T`
    pub fn print_records<W: Write>(&self, mut out: W) -> io::Result<()> {
        let table = self.table.lock().unwrap();
        for entry in table.values() {
            writeln!(
                out,
                "task '{}' completed {}/{} times, yielding {} times with mean execution time {:?}",
                entry.name, entry.completions, entry.executions, entry.yields, entry.mean_t
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Func;

    fn sample() {}

    #[test]
    fn fetch_before_record_exec_is_none() {
        let history = History::new();
        assert!(history.fetch_exec(Func::new(sample, "sample")).is_none());
    }

    #[test]
    fn record_exec_then_fetch_shows_one_execution_zero_completions() {
        let history = History::new();
        let func = Func::new(sample, "sample");
        history.record_exec(func);
        let entry = history.fetch_exec(func).unwrap();
        assert_eq!(entry.executions(), 1);
        assert_eq!(entry.completions(), 0);
    }

    #[test]
    fn completions_never_exceed_executions() {
        let history = History::new();
        let func = Func::new(sample, "sample");
        history.record_exec(func);
        history.record_completion(func, Duration::from_millis(5), 2);
        let entry = history.fetch_exec(func).unwrap();
        assert!(entry.completions() <= entry.executions());
    }

    #[test]
    fn mean_time_matches_incremental_average() {
        let history = History::new();
        let func = Func::new(sample, "sample");
        let samples = [
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(30),
        ];
        for &d in &samples {
            history.record_exec(func);
            history.record_completion(func, d, 0);
        }
        let entry = history.fetch_exec(func).unwrap();
        let expected: f64 =
            samples.iter().map(Duration::as_secs_f64).sum::<f64>() / samples.len() as f64;
        assert!((entry.mean_time().as_secs_f64() - expected).abs() < 1e-9);
    }

    #[test]
    fn mean_yields_matches_incremental_average() {
        let history = History::new();
        let func = Func::new(sample, "sample");
        for yields in [0u64, 4, 2] {
            history.record_exec(func);
            history.record_completion(func, Duration::ZERO, yields);
        }
        let entry = history.fetch_exec(func).unwrap();
        assert!((entry.mean_yields() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn print_records_formats_one_line_per_entry() {
        let history = History::new();
        let func = Func::new(sample, "sample");
        history.record_exec(func);
        history.record_completion(func, Duration::from_millis(1), 1);

        let mut out = Vec::new();
        history.print_records(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("task 'sample' completed 1/1 times, yielding"));
    }
}
