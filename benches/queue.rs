// Copyright 2026 taskboard contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Measures `task_create`'s admission-plus-placement cost in isolation: a board that is never
//! started, so no executor thread ever drains the queues being measured.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use taskboard::{task_create, task_fn, BoardConfig, TaskBoard, TaskClass};

fn noop() {}

fn fresh_board(secondaries: usize) -> std::sync::Arc<TaskBoard> {
    TaskBoard::create(
        BoardConfig::new()
            .secondaries(secondaries)
            .max_tasks(taskboard::MAX_TASKS),
    )
}

fn primary_tail_placement(c: &mut Criterion) {
    c.bench_function("primary_tail_placement", |b| {
        b.iter_batched(
            || fresh_board(0),
            |board| {
                task_create(&board, task_fn!(noop), TaskClass::Primary, None).unwrap();
                board
            },
            BatchSize::SmallInput,
        )
    });
}

fn priority_head_placement(c: &mut Criterion) {
    c.bench_function("priority_head_placement", |b| {
        b.iter_batched(
            || fresh_board(0),
            |board| {
                task_create(&board, task_fn!(noop), TaskClass::Priority, None).unwrap();
                board
            },
            BatchSize::SmallInput,
        )
    });
}

/// Placement into the shortest of `MAX_SECONDARIES` queues is the one placement path with
/// nontrivial work (a linear scan for the minimum length); pre-loading every queue but one
/// exercises the scan rather than the trivial single-queue case.
fn secondary_shortest_queue_placement(c: &mut Criterion) {
    c.bench_function("secondary_shortest_queue_placement", |b| {
        b.iter_batched(
            || {
                let board = fresh_board(taskboard::MAX_SECONDARIES);
                for _ in 0..taskboard::MAX_SECONDARIES - 1 {
                    task_create(&board, task_fn!(noop), TaskClass::Secondary, None).unwrap();
                }
                board
            },
            |board| {
                task_create(&board, task_fn!(noop), TaskClass::Secondary, None).unwrap();
                board
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    placement,
    primary_tail_placement,
    priority_head_placement,
    secondary_shortest_queue_placement,
);
criterion_main!(placement);
