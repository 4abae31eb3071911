//! A blocking child that never finishes (it loops `task_yield()` forever) must not prevent a
//! clean shutdown: `destroy()` returns promptly, freeing both parent and child.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use taskboard::{
    blocking_task_create, task_create, task_fn, task_get_args, task_yield, BoardConfig, TaskBoard,
    TaskClass,
};

mod common;
use common::init_tracing;

type Args = Arc<TaskBoard>;

fn forever_child() {
    loop {
        task_yield();
    }
}

fn spawns_forever_child() {
    let board = task_get_args::<Args>().unwrap();
    let board = Arc::clone(board);
    let _ = blocking_task_create(
        &board,
        task_fn!(forever_child),
        TaskClass::Secondary,
        Some(Box::new(Arc::clone(&board))),
    );
}

#[test]
fn shutdown_terminates_cleanly_with_a_never_ending_blocking_child() {
    init_tracing();
    let board = TaskBoard::create(BoardConfig::new().secondaries(2));
    board.start().unwrap();

    task_create(
        &board,
        task_fn!(spawns_forever_child),
        TaskClass::Secondary,
        Some(Box::new(Arc::clone(&board))),
    )
    .unwrap();

    thread::sleep(Duration::from_millis(100));

    let board_for_destroy = Arc::clone(&board);
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        board_for_destroy.destroy();
        let _ = tx.send(());
    });

    assert!(
        rx.recv_timeout(Duration::from_secs(5)).is_ok(),
        "destroy() must return promptly even with a never-ending blocking child in flight"
    );
    handle.join().unwrap();
}
