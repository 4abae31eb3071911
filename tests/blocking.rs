//! A blocking subtask runs to completion before its suspended parent resumes, and the parent
//! observes the child's effect.
//!
//! Task functions are bare `fn()` items (no closures), so a task that needs to reach the board
//! or share state with its parent/child receives both through its own argument, the way an
//! embedder without a process-global reaches something from inside a task body.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskboard::{blocking_task_create, task_create, task_fn, task_get_args, BoardConfig, TaskBoard, TaskClass};

mod common;
use common::{init_tracing, wait_until};

struct Shared {
    a: i64,
    b: i64,
    result: Mutex<Option<i64>>,
    /// Records the relative order "child" / "parent resumed", to check the blocking invariant
    /// that the child completes strictly before the parent resumes.
    order: Mutex<Vec<&'static str>>,
}

type Args = (Arc<TaskBoard>, Arc<Shared>);

fn child_add() {
    let (_board, shared) = task_get_args::<Args>().unwrap();
    shared.order.lock().unwrap().push("child");
    *shared.result.lock().unwrap() = Some(shared.a + shared.b);
}

fn parent_add() {
    let (board, shared) = task_get_args::<Args>().unwrap();
    let board = Arc::clone(board);
    let shared = Arc::clone(shared);

    let child_args: Args = (Arc::clone(&board), Arc::clone(&shared));
    let ok = blocking_task_create(
        &board,
        task_fn!(child_add),
        TaskClass::Secondary,
        Some(Box::new(child_args)),
    )
    .expect("called from within a running task");

    shared
        .order
        .lock()
        .unwrap()
        .push(if ok { "parent_resumed_ok" } else { "parent_resumed_err" });
}

#[test]
fn blocking_child_completes_before_parent_resumes() {
    init_tracing();
    let board = TaskBoard::create(BoardConfig::new().secondaries(2));
    board.start().unwrap();

    let shared = Arc::new(Shared {
        a: 19,
        b: 23,
        result: Mutex::new(None),
        order: Mutex::new(Vec::new()),
    });
    let parent_args: Args = (Arc::clone(&board), Arc::clone(&shared));

    task_create(
        &board,
        task_fn!(parent_add),
        TaskClass::Primary,
        Some(Box::new(parent_args)),
    )
    .unwrap();

    let parent_func = task_fn!(parent_add);
    assert!(
        wait_until(Duration::from_secs(2), || board
            .history()
            .fetch_exec(parent_func)
            .map(|e| e.completions())
            == Some(1)),
        "parent task never completed"
    );

    assert_eq!(*shared.result.lock().unwrap(), Some(42));
    assert_eq!(
        *shared.order.lock().unwrap(),
        vec!["child", "parent_resumed_ok"],
        "the child must run to completion before the parent resumes"
    );

    let child_func = task_fn!(child_add);
    let child_hist = board.history().fetch_exec(child_func).unwrap();
    assert_eq!(child_hist.executions(), 1);
    assert_eq!(child_hist.completions(), 1);

    let parent_hist = board.history().fetch_exec(parent_func).unwrap();
    assert_eq!(parent_hist.executions(), 1);
    assert_eq!(parent_hist.completions(), 1);

    Arc::clone(&board).destroy();
}
