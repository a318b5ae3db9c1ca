//! Concurrent taxis racing for the same pending task must never both win
//! the claim (spec invariant: "at most one taxi may hold a given task in
//! `active` state"), grounded in the donor's work-stealing scheduler tests
//! spawning multiple concurrent workers against one shared queue.

use std::sync::Arc;
use std::time::Duration;

use taxi_dispatch::{Dispatcher, DispatcherConfig, Job, JobKind, MemoryTaskStore, Taxi, TaskStatus, TaskType};
use tokio::sync::Barrier;

#[tokio::test]
async fn exactly_one_concurrent_claim_wins_per_task() {
    let dispatcher = Arc::new(Dispatcher::new(
        MemoryTaskStore::new(),
        DispatcherConfig::default(),
    ));

    let jobs: Vec<Job> = (0..1)
        .map(|_| Job::new(JobKind::Respawn).req_time(1))
        .collect();
    dispatcher.initialize_new_job_pool(jobs, None).await.unwrap();

    const N_TAXIS: usize = 8;
    let barrier = Arc::new(Barrier::new(N_TAXIS));

    let mut handles = Vec::with_capacity(N_TAXIS);
    for i in 0..N_TAXIS {
        let dispatcher = dispatcher.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let taxi = Taxi::new(format!("taxi-{i}"), "pool-a", Duration::from_secs(100), 0);
            barrier.wait().await;
            dispatcher.get_task_to_run(&taxi, 0).await.unwrap()
        }));
    }

    let mut real_task_wins = 0;
    let mut terminal_signals = 0;
    for handle in handles {
        let task = handle.await.unwrap();
        match task.task_type {
            TaskType::Respawn => {
                assert_eq!(task.status, TaskStatus::Active);
                real_task_wins += 1;
            }
            TaskType::Sleep | TaskType::Die => terminal_signals += 1,
            other => panic!("unexpected task type {other:?}"),
        }
    }

    assert_eq!(real_task_wins, 1, "exactly one taxi should claim the task");
    assert_eq!(terminal_signals, N_TAXIS - 1);
}
