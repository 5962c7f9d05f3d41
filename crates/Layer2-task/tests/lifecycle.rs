//! Task lifecycle integration tests - full scheduling scenarios
//!
//! `cargo test -p warden-task --test lifecycle -- --nocapture`

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use warden_foundation::event::EventCategory;
use warden_foundation::{EventFilter, EventListener, Result, WardenEvent};
use warden_task::{
    AgentExecutor, AgentKind, OrchestratorConfig, Task, TaskHandle, TaskId, TaskOrchestrator,
    TaskPriority, TaskStatus,
};

fn init() -> TaskOrchestrator {
    let _ = warden_foundation::try_init_logging("warn");
    TaskOrchestrator::new(OrchestratorConfig::default())
}

/// Poll until the task reaches the wanted status or the deadline passes
async fn wait_for_status(
    orchestrator: &TaskOrchestrator,
    id: TaskId,
    status: TaskStatus,
) -> Task {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(task) = orchestrator.get_task(id).await {
            if task.status == status {
                return task;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!("task {} never reached {:?}", id, status);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Drain everything currently sitting in the event ring
fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<WardenEvent>) -> Vec<WardenEvent> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

/// Agent that counts to `steps`, honoring pause and cancel signals
struct CountingAgent {
    steps: u64,
    step_delay: Duration,
    iterations: Arc<AtomicU64>,
}

impl CountingAgent {
    fn new(steps: u64, step_delay: Duration) -> (Self, Arc<AtomicU64>) {
        let iterations = Arc::new(AtomicU64::new(0));
        (
            Self {
                steps,
                step_delay,
                iterations: Arc::clone(&iterations),
            },
            iterations,
        )
    }
}

#[async_trait]
impl AgentExecutor for CountingAgent {
    fn name(&self) -> &'static str {
        "counting-agent"
    }

    async fn run(&self, handle: TaskHandle) -> Result<()> {
        for step in 1..=self.steps {
            if handle.is_cancel_requested().await {
                return Ok(());
            }
            while handle.is_pause_requested().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tokio::time::sleep(self.step_delay).await;
            self.iterations.fetch_add(1, Ordering::SeqCst);
            handle.update_progress(step, Some("processing")).await;
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_priority_dispatch_scenario() -> anyhow::Result<()> {
    let orchestrator = init();

    // 1. An organization run grabs the idle slot
    let organize = orchestrator
        .submit(
            Task::new("downloads-organizer", AgentKind::Organization, "tidy downloads")
                .with_total_items(500),
        )
        .await?;
    assert_eq!(
        orchestrator.current_task().await.unwrap().id,
        organize,
        "idle slot should be taken immediately"
    );

    // 2. A duplicate scan queues behind it
    let dupes = orchestrator
        .submit(
            Task::new("dupe-finder", AgentKind::DuplicateDetection, "scan photo library")
                .with_priority(TaskPriority::High),
        )
        .await?;

    // 3. Disk almost full: a critical space recovery jumps the queue
    let recovery = orchestrator
        .submit(
            Task::new("space-recovery", AgentKind::SpaceRecovery, "free up disk space")
                .with_priority(TaskPriority::Critical),
        )
        .await?;

    assert_eq!(orchestrator.queue_len().await, 2);
    println!("1. organizer running, {} waiting", orchestrator.queue_len().await);

    // 4. Organizer finishes; recovery outranks the earlier duplicate scan
    orchestrator.complete(organize, true, None).await?;
    assert_eq!(orchestrator.current_task().await.unwrap().id, recovery);
    println!("2. critical recovery promoted past the high-priority scan");

    orchestrator.complete(recovery, true, None).await?;
    assert_eq!(orchestrator.current_task().await.unwrap().id, dupes);

    orchestrator.complete(dupes, true, None).await?;
    assert!(!orchestrator.is_running().await);

    let stats = orchestrator.stats().await;
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.queued, 0);
    println!("3. all three tasks completed in priority order");
    Ok(())
}

#[tokio::test]
async fn test_event_stream_order_per_task() -> anyhow::Result<()> {
    let orchestrator = init();
    let mut rx = orchestrator.subscribe();

    let id = orchestrator
        .submit(
            Task::new("backup", AgentKind::Backup, "nightly backup")
                .with_total_items(4)
                .with_total_bytes(4_000),
        )
        .await?;

    orchestrator.update_progress(id, 1, Some("copying a")).await;
    orchestrator.update_progress_bytes(id, 1_000, None).await;
    orchestrator.pause(id).await?;
    orchestrator.resume(id).await?;
    orchestrator.update_progress(id, 4, Some("copying d")).await;
    orchestrator.complete(id, true, None).await?;

    let events = drain_events(&mut rx);
    let mine: Vec<&WardenEvent> = events
        .iter()
        .filter(|ev| ev.task_id.as_deref() == Some(id.to_string().as_str()))
        .collect();

    // exactly one queued, exactly one completed, everything in between updated
    assert_eq!(mine.first().unwrap().event_type, "task.queued");
    assert_eq!(mine.last().unwrap().event_type, "task.completed");
    assert_eq!(
        mine.iter()
            .filter(|ev| ev.event_type == "task.queued")
            .count(),
        1
    );
    assert_eq!(
        mine.iter()
            .filter(|ev| ev.event_type == "task.completed")
            .count(),
        1
    );
    // promotion + 3 progress reports + pause + resume
    assert_eq!(
        mine.iter()
            .filter(|ev| ev.event_type == "task.updated")
            .count(),
        6
    );
    assert!(mine.iter().all(|ev| ev.category == EventCategory::Task));

    // snapshots carry the live state at publish time
    let statuses: Vec<&str> = mine
        .iter()
        .map(|ev| ev.data["status"].as_str().unwrap())
        .collect();
    assert_eq!(
        statuses,
        vec![
            "queued", "running", "running", "running", "paused", "running", "running",
            "completed"
        ]
    );

    // item progress never goes backwards
    let counts: Vec<u64> = mine
        .iter()
        .map(|ev| ev.data["processed_items"].as_u64().unwrap())
        .collect();
    assert!(counts.windows(2).all(|w| w[0] <= w[1]));

    // terminal event names its final state
    let completed = mine.last().unwrap();
    assert_eq!(
        completed.metadata.get("final_state").and_then(|v| v.as_str()),
        Some("completed")
    );
    Ok(())
}

#[tokio::test]
async fn test_cancel_emits_update_then_completed() -> anyhow::Result<()> {
    let orchestrator = init();
    let mut rx = orchestrator.subscribe();

    let id = orchestrator
        .submit(Task::new("cleaner", AgentKind::Cleanup, "purge temp files"))
        .await?;
    orchestrator.cancel(id, Some("user aborted")).await?;

    let events = drain_events(&mut rx);
    let types: Vec<&str> = events.iter().map(|ev| ev.event_type.as_str()).collect();
    assert_eq!(
        types,
        vec!["task.queued", "task.updated", "task.updated", "task.completed"]
    );

    // the pre-terminal update already shows the cancelled snapshot
    let last_update = &events[types.len() - 2];
    assert_eq!(last_update.data["status"].as_str(), Some("cancelled"));
    assert_eq!(
        last_update.data["cancellation_reason"].as_str(),
        Some("user aborted")
    );

    let completed = events.last().unwrap();
    assert_eq!(
        completed.metadata.get("final_state").and_then(|v| v.as_str()),
        Some("cancelled")
    );
    Ok(())
}

#[tokio::test]
async fn test_listener_callbacks_arrive_in_order() -> anyhow::Result<()> {
    struct RecordingListener {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventListener for RecordingListener {
        fn name(&self) -> &str {
            "recording-listener"
        }

        async fn on_event(&self, event: &WardenEvent) {
            self.seen.lock().unwrap().push(event.event_type.clone());
        }
    }

    let orchestrator = init();
    let seen = Arc::new(Mutex::new(Vec::new()));
    orchestrator
        .event_bus()
        .subscribe_with_filter(
            Arc::new(RecordingListener {
                seen: Arc::clone(&seen),
            }),
            Some(EventFilter::new().with_event_types(vec!["task.".to_string()])),
        )
        .await;

    let id = orchestrator
        .submit(
            Task::new("mover", AgentKind::Organization, "move screenshots").with_total_items(2),
        )
        .await?;
    orchestrator.update_progress(id, 1, Some("moving a.png")).await;
    orchestrator.update_progress(id, 2, Some("moving b.png")).await;
    orchestrator.complete(id, true, None).await?;

    // callbacks run on the dispatch task; wait until the terminal one lands
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while seen.lock().unwrap().len() < 5 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "listener never saw the full lifecycle"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            "task.queued",
            "task.updated",
            "task.updated",
            "task.updated",
            "task.completed"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_executor_drives_task_to_completion() -> anyhow::Result<()> {
    let orchestrator = init();
    let (agent, _) = CountingAgent::new(5, Duration::from_millis(5));
    orchestrator
        .register_executor(AgentKind::Discovery, Arc::new(agent))
        .await;

    let id = orchestrator
        .submit(
            Task::new("disk-scanner", AgentKind::Discovery, "walk home directory")
                .with_total_items(5),
        )
        .await?;

    let task = wait_for_status(&orchestrator, id, TaskStatus::Completed).await;
    assert_eq!(task.processed_items, 5);
    assert_eq!(task.progress_percentage(), 100.0);
    assert!(task.completed_at.is_some());
    assert!(!orchestrator.is_running().await);
    println!("agent finished: {}", task.progress_text());
    Ok(())
}

#[tokio::test]
async fn test_executor_error_fails_task() -> anyhow::Result<()> {
    struct BrokenAgent;

    #[async_trait]
    impl AgentExecutor for BrokenAgent {
        fn name(&self) -> &'static str {
            "broken-agent"
        }

        async fn run(&self, handle: TaskHandle) -> Result<()> {
            handle.update_progress(1, Some("reading index")).await;
            Err(warden_foundation::Error::Agent(
                "index file corrupted".to_string(),
            ))
        }
    }

    let orchestrator = init();
    orchestrator
        .register_executor(AgentKind::Search, Arc::new(BrokenAgent))
        .await;

    let id = orchestrator
        .submit(Task::new("searcher", AgentKind::Search, "find *.bak").with_total_items(10))
        .await?;

    let task = wait_for_status(&orchestrator, id, TaskStatus::Failed).await;
    assert_eq!(task.errors.len(), 1);
    assert!(task.errors[0].contains("index file corrupted"));
    Ok(())
}

#[tokio::test]
async fn test_cooperative_cancel_stops_agent() -> anyhow::Result<()> {
    let orchestrator = init();
    let (agent, iterations) = CountingAgent::new(10_000, Duration::from_millis(5));
    orchestrator
        .register_executor(AgentKind::Monitoring, Arc::new(agent))
        .await;

    let id = orchestrator
        .submit(Task::new("watcher", AgentKind::Monitoring, "watch downloads"))
        .await?;

    // let the agent make some progress first
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while iterations.load(Ordering::SeqCst) < 3 {
        assert!(tokio::time::Instant::now() < deadline, "agent never started");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    orchestrator.cancel(id, Some("user closed window")).await?;
    let task = wait_for_status(&orchestrator, id, TaskStatus::Cancelled).await;
    assert_eq!(task.cancellation_reason.as_deref(), Some("user closed window"));

    // the agent observes the signal and stops iterating
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = iterations.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(
        iterations.load(Ordering::SeqCst) <= settled + 1,
        "agent kept running after cancellation"
    );

    // the runner's late completion attempt must not resurrect the task
    assert_eq!(
        orchestrator.get_task(id).await.unwrap().status,
        TaskStatus::Cancelled
    );
    Ok(())
}

#[tokio::test]
async fn test_pause_gates_agent_progress() -> anyhow::Result<()> {
    let orchestrator = init();
    let (agent, iterations) = CountingAgent::new(10_000, Duration::from_millis(5));
    orchestrator
        .register_executor(AgentKind::Classification, Arc::new(agent))
        .await;

    let id = orchestrator
        .submit(Task::new("classifier", AgentKind::Classification, "sort by type"))
        .await?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while iterations.load(Ordering::SeqCst) < 3 {
        assert!(tokio::time::Instant::now() < deadline, "agent never started");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    orchestrator.pause(id).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let paused_at = iterations.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(
        iterations.load(Ordering::SeqCst) <= paused_at + 1,
        "agent kept working while paused"
    );

    orchestrator.resume(id).await?;
    let resumed_deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while iterations.load(Ordering::SeqCst) <= paused_at + 1 {
        assert!(
            tokio::time::Instant::now() < resumed_deadline,
            "agent never resumed"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    orchestrator.cancel(id, None).await?;
    Ok(())
}

#[tokio::test]
async fn test_concurrent_submissions_keep_single_slot() -> anyhow::Result<()> {
    let orchestrator = init();

    let submissions = (0..20).map(|i| {
        let orchestrator = orchestrator.clone();
        async move {
            orchestrator
                .submit(Task::new(
                    format!("agent-{}", i),
                    AgentKind::Discovery,
                    "concurrent scan",
                ))
                .await
        }
    });
    let ids: Vec<TaskId> = futures::future::join_all(submissions)
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(ids.len(), 20);

    // exactly one slot occupant no matter the interleaving
    let stats = orchestrator.stats().await;
    assert_eq!(stats.running, 1);
    assert_eq!(stats.queued, 19);

    // draining the queue promotes exactly one task per completion
    for remaining in (0..20).rev() {
        let current = orchestrator.current_task().await.expect("slot empty");
        orchestrator.complete(current.id, true, None).await?;
        assert_eq!(orchestrator.queue_len().await, remaining.max(1) - 1);
    }

    let stats = orchestrator.stats().await;
    assert_eq!(stats.completed, 20);
    assert_eq!(stats.running, 0);
    assert_eq!(stats.queued, 0);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_cancels_live_tasks_and_notifies() -> anyhow::Result<()> {
    let orchestrator = init();
    let mut rx = orchestrator.subscribe();

    let running = orchestrator
        .submit(Task::new("organizer", AgentKind::Organization, "tidy desktop"))
        .await?;
    let queued = orchestrator
        .submit(Task::new("backup", AgentKind::Backup, "weekly backup"))
        .await?;

    orchestrator.shutdown().await;

    for id in [running, queued] {
        let task = orchestrator.get_task(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert_eq!(
            task.cancellation_reason.as_deref(),
            Some("orchestrator shutting down")
        );
    }

    let err = orchestrator
        .submit(Task::new("late", AgentKind::Cleanup, "too late"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        warden_foundation::Error::InvalidState { .. }
    ));

    // the system shutdown notice goes out after the per-task events
    let events = drain_events(&mut rx);
    assert_eq!(events.last().unwrap().event_type, "system.shutdown");
    let completed: Vec<&WardenEvent> = events
        .iter()
        .filter(|ev| ev.event_type == "task.completed")
        .collect();
    assert_eq!(completed.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_history_survives_executor_churn() -> anyhow::Result<()> {
    let _ = warden_foundation::try_init_logging("warn");
    let orchestrator = TaskOrchestrator::new(OrchestratorConfig {
        history_limit: 3,
        ..Default::default()
    });
    let (agent, _) = CountingAgent::new(2, Duration::from_millis(2));
    orchestrator
        .register_executor(AgentKind::Restore, Arc::new(agent))
        .await;

    let mut ids = Vec::new();
    for i in 0..5 {
        let id = orchestrator
            .submit(
                Task::new(format!("restore-{}", i), AgentKind::Restore, "restore files")
                    .with_total_items(2),
            )
            .await?;
        wait_for_status(&orchestrator, id, TaskStatus::Completed).await;
        ids.push(id);
    }

    // only the newest three survive, most recent first
    let history = orchestrator.completed_tasks().await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].id, ids[4]);
    assert_eq!(history[2].id, ids[2]);
    assert!(orchestrator.get_task(ids[0]).await.is_none());
    assert!(orchestrator.get_task(ids[1]).await.is_none());

    assert_eq!(orchestrator.clear_history().await, 3);
    assert!(orchestrator.completed_tasks().await.is_empty());
    Ok(())
}
