//! Cooperative task scheduler driven by the host's tick
//!
//! Tasks are plain futures polled on the host thread. `tick()` polls every
//! pending task exactly once; a task runs until it awaits something that is
//! not ready yet (a worker result or a sleep) and resumes on a later tick.
//! Nothing here blocks, so the host's frame loop stays responsive.
//!
//! Cancellation drops the task's future at the next tick, which runs the
//! destructors of everything it owned at its suspension point.

use crate::clock::Clock;
use crate::worker::WorkerPool;
use futures::task::noop_waker_ref;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tessera_core::{Result, TesseraError};

type TaskFuture = Pin<Box<dyn Future<Output = Result<()>>>>;

/// Identifies a spawned task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Shared cancellation flag, readable from worker threads
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a task left the scheduler
#[derive(Debug)]
pub enum TaskOutcome {
    Completed { id: TaskId, name: String },
    Failed { id: TaskId, name: String, error: TesseraError },
    Cancelled { id: TaskId, name: String },
}

impl TaskOutcome {
    pub fn id(&self) -> TaskId {
        match self {
            TaskOutcome::Completed { id, .. }
            | TaskOutcome::Failed { id, .. }
            | TaskOutcome::Cancelled { id, .. } => *id,
        }
    }
}

/// Handle a task uses to reach the worker pool and the clock
#[derive(Clone)]
pub struct TaskContext {
    workers: Rc<WorkerPool>,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
}

impl TaskContext {
    /// Run a blocking closure on a worker and wait for its result
    pub async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        match self.workers.submit(work).await {
            Ok(result) => result,
            Err(_) => Err(TesseraError::SchedulerError(
                "worker dropped the call before finishing".to_string(),
            )),
        }
    }

    /// Suspend until `duration` has passed on the scheduler clock
    pub fn sleep(&self, duration: Duration) -> Sleep {
        Sleep {
            clock: Arc::clone(&self.clock),
            deadline: self.clock.now() + duration,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token to hand to blocking closures so they can bail out early
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Future returned by [`TaskContext::sleep`]
pub struct Sleep {
    clock: Arc<dyn Clock>,
    deadline: Instant,
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.clock.now() >= self.deadline {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

struct Task {
    id: TaskId,
    name: String,
    future: TaskFuture,
    cancel: CancelToken,
}

/// Single-threaded scheduler for orchestration tasks
pub struct Scheduler {
    tasks: Vec<Task>,
    next_id: u64,
    workers: Rc<WorkerPool>,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(workers: WorkerPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
            workers: Rc::new(workers),
            clock,
        }
    }

    /// Register a task. It is first polled on the next `tick()`.
    pub fn spawn<F, Fut>(&mut self, name: &str, make: F) -> TaskId
    where
        F: FnOnce(TaskContext) -> Fut,
        Fut: Future<Output = Result<()>> + 'static,
    {
        let id = TaskId(self.next_id);
        self.next_id += 1;

        let cancel = CancelToken::new();
        let ctx = TaskContext {
            workers: Rc::clone(&self.workers),
            clock: Arc::clone(&self.clock),
            cancel: cancel.clone(),
        };

        tracing::debug!(task = %id, name, "Task spawned");
        self.tasks.push(Task {
            id,
            name: name.to_string(),
            future: Box::pin(make(ctx)),
            cancel,
        });
        id
    }

    /// Mark a task for termination. Returns false if it is not pending.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.tasks.iter().find(|t| t.id == id) {
            Some(task) => {
                task.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Advance every pending task once. Errors and panics are contained
    /// here and reported as `TaskOutcome::Failed`.
    pub fn tick(&mut self) -> Vec<TaskOutcome> {
        let mut cx = Context::from_waker(noop_waker_ref());
        let mut outcomes = Vec::new();

        for mut task in std::mem::take(&mut self.tasks) {
            if task.cancel.is_cancelled() {
                let Task { id, name, future, .. } = task;
                drop(future);
                tracing::info!(task = %id, name = %name, "Task cancelled");
                outcomes.push(TaskOutcome::Cancelled { id, name });
                continue;
            }

            let polled = catch_unwind(AssertUnwindSafe(|| task.future.as_mut().poll(&mut cx)));
            let finished = match polled {
                Ok(Poll::Pending) => {
                    self.tasks.push(task);
                    continue;
                }
                Ok(Poll::Ready(result)) => Ok(result),
                Err(panic) => Err(panic_message(panic.as_ref())),
            };

            let Task { id, name, future, .. } = task;
            drop(future);

            match finished {
                Ok(Ok(())) => {
                    tracing::debug!(task = %id, name = %name, "Task completed");
                    outcomes.push(TaskOutcome::Completed { id, name });
                }
                Ok(Err(TesseraError::Cancelled)) => {
                    tracing::info!(task = %id, name = %name, "Task exited on cancellation");
                    outcomes.push(TaskOutcome::Cancelled { id, name });
                }
                Ok(Err(error)) => {
                    tracing::error!(task = %id, name = %name, error = %error, "Task failed");
                    outcomes.push(TaskOutcome::Failed { id, name, error });
                }
                Err(message) => {
                    tracing::error!(task = %id, name = %name, message = %message, "Task panicked");
                    outcomes.push(TaskOutcome::Failed {
                        id,
                        name,
                        error: TesseraError::SchedulerError(format!("task panicked: {}", message)),
                    });
                }
            }
        }

        outcomes
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::cell::{Cell, RefCell};

    fn inline_scheduler() -> (Scheduler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (Scheduler::new(WorkerPool::inline(), clock.clone()), clock)
    }

    struct DropFlag(Rc<Cell<bool>>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    #[test]
    fn test_spawn_does_not_poll_until_tick() {
        let (mut scheduler, _) = inline_scheduler();
        let started = Rc::new(Cell::new(false));
        let flag = started.clone();
        scheduler.spawn("probe", move |_| async move {
            flag.set(true);
            Ok(())
        });

        assert!(!started.get());
        let outcomes = scheduler.tick();
        assert!(started.get());
        assert!(matches!(outcomes[0], TaskOutcome::Completed { .. }));
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_sleep_resumes_only_after_deadline() {
        let (mut scheduler, clock) = inline_scheduler();
        let steps = Rc::new(Cell::new(0));
        let counter = steps.clone();
        scheduler.spawn("sleeper", move |ctx| async move {
            counter.set(1);
            ctx.sleep(Duration::from_secs(10)).await;
            counter.set(2);
            Ok(())
        });

        scheduler.tick();
        assert_eq!(steps.get(), 1);
        clock.advance(Duration::from_secs(9));
        scheduler.tick();
        assert_eq!(steps.get(), 1);
        clock.advance(Duration::from_secs(1));
        let outcomes = scheduler.tick();
        assert_eq!(steps.get(), 2);
        assert_eq!(outcomes.len(), 1);
    }

    #[test]
    fn test_tasks_interleave_one_step_per_tick() {
        let (mut scheduler, clock) = inline_scheduler();
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b"] {
            let log = log.clone();
            scheduler.spawn(name, move |ctx| async move {
                log.borrow_mut().push(format!("{}1", name));
                ctx.sleep(Duration::from_secs(1)).await;
                log.borrow_mut().push(format!("{}2", name));
                Ok(())
            });
        }

        scheduler.tick();
        assert_eq!(*log.borrow(), vec!["a1", "b1"]);
        clock.advance(Duration::from_secs(1));
        scheduler.tick();
        assert_eq!(*log.borrow(), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn test_cancel_drops_future_and_releases_resources() {
        let (mut scheduler, _) = inline_scheduler();
        let dropped = Rc::new(Cell::new(false));
        let reached_end = Rc::new(Cell::new(false));
        let (flag, end) = (dropped.clone(), reached_end.clone());

        let id = scheduler.spawn("long", move |ctx| async move {
            let _guard = DropFlag(flag);
            ctx.sleep(Duration::from_secs(3600)).await;
            end.set(true);
            Ok(())
        });

        scheduler.tick();
        assert!(!dropped.get());
        assert!(scheduler.cancel(id));

        let outcomes = scheduler.tick();
        assert!(matches!(outcomes[0], TaskOutcome::Cancelled { .. }));
        assert!(dropped.get());
        assert!(!reached_end.get());
        assert!(!scheduler.cancel(id));
    }

    #[test]
    fn test_error_is_reported_not_propagated() {
        let (mut scheduler, _) = inline_scheduler();
        scheduler.spawn("failing", |_| async { Err::<(), _>(TesseraError::NoMeshBound) });
        scheduler.spawn("fine", |_| async { Ok(()) });

        let outcomes = scheduler.tick();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0],
            TaskOutcome::Failed {
                error: TesseraError::NoMeshBound,
                ..
            }
        ));
        assert!(matches!(outcomes[1], TaskOutcome::Completed { .. }));
    }

    fn explode() -> Result<()> {
        panic!("bad state")
    }

    #[test]
    fn test_panic_is_contained() {
        let (mut scheduler, _) = inline_scheduler();
        scheduler.spawn("panics", |_| async { explode() });

        let outcomes = scheduler.tick();
        match &outcomes[0] {
            TaskOutcome::Failed { error, .. } => {
                assert!(error.to_string().contains("bad state"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_blocking_call_on_worker_threads() {
        let clock = Arc::new(crate::clock::SystemClock);
        let mut scheduler = Scheduler::new(WorkerPool::new(1).unwrap(), clock);
        let result = Rc::new(Cell::new(0u32));
        let out = result.clone();
        scheduler.spawn("blocking", move |ctx| async move {
            let value = ctx
                .blocking(|| {
                    std::thread::sleep(Duration::from_millis(20));
                    Ok(21 * 2)
                })
                .await?;
            out.set(value);
            Ok(())
        });

        let mut ticks = 0;
        while !scheduler.is_idle() && ticks < 500 {
            scheduler.tick();
            ticks += 1;
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(result.get(), 42);
        assert!(ticks > 1, "first tick must not block on the worker");
    }

    #[test]
    fn test_cancel_token_visible_to_worker_closure() {
        let (mut scheduler, _) = inline_scheduler();
        let seen = Rc::new(Cell::new(None));
        let out = seen.clone();
        scheduler.spawn("token", move |ctx| async move {
            let token = ctx.cancel_token();
            token.cancel();
            let observed = ctx.blocking(move || Ok(token.is_cancelled())).await?;
            out.set(Some(observed));
            Ok(())
        });
        scheduler.tick();
        assert_eq!(seen.get(), Some(true));
    }
}
