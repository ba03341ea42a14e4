//! Worker pool for blocking calls
//!
//! Blocking HTTP and filesystem work is shipped to worker threads; the
//! result comes back over a oneshot channel that a task awaits.

use futures::channel::oneshot;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use tessera_core::{Result, TesseraError};

type WorkItem = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of worker threads, or inline execution when built with
/// `WorkerPool::inline()`
pub struct WorkerPool {
    sender: Option<mpsc::Sender<WorkItem>>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` worker threads (at least one)
    pub fn new(size: usize) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<WorkItem>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut threads = Vec::with_capacity(size.max(1));
        for index in 0..size.max(1) {
            let receiver = Arc::clone(&receiver);
            let handle = std::thread::Builder::new()
                .name(format!("tessera-worker-{}", index))
                .spawn(move || worker_loop(receiver))
                .map_err(|e| {
                    TesseraError::SchedulerError(format!("Failed to spawn worker: {}", e))
                })?;
            threads.push(handle);
        }

        Ok(Self {
            sender: Some(sender),
            threads,
        })
    }

    /// Run every submitted closure immediately on the calling thread
    pub fn inline() -> Self {
        Self {
            sender: None,
            threads: Vec::new(),
        }
    }

    /// Queue a closure; the receiver resolves with its return value, or is
    /// cancelled if the closure panicked.
    pub fn submit<T, F>(&self, work: F) -> oneshot::Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let item: WorkItem = Box::new(move || {
            let _ = tx.send(work());
        });

        match &self.sender {
            Some(sender) => {
                if let Err(mpsc::SendError(item)) = sender.send(item) {
                    tracing::error!("Worker pool is gone; dropping work item");
                    drop(item);
                }
            }
            None => run_item(item),
        }
        rx
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(receiver: Arc<Mutex<mpsc::Receiver<WorkItem>>>) {
    loop {
        let next = match receiver.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => break,
        };
        match next {
            Ok(item) => run_item(item),
            Err(_) => break,
        }
    }
}

fn run_item(item: WorkItem) {
    if catch_unwind(AssertUnwindSafe(item)).is_err() {
        tracing::error!("Worker item panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_inline_runs_immediately() {
        let pool = WorkerPool::inline();
        let mut rx = pool.submit(|| 2 + 2);
        assert_eq!(rx.try_recv().unwrap(), Some(4));
    }

    #[test]
    fn test_threaded_pool_delivers_results() {
        let pool = WorkerPool::new(2).unwrap();
        let receivers: Vec<_> = (0..8u32).map(|i| pool.submit(move || i * 10)).collect();
        let results: Vec<u32> = receivers
            .into_iter()
            .map(|rx| block_on(rx).unwrap())
            .collect();
        assert_eq!(results, vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[test]
    fn test_panicking_item_cancels_receiver_and_pool_survives() {
        let pool = WorkerPool::new(1).unwrap();
        let failed = pool.submit(|| -> u32 { panic!("boom") });
        assert!(block_on(failed).is_err());

        let ok = pool.submit(|| 7u32);
        assert_eq!(block_on(ok).unwrap(), 7);
    }
}
