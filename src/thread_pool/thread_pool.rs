use crossbeam_channel::{unbounded, Sender};

use super::worker::{Job, Worker};

/// Fixed set of worker threads pulling boxed jobs from a shared queue.
///
/// Threads live until the pool is dropped; dropping closes the queue, lets
/// the workers finish what they already took, and joins them.
pub struct ThreadPool {
    sender: Option<Sender<Job>>,
    workers: Vec<Worker>,
}

impl ThreadPool {
    pub fn new(size: usize) -> std::io::Result<ThreadPool> {
        let (sender, receiver) = unbounded::<Job>();

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(Worker::new(id, receiver.clone())?);
        }

        tracing::debug!(workers = size, "thread pool started");

        Ok(ThreadPool {
            sender: Some(sender),
            workers,
        })
    }

    /// Queues `work`. Returns `false` if the pool is shutting down.
    pub fn submit_work<F>(&self, work: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.sender {
            Some(sender) => sender.send(Box::new(work)).is_ok(),
            None => false,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in &mut self.workers {
            worker.join();
        }
        tracing::debug!(workers = self.workers.len(), "thread pool stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_every_job_before_shutdown() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = ThreadPool::new(3).unwrap();
            assert_eq!(pool.size(), 3);
            for _ in 0..50 {
                let counter = counter.clone();
                assert!(pool.submit_work(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn survives_a_panicking_job() {
        let pool = ThreadPool::new(1).unwrap();
        pool.submit_work(|| panic!("boom"));
        let (tx, rx) = crossbeam_channel::bounded(1);
        pool.submit_work(move || {
            let _ = tx.send(7);
        });
        assert_eq!(rx.recv().unwrap(), 7);
    }
}
