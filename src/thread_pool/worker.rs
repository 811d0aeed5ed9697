use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::Receiver;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    pub fn new(id: usize, jobs: Receiver<Job>) -> std::io::Result<Worker> {
        let thread = thread::Builder::new()
            .name(format!("batchloader-worker-{id}"))
            .spawn(move || {
                // Ends once the pool drops its sender and the queue is drained
                while let Ok(job) = jobs.recv() {
                    Self::process_work(id, job);
                }
            })?;

        Ok(Worker {
            id,
            thread: Some(thread),
        })
    }

    fn process_work(id: usize, job: Job) {
        // A panicking job drops its result channel, which the consumer sees.
        // The worker itself stays in the pool.
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::warn!(worker = id, "prefetch job panicked");
        }
    }

    pub(super) fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!(worker = self.id, "worker thread terminated abnormally");
            }
        }
    }
}
