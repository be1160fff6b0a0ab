//! Fixed-size worker pool for client connections
//!
//! Accepted connections queue up without bound; a full pool delays tasks
//! instead of rejecting them. Tasks start in submission order.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    tasks: VecDeque<Task>,
    stop: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `size` workers; zero means one per available CPU.
    pub fn new(size: usize) -> Self {
        let size = if size == 0 { num_cpus::get().max(1) } else { size };
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                tasks: VecDeque::new(),
                stop: false,
            }),
            available: Condvar::new(),
        });

        let mut handles = Vec::with_capacity(size);
        for id in 0..size {
            let shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("lptf-worker-{id}"))
                .spawn(move || worker_loop(id, &shared));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => tracing::error!("failed to spawn worker {id}: {e}"),
            }
        }
        tracing::debug!("worker pool started with {} threads", handles.len());
        Self { shared, handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Queue a task; it runs as soon as a worker is free.
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.shared.queue.lock();
        queue.tasks.push_back(Box::new(task));
        drop(queue);
        self.shared.available.notify_one();
    }
}

fn worker_loop(id: usize, shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            while queue.tasks.is_empty() && !queue.stop {
                shared.available.wait(&mut queue);
            }
            match queue.tasks.pop_front() {
                Some(task) => task,
                // stopped and drained
                None => return,
            }
        };
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            tracing::error!("worker {id}: task panicked");
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.queue.lock().stop = true;
        self.shared.available.notify_all();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
