//! Fixed-size pool of named OS threads, each running one loop body.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Starts `count` threads at construction, each executing the supplied body
/// once; the body is expected to loop internally until its queue shuts down.
/// Dropping the pool joins every thread.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` threads named `"<name>-<idx>"` running `body`.
    pub fn start<F>(count: usize, name: &str, body: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let body = Arc::new(body);
        let handles = (0..count)
            .map(|idx| {
                let body = Arc::clone(&body);
                thread::Builder::new()
                    .name(format!("{}-{}", name, idx))
                    .spawn(move || body())
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("worker thread panicked during teardown");
            }
        }
    }
}
