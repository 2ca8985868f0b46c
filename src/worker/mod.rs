//! Worker loop bodies and the per-loop run context.
//!
//! Two loop shapes share one pop/execute/repeat skeleton. The CPU shape runs
//! without a stream. The device shape acquires exactly one stream at loop
//! entry and reuses it for every task it ever executes; binding the stream
//! per thread rather than per task amortizes allocation cost and gives each
//! thread exclusive ownership of its stream with no locking.

use crate::queue::BlockingQueue;
use crate::task::TaskBlock;

/// An execution stream owned by one worker thread. Opaque to the
/// dispatcher; released by dropping it.
pub trait DeviceStream: Send {}

/// Kind of stream a worker loop needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Compute-capable stream; the provider may attach auxiliary
    /// acceleration handles.
    Compute,
    /// Transfer-only stream for copy workers.
    Transfer,
}

/// Stream allocation seam, supplied by the embedder. Acquisition failure is
/// the provider's responsibility; this layer assumes it panics at the point
/// of acquisition.
pub trait StreamProvider: Send + Sync {
    fn acquire(&self, device_id: usize, kind: StreamKind) -> Box<dyn DeviceStream>;
}

/// Per-loop-invocation context handed to every task execution. Created once
/// per worker loop, not per task. CPU loops carry no stream.
pub struct RunContext {
    pub stream: Option<Box<dyn DeviceStream>>,
}

impl RunContext {
    pub fn streamless() -> Self {
        Self { stream: None }
    }

    pub fn with_stream(stream: Box<dyn DeviceStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }
}

/// CPU worker loop: pop and execute until the queue shuts down.
pub fn cpu_worker_loop(queue: &BlockingQueue<TaskBlock>) {
    let mut ctx = RunContext::streamless();
    while let Ok(task) = queue.pop() {
        task.op.run(&mut ctx);
    }
}

/// Device worker loop: acquire one stream for the lifetime of the loop, pop
/// and execute until the queue shuts down, then release the stream. The
/// stream is dropped on every exit path, shutdown included.
pub fn device_worker_loop(
    device_id: usize,
    kind: StreamKind,
    queue: &BlockingQueue<TaskBlock>,
    streams: &dyn StreamProvider,
) {
    log::debug!("device {} worker starting with {:?} stream", device_id, kind);
    let stream = streams.acquire(device_id, kind);
    let mut ctx = RunContext::with_stream(stream);
    while let Ok(task) = queue.pop() {
        task.op.run(&mut ctx);
    }
    log::debug!("device {} {:?} worker draining complete", device_id, kind);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{DeviceContext, TaskOp, TaskProperty};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    struct TestStream {
        released: Arc<AtomicBool>,
    }

    impl DeviceStream for TestStream {}

    impl Drop for TestStream {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    struct TestProvider {
        acquired: AtomicUsize,
        released: Arc<AtomicBool>,
        last_kind: parking_lot::Mutex<Option<StreamKind>>,
    }

    impl StreamProvider for TestProvider {
        fn acquire(&self, _device_id: usize, kind: StreamKind) -> Box<dyn DeviceStream> {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            *self.last_kind.lock() = Some(kind);
            Box::new(TestStream {
                released: self.released.clone(),
            })
        }
    }

    struct SawStream {
        count: Arc<AtomicUsize>,
        with_stream: Arc<AtomicBool>,
    }

    impl TaskOp for SawStream {
        fn run(&self, ctx: &mut RunContext) {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.with_stream.store(ctx.has_stream(), Ordering::SeqCst);
        }
    }

    #[test]
    fn device_loop_holds_one_stream_and_releases_on_shutdown() {
        let queue = Arc::new(BlockingQueue::new());
        let released = Arc::new(AtomicBool::new(false));
        let provider = Arc::new(TestProvider {
            acquired: AtomicUsize::new(0),
            released: released.clone(),
            last_kind: parking_lot::Mutex::new(None),
        });

        let count = Arc::new(AtomicUsize::new(0));
        let with_stream = Arc::new(AtomicBool::new(false));
        let op = Arc::new(SawStream {
            count: count.clone(),
            with_stream: with_stream.clone(),
        });
        for _ in 0..3 {
            queue
                .push(TaskBlock::new(
                    op.clone(),
                    TaskProperty::Normal,
                    DeviceContext::gpu(0),
                ))
                .unwrap();
        }

        let worker = {
            let queue = queue.clone();
            let provider = provider.clone();
            thread::spawn(move || {
                device_worker_loop(0, StreamKind::Transfer, &queue, provider.as_ref())
            })
        };
        queue.signal_shutdown();
        worker.join().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(with_stream.load(Ordering::SeqCst));
        assert_eq!(provider.acquired.load(Ordering::SeqCst), 1);
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(*provider.last_kind.lock(), Some(StreamKind::Transfer));
    }

    #[test]
    fn cpu_loop_runs_without_stream() {
        let queue = Arc::new(BlockingQueue::new());
        let count = Arc::new(AtomicUsize::new(0));
        let with_stream = Arc::new(AtomicBool::new(true));
        let op = Arc::new(SawStream {
            count: count.clone(),
            with_stream: with_stream.clone(),
        });
        queue
            .push(TaskBlock::new(
                op,
                TaskProperty::Normal,
                DeviceContext::cpu(),
            ))
            .unwrap();
        queue.signal_shutdown();
        cpu_worker_loop(&queue);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!with_stream.load(Ordering::SeqCst));
    }
}
