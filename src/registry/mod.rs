//! Worker blocks and the per-device, per-category block registry.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::pool::WorkerPool;
use crate::queue::{BlockingQueue, QueueError};
use crate::task::{TaskBlock, TaskProperty};
use crate::worker::{cpu_worker_loop, device_worker_loop, StreamKind, StreamProvider};
use crate::DispatchConfig;

/// Copy/normal split used to segregate transfer work from compute work on
/// GPU devices. Tasks of different categories for the same device never
/// share a queue or a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerCategory {
    Normal,
    Copy,
}

impl WorkerCategory {
    pub fn from_property(property: TaskProperty) -> Self {
        if property.is_copy() {
            WorkerCategory::Copy
        } else {
            WorkerCategory::Normal
        }
    }

    fn stream_kind(self) -> StreamKind {
        match self {
            WorkerCategory::Normal => StreamKind::Compute,
            WorkerCategory::Copy => StreamKind::Transfer,
        }
    }
}

/// One task queue paired with the thread pool draining it. The pairing is
/// 1:1 for the block's whole lifetime; on drop the queue is signalled
/// strictly before the pool joins, so the workers drain every queued task
/// and no thread can block on an abandoned queue.
pub struct WorkerBlock {
    queue: Arc<BlockingQueue<TaskBlock>>,
    pool: WorkerPool,
}

impl WorkerBlock {
    /// Start the CPU block: `workers` streamless loop threads.
    pub(crate) fn start_cpu(workers: usize) -> Self {
        let queue = Arc::new(BlockingQueue::new());
        let loop_queue = Arc::clone(&queue);
        let pool = WorkerPool::start(workers, "cpu-worker", move || cpu_worker_loop(&loop_queue));
        Self { queue, pool }
    }

    /// Start a device block: `workers` loop threads, each bound to one
    /// stream of the category's kind for its entire lifetime.
    pub(crate) fn start_device(
        device_id: usize,
        category: WorkerCategory,
        workers: usize,
        streams: Arc<dyn StreamProvider>,
    ) -> Self {
        let queue = Arc::new(BlockingQueue::new());
        let loop_queue = Arc::clone(&queue);
        let kind = category.stream_kind();
        let name = match category {
            WorkerCategory::Normal => format!("gpu{}-worker", device_id),
            WorkerCategory::Copy => format!("gpu{}-copy", device_id),
        };
        let pool = WorkerPool::start(workers, &name, move || {
            device_worker_loop(device_id, kind, &loop_queue, streams.as_ref())
        });
        Self { queue, pool }
    }

    /// Enqueue a task for this block's workers.
    pub fn push(&self, task: TaskBlock) -> Result<(), QueueError> {
        self.queue.push(task)
    }

    pub fn queue(&self) -> &BlockingQueue<TaskBlock> {
        &self.queue
    }

    /// Number of worker threads draining this block's queue.
    pub fn workers(&self) -> usize {
        self.pool.len()
    }
}

impl Drop for WorkerBlock {
    fn drop(&mut self) {
        // Shutdown must reach the queue before the pool's Drop joins the
        // workers; the pool field drops after this body runs.
        self.queue.signal_shutdown();
    }
}

type SlotKey = (usize, WorkerCategory);

/// Registry of worker blocks. The CPU block is created eagerly at
/// construction; GPU blocks are created lazily, at most once per
/// (device id, category) slot, by double-checked acquisition under a single
/// coarse creation lock. The lock is never held during push, pop, or task
/// execution, and steady-state resolution takes only the read path.
pub struct WorkerBlockRegistry {
    cpu: Arc<WorkerBlock>,
    slots: RwLock<FxHashMap<SlotKey, Arc<WorkerBlock>>>,
    streams: Arc<dyn StreamProvider>,
    gpu_workers: usize,
    gpu_copy_workers: usize,
    max_devices: usize,
}

impl WorkerBlockRegistry {
    pub fn new(config: &DispatchConfig, streams: Arc<dyn StreamProvider>) -> Self {
        Self {
            cpu: Arc::new(WorkerBlock::start_cpu(config.cpu_workers)),
            slots: RwLock::new(FxHashMap::default()),
            streams,
            gpu_workers: config.gpu_workers,
            gpu_copy_workers: config.gpu_copy_workers,
            max_devices: config.max_devices,
        }
    }

    /// The eagerly created CPU block.
    pub fn cpu(&self) -> &Arc<WorkerBlock> {
        &self.cpu
    }

    /// Resolve the block for a GPU slot, creating it on first use.
    ///
    /// Panics if `device_id` is at or past the configured maximum; that is a
    /// caller bug, not a runtime fault.
    pub fn resolve(&self, device_id: usize, category: WorkerCategory) -> Arc<WorkerBlock> {
        assert!(
            device_id < self.max_devices,
            "GPU device index {} exceeds bound {}",
            device_id,
            self.max_devices
        );
        let key = (device_id, category);
        {
            let slots = self.slots.read();
            if let Some(block) = slots.get(&key) {
                return Arc::clone(block);
            }
        }

        let mut slots = self.slots.write();
        // Re-check: another thread may have created the block while this
        // one waited for the lock.
        if let Some(block) = slots.get(&key) {
            return Arc::clone(block);
        }

        let workers = match category {
            WorkerCategory::Normal => self.gpu_workers,
            WorkerCategory::Copy => self.gpu_copy_workers,
        };
        log::debug!(
            "starting {:?} worker block for device {} ({} threads)",
            category,
            device_id,
            workers
        );
        let block = Arc::new(WorkerBlock::start_device(
            device_id,
            category,
            workers,
            Arc::clone(&self.streams),
        ));
        slots.insert(key, Arc::clone(&block));
        block
    }
}
