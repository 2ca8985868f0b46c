//! Device-aware task dispatcher.
//!
//! Routes dynamically submitted task blocks onto fixed-size worker pools,
//! one pool per (device, category) pair. The policy:
//! - Async tasks submitted from the origin thread run inline on that thread.
//! - Every other task is queued to the worker block for its target device.
//! - Copy work gets dedicated threads so transfers never contend with compute.
//! - Each device worker thread owns one execution stream for its entire life.

pub mod dispatch;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod task;
pub mod worker;

pub use dispatch::Dispatcher;
pub use queue::{BlockingQueue, QueueError};
pub use registry::{WorkerBlock, WorkerBlockRegistry, WorkerCategory};
pub use task::{DeviceClass, DeviceContext, TaskBlock, TaskOp, TaskProperty};
pub use worker::{DeviceStream, RunContext, StreamKind, StreamProvider};

/// Dispatcher configuration, fixed for the dispatcher's lifetime.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Worker threads serving the CPU queue.
    pub cpu_workers: usize,
    /// Worker threads per GPU device for compute work.
    pub gpu_workers: usize,
    /// Worker threads per GPU device for copy work.
    pub gpu_copy_workers: usize,
    /// Upper bound on GPU device ids; resolving past it is a caller bug.
    pub max_devices: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cpu_workers: 2,
            gpu_workers: 2,
            gpu_copy_workers: 1,
            max_devices: 16,
        }
    }
}
