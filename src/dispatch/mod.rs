//! The dispatcher: single public entry point for task submission.

use std::sync::Arc;

use crate::registry::{WorkerBlock, WorkerBlockRegistry, WorkerCategory};
use crate::task::{DeviceClass, TaskBlock, TaskProperty};
use crate::worker::{RunContext, StreamProvider};
use crate::DispatchConfig;

/// Routes submitted tasks either inline onto the submitting thread or to
/// the worker block owning the task's (device, category) queue.
///
/// Every submitted task is executed exactly once: inline, or by exactly one
/// worker thread after exactly one queue push.
pub struct Dispatcher {
    registry: WorkerBlockRegistry,
}

impl Dispatcher {
    /// Build a dispatcher with the CPU worker block already running.
    pub fn new(config: DispatchConfig, streams: Arc<dyn StreamProvider>) -> Self {
        Self {
            registry: WorkerBlockRegistry::new(&config, streams),
        }
    }

    /// Submit a task. `is_origin_thread` marks submissions coming from the
    /// thread that originated the task rather than from a pool worker.
    ///
    /// Async tasks submitted from the origin thread run synchronously on
    /// the caller's thread and must target the CPU; anything else is a
    /// caller bug and panics. All other tasks are queued by target context:
    /// CPU tasks to the CPU block, GPU tasks to the lazily created block
    /// for their (device id, category) slot.
    pub fn dispatch(&self, task: TaskBlock, is_origin_thread: bool) {
        if task.property == TaskProperty::Async && is_origin_thread {
            assert_eq!(
                task.context.class,
                DeviceClass::Cpu,
                "async task pushed from the origin thread must target the CPU"
            );
            let mut ctx = RunContext::streamless();
            task.op.run(&mut ctx);
            return;
        }

        match task.context.class {
            DeviceClass::Cpu => self.push_to(self.registry.cpu(), task),
            DeviceClass::Gpu => {
                let category = WorkerCategory::from_property(task.property);
                let block = self.registry.resolve(task.context.device_id, category);
                self.push_to(&block, task);
            }
        }
    }

    /// Worker block registry, exposed for embedders that pre-warm device
    /// slots before submitting work.
    pub fn registry(&self) -> &WorkerBlockRegistry {
        &self.registry
    }

    fn push_to(&self, block: &WorkerBlock, task: TaskBlock) {
        // Can only fail during teardown, after the block's queue shut down.
        if block.push(task).is_err() {
            log::warn!("task dropped: worker queue already shut down");
        }
    }
}
