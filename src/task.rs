//! Task handle types shared across the dispatcher.

use std::sync::Arc;

use crate::worker::RunContext;

/// Property tag carried by every task. Drives two independent decisions:
/// inline eligibility (only `Async`) and, for GPU tasks, the copy/normal
/// category split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskProperty {
    /// Eligible for inline execution when submitted from the origin thread.
    Async,
    /// Host-to-device transfer.
    CopyToDevice,
    /// Device-to-host transfer.
    CopyFromDevice,
    /// Ordinary compute work.
    Normal,
}

impl TaskProperty {
    /// Copy properties route to the dedicated transfer threads.
    pub fn is_copy(self) -> bool {
        matches!(self, TaskProperty::CopyToDevice | TaskProperty::CopyFromDevice)
    }
}

/// Coarse execution-target class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Cpu,
    Gpu,
}

/// Target context of a task: device class plus device id. The id is only
/// meaningful for GPU contexts and must stay below the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceContext {
    pub class: DeviceClass,
    pub device_id: usize,
}

impl DeviceContext {
    pub fn cpu() -> Self {
        Self {
            class: DeviceClass::Cpu,
            device_id: 0,
        }
    }

    pub fn gpu(device_id: usize) -> Self {
        Self {
            class: DeviceClass::Gpu,
            device_id,
        }
    }
}

/// Execution entry point supplied by the caller. Assumed synchronous;
/// expected to absorb or surface its own failures. The dispatcher neither
/// inspects nor reports the outcome.
pub trait TaskOp: Send + Sync {
    fn run(&self, ctx: &mut RunContext);
}

/// A unit of work handed to the dispatcher. Consumed by exactly one
/// execution: either inline on the submitting thread or by one worker.
pub struct TaskBlock {
    /// Reference to the operation this task runs.
    pub op: Arc<dyn TaskOp>,
    pub property: TaskProperty,
    pub context: DeviceContext,
}

impl TaskBlock {
    pub fn new(op: Arc<dyn TaskOp>, property: TaskProperty, context: DeviceContext) -> Self {
        Self {
            op,
            property,
            context,
        }
    }
}
