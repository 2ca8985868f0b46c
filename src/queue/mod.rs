//! Unbounded blocking FIFO queue with drain-on-shutdown semantics.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;

/// Queue operation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue has shut down")]
    ShutDown,
}

/// Multi-producer multi-consumer FIFO queue. `pop` blocks while the queue is
/// empty. After `signal_shutdown`, pushes fail immediately while pops keep
/// returning already-queued items until the queue drains, then fail forever.
///
/// FIFO order holds per producer; pushes from concurrent producers may
/// interleave arbitrarily.
pub struct BlockingQueue<T> {
    // Dropping the sender is the shutdown signal: blocked receivers wake
    // once the channel drains.
    sender: Mutex<Option<Sender<T>>>,
    receiver: Receiver<T>,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /// Enqueue an item. Fails only after `signal_shutdown`.
    pub fn push(&self, item: T) -> Result<(), QueueError> {
        match &*self.sender.lock() {
            Some(sender) => {
                // The receiver lives as long as self, so send cannot fail.
                let _ = sender.send(item);
                Ok(())
            }
            None => Err(QueueError::ShutDown),
        }
    }

    /// Dequeue the oldest item, blocking while the queue is empty. Fails
    /// once the queue has shut down and drained.
    pub fn pop(&self) -> Result<T, QueueError> {
        self.receiver.recv().map_err(|_| QueueError::ShutDown)
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Signal shutdown. Idempotent. Blocked pops return any remaining items
    /// before they start failing; no queued item is abandoned.
    pub fn signal_shutdown(&self) {
        self.sender.lock().take();
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn pop_matches_push_order() {
        let queue = BlockingQueue::new();
        for i in 0..10 {
            queue.push(i).unwrap();
        }
        for i in 0..10 {
            assert_eq!(queue.pop(), Ok(i));
        }
    }

    #[test]
    fn pop_blocks_until_push() {
        let queue = std::sync::Arc::new(BlockingQueue::new());
        let pusher = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.push(7_u32).unwrap();
            })
        };
        assert_eq!(queue.pop(), Ok(7));
        pusher.join().unwrap();
    }

    #[test]
    fn shutdown_drains_queued_items() {
        let queue = BlockingQueue::new();
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        queue.signal_shutdown();
        for i in 0..5 {
            assert_eq!(queue.pop(), Ok(i));
        }
        assert_eq!(queue.pop(), Err(QueueError::ShutDown));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let queue = BlockingQueue::<u32>::new();
        queue.signal_shutdown();
        queue.signal_shutdown();
        assert_eq!(queue.push(1), Err(QueueError::ShutDown));
        assert_eq!(queue.pop(), Err(QueueError::ShutDown));
    }

    #[test]
    fn shutdown_wakes_blocked_pop() {
        let queue = std::sync::Arc::new(BlockingQueue::<u32>::new());
        let popper = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop())
        };
        thread::sleep(Duration::from_millis(20));
        queue.signal_shutdown();
        assert_eq!(popper.join().unwrap(), Err(QueueError::ShutDown));
    }
}
