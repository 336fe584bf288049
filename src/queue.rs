//! Deferred window-message queue.
//!
//! The window hook runs on whichever thread dispatched the message, but
//! subscribers are only ever invoked from the overlay's frame loop. Entries
//! are pushed under a re-entrant lock so a subscriber running inside
//! [`InputQueue::drain`] may push again; those entries are drained by the
//! same call.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::warn;

use crate::platform::{InputPlatform, OwnedThread};
use crate::types::{ThreadId, WindowMessage};

/// A window message together with the thread it arrived on.
#[derive(Debug)]
pub struct QueuedMessage {
    pub message: WindowMessage,
    pub thread_id: ThreadId,
    thread: Option<OwnedThread>,
}

impl QueuedMessage {
    /// Records `message` as arriving on the calling thread.
    ///
    /// The thread handle keeps the id valid until the entry is drained. When
    /// it cannot be opened the entry is still queued, without a handle.
    pub fn capture(message: WindowMessage, platform: &Arc<dyn InputPlatform>) -> Self {
        let thread_id = platform.current_thread_id();
        let thread = match OwnedThread::open(platform, thread_id) {
            Ok(thread) => Some(thread),
            Err(e) => {
                warn!("Failed to open originating thread {}: {}", thread_id, e);
                None
            }
        };

        Self {
            message,
            thread_id,
            thread,
        }
    }

    pub fn has_thread_handle(&self) -> bool {
        self.thread.is_some()
    }
}

#[derive(Default)]
pub struct InputQueue {
    entries: ReentrantMutex<RefCell<VecDeque<QueuedMessage>>>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: QueuedMessage) {
        self.entries.lock().borrow_mut().push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().borrow().is_empty()
    }

    /// Pops and processes entries in arrival order until the queue is empty.
    ///
    /// The lock is held for the whole drain, so producers on other threads
    /// wait until it finishes. Returns the number of entries processed.
    pub fn drain(&self, mut process: impl FnMut(QueuedMessage)) -> usize {
        let entries = self.entries.lock();
        let mut processed = 0;
        loop {
            // Borrow ends before `process` so nested pushes can borrow again
            let next = entries.borrow_mut().pop_front();
            let Some(entry) = next else {
                break;
            };
            process(entry);
            processed += 1;
        }
        processed
    }
}
