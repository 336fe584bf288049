//! Cross-thread input attachment.
//!
//! Before a queued message is replayed to subscribers, the draining thread
//! attaches its input state to the thread the message arrived on, so focus
//! and key state queries made by subscribers see the host's view. Attachments
//! are tracked per calling thread and reused while the target is unchanged.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::OsResult;
use crate::platform::{InputPlatform, OwnedThread};
use crate::types::ThreadId;

#[derive(Debug)]
struct Attachment {
    /// Keeps the target's id from being recycled while attached.
    thread: OwnedThread,
}

pub struct ThreadInputAttacher {
    platform: Arc<dyn InputPlatform>,
    /// Calling thread -> thread it is attached to.
    attachments: scc::HashMap<ThreadId, Attachment>,
}

impl ThreadInputAttacher {
    pub fn new(platform: Arc<dyn InputPlatform>) -> Self {
        Self {
            platform,
            attachments: scc::HashMap::new(),
        }
    }

    /// Attaches the calling thread's input state to `target`.
    ///
    /// Reuses the current attachment when the target is unchanged and
    /// detaches from the previous target when it changed. A message that
    /// originated on the calling thread needs no attachment.
    pub fn ensure_attached(&self, target: ThreadId) -> OsResult<()> {
        let current = self.platform.current_thread_id();
        if current == target {
            return Ok(());
        }

        let attached = self
            .attachments
            .read_sync(&current, |_, attachment| attachment.thread.id());
        if attached == Some(target) {
            return Ok(());
        }
        if attached.is_some() {
            self.detach(current);
        }

        let thread = OwnedThread::open(&self.platform, target)?;
        self.platform.attach_thread_input(current, target, true)?;
        debug!("Attached input of thread {} to thread {}", current, target);

        let _ = self.attachments.insert_sync(current, Attachment { thread });
        Ok(())
    }

    /// Thread the calling thread is currently attached to.
    pub fn attached_target(&self) -> Option<ThreadId> {
        let current = self.platform.current_thread_id();
        self.attachments
            .read_sync(&current, |_, attachment| attachment.thread.id())
    }

    /// Drops the calling thread's attachment, if any.
    pub fn release_current_thread(&self) -> bool {
        self.detach(self.platform.current_thread_id())
    }

    /// Detaches every tracked thread. Returns how many were released.
    ///
    /// Safe to call repeatedly; later calls find nothing to release.
    pub fn teardown(&self) -> usize {
        let mut owners = Vec::with_capacity(self.attachments.len());
        self.attachments.retain_sync(|owner, _| {
            owners.push(*owner);
            true
        });

        owners.into_iter().filter(|owner| self.detach(*owner)).count()
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    fn detach(&self, owner: ThreadId) -> bool {
        let Some((_, attachment)) = self.attachments.remove_sync(&owner) else {
            return false;
        };

        let target = attachment.thread.id();
        // A target that already exited was detached by the system.
        if let Err(e) = self.platform.attach_thread_input(owner, target, false) {
            warn!("Failed to detach thread {} from thread {}: {}", owner, target, e);
        } else {
            debug!("Detached input of thread {} from thread {}", owner, target);
        }
        true
    }
}

impl Drop for ThreadInputAttacher {
    fn drop(&mut self) {
        self.teardown();
    }
}
