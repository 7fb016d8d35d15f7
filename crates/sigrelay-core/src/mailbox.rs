//! Bounded per-peer message queue with async notification.
//!
//! Senders push without ever blocking; a full queue is reported back so the
//! sender can retry later. Receivers suspend in [`Mailbox::recv`] until a
//! message arrives or the mailbox is closed.

use crate::peer::Envelope;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

/// Why a push was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The queue holds `capacity` messages already.
    Full,
    /// The owning peer was removed.
    Closed,
}

/// FIFO of pending [`Envelope`]s for a single peer.
#[derive(Debug)]
pub struct Mailbox {
    inner: Mutex<MailboxInner>,
    notify: Notify,
    capacity: usize,
}

#[derive(Debug, Default)]
struct MailboxInner {
    queue: VecDeque<Envelope>,
    closed: bool,
}

impl Mailbox {
    /// Create an empty mailbox holding at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MailboxInner {
                queue: VecDeque::with_capacity(capacity.min(16)),
                ..Default::default()
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Enqueue without blocking. The capacity check and the push happen
    /// under the same lock.
    pub fn try_push(&self, envelope: Envelope) -> Result<(), PushError> {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(PushError::Closed);
            }
            if inner.queue.len() >= self.capacity {
                return Err(PushError::Full);
            }
            inner.queue.push_back(envelope);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Pop the oldest message if there is one.
    pub fn try_recv(&self) -> Option<Envelope> {
        self.inner.lock().queue.pop_front()
    }

    /// Wait for the next message.
    ///
    /// Returns `None` once the mailbox is closed; queued messages of a closed
    /// mailbox are discarded, not drained. Dropping the future before it
    /// completes leaves the queue untouched.
    pub async fn recv(&self) -> Option<Envelope> {
        loop {
            // Register interest before looking at the queue so a push landing
            // between the check and the await still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return None;
                }
                if let Some(envelope) = inner.queue.pop_front() {
                    return Some(envelope);
                }
            }

            notified.await;
        }
    }

    /// Close the mailbox, discard anything queued and wake every receiver.
    /// Returns the number of discarded messages.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            let n = inner.queue.len();
            inner.queue.clear();
            n
        };
        self.notify.notify_waiters();
        discarded
    }
}
