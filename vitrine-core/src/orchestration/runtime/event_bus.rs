use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::orchestration::events::ProgressEvent;
use crate::scan::scanner::{ScanObserver, ScanProgress};

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<ProgressEvent>,
}

#[derive(Default)]
struct Registry {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl Registry {
    fn remove(&self, id: u64) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|s| s.id != id);
        }
    }
}

/// In-process fan-out of [`ProgressEvent`]s.
///
/// Each subscriber owns a bounded queue. Publishing never blocks: a
/// subscriber whose queue is closed or full is dropped and the remaining
/// subscribers still receive the event. Events reach each subscriber in
/// publish order.
#[derive(Clone)]
pub struct ProgressBroadcaster {
    registry: Arc<Registry>,
    capacity: usize,
}

impl fmt::Debug for ProgressBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressBroadcaster")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> ProgressSubscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut subs) = self.registry.subscribers.lock() {
            subs.push(Subscriber { id, sender });
        }
        debug!(target: "vitrine::events", subscriber = id, "subscribed");
        ProgressSubscription {
            id,
            receiver: ReceiverStream::new(receiver),
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every live subscriber. With no subscribers this is
    /// a no-op.
    pub fn publish(&self, event: ProgressEvent) {
        let Ok(mut subs) = self.registry.subscribers.lock() else {
            return;
        };
        if subs.is_empty() {
            return;
        }
        // The lock is held across the fan-out so concurrent publishers cannot
        // interleave and reorder events for a subscriber.
        subs.retain(|sub| match sub.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(target: "vitrine::events", subscriber = sub.id, "subscriber disconnected");
                false
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    target: "vitrine::events",
                    subscriber = sub.id,
                    kind = event.kind(),
                    "dropping lagging subscriber"
                );
                false
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .subscribers
            .lock()
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

impl ScanObserver for ProgressBroadcaster {
    fn on_progress(&self, progress: ScanProgress) {
        self.publish(ProgressEvent::ScanProgress {
            directories_visited: progress.directories_visited,
            files_found: progress.files_found,
        });
    }
}

/// Receiving half of a subscription. Dropping it unsubscribes.
pub struct ProgressSubscription {
    id: u64,
    receiver: ReceiverStream<ProgressEvent>,
    registry: Weak<Registry>,
}

impl fmt::Debug for ProgressSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSubscription")
            .field("id", &self.id)
            .finish()
    }
}

impl ProgressSubscription {
    /// Next event, or `None` once the subscription has been dropped by the
    /// broadcaster (for lagging) and the queue is drained.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.as_mut().recv().await
    }

    /// Drain whatever is queued right now without waiting.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.as_mut().try_recv().ok()
    }
}

impl Stream for ProgressSubscription {
    type Item = ProgressEvent;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
