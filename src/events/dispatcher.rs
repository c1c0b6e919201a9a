//! Queued, batched delivery of analytics events to the ingestion endpoint.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Url;

use crate::events::event::{BatchEvent, Event};
use crate::transport::Transport;

const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 500;

/// Supplies the visitor's anonymous id at delivery time (every batched event carries it).
pub type AnonymousIdSource = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Debug, Clone)]
pub struct EventDispatcherConfig {
    /// Batch ingestion endpoint.
    pub events_url: Url,
    pub delivery_interval: Duration,
    pub batch_size: usize,
}

/// FIFO queue of pending events, shared between producers and the delivery task.
#[derive(Clone, Default)]
struct EventQueue {
    events: Arc<Mutex<VecDeque<Event>>>,
}

impl EventQueue {
    fn push(&self, event: Event) {
        let mut queue = self
            .events
            .lock()
            .expect("thread holding event queue lock should not panic");
        queue.push_back(event);
    }

    fn next_batch(&self, batch_size: usize) -> Vec<Event> {
        let mut queue = self
            .events
            .lock()
            .expect("thread holding event queue lock should not panic");
        let mut batch = vec![];
        while let Some(event) = queue.pop_front() {
            batch.push(event);
            if batch.len() >= batch_size {
                break;
            }
        }
        batch
    }

    fn len(&self) -> usize {
        self.events
            .lock()
            .expect("thread holding event queue lock should not panic")
            .len()
    }
}

/// Accepts events from anywhere in the SDK and ships them in batches.
///
/// `dispatch` is synchronous and cheap; a background task drains the queue on an interval and
/// stops itself once the queue is empty. Terminal delivery failures drop the batch with an error
/// log — event delivery never surfaces failures into the host app.
#[derive(Clone)]
pub struct EventDispatcher {
    config: EventDispatcherConfig,
    queue: EventQueue,
    transport: Arc<Transport>,
    anonymous_id: AnonymousIdSource,
    delivery_task_active: Arc<Mutex<bool>>,
}

#[derive(serde::Serialize)]
struct BatchRequest<'a> {
    events: &'a [BatchEvent],
}

impl EventDispatcher {
    pub fn new(
        config: EventDispatcherConfig,
        transport: Arc<Transport>,
        anonymous_id: AnonymousIdSource,
    ) -> EventDispatcher {
        let config = EventDispatcherConfig {
            batch_size: config.batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE),
            ..config
        };
        EventDispatcher {
            config,
            queue: EventQueue::default(),
            transport,
            anonymous_id,
            delivery_task_active: Arc::new(Mutex::new(false)),
        }
    }

    /// Enqueue an event and make sure the delivery task is running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, event: Event) {
        self.queue.push(event);

        if !self.is_delivery_task_active() {
            self.start_delivery_task();
        }
    }

    /// Number of events waiting for delivery.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drain the queue now, delivering every pending batch before returning. Used on shutdown
    /// and in tests; regular operation relies on the interval task.
    pub async fn flush(&self) {
        loop {
            let batch = self.queue.next_batch(self.config.batch_size);
            if batch.is_empty() {
                return;
            }
            self.deliver(batch).await;
        }
    }

    fn start_delivery_task(&self) {
        {
            let mut is_active = self
                .delivery_task_active
                .lock()
                .expect("thread holding delivery flag lock should not panic");
            if *is_active {
                return;
            }
            *is_active = true;
        }

        let dispatcher = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(
                tokio::time::Instant::now() + dispatcher.config.delivery_interval,
                dispatcher.config.delivery_interval,
            );
            loop {
                interval.tick().await;
                let batch = dispatcher.queue.next_batch(dispatcher.config.batch_size);
                if batch.is_empty() {
                    let mut is_active = dispatcher
                        .delivery_task_active
                        .lock()
                        .expect("thread holding delivery flag lock should not panic");
                    *is_active = false;
                    break;
                }
                dispatcher.deliver(batch).await;
            }
        });
    }

    async fn deliver(&self, events: Vec<Event>) {
        let anonymous_id = (self.anonymous_id)();
        let count = events.len();
        let batch: Vec<BatchEvent> = events
            .into_iter()
            .map(|event| BatchEvent {
                event,
                anonymous_id: anonymous_id.clone(),
            })
            .collect();

        let request = self
            .transport
            .client()
            .post(self.config.events_url.clone())
            .json(&BatchRequest { events: &batch });

        match self.transport.send(request).await {
            Ok(_) => {
                log::debug!(target: "attune", count; "delivered event batch");
            }
            Err(err) => {
                // Dropped, not re-queued: delivery failures must never pile up behind a dead
                // endpoint or surface into the host app.
                log::error!(target: "attune", count; "dropping event batch: {err}");
            }
        }
    }

    fn is_delivery_task_active(&self) -> bool {
        *self
            .delivery_task_active
            .lock()
            .expect("thread holding delivery flag lock should not panic")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportConfig;

    fn dispatcher(url: &str, batch_size: usize) -> EventDispatcher {
        EventDispatcher::new(
            EventDispatcherConfig {
                events_url: Url::parse(url).unwrap(),
                delivery_interval: Duration::from_millis(10),
                batch_size,
            },
            Arc::new(Transport::new(TransportConfig::default())),
            Arc::new(|| "anon-1".to_owned()),
        )
    }

    fn event() -> Event {
        use crate::events::builder::{EventBuilder, NoAmbient};
        use crate::sdk_metadata::SdkMetadata;
        EventBuilder::new("web", SdkMetadata::core(), Arc::new(NoAmbient))
            .build_track("clicked", Default::default())
    }

    #[test]
    fn batch_size_is_clamped() {
        let small = dispatcher("http://localhost/v1/events", 0);
        assert_eq!(small.config.batch_size, MIN_BATCH_SIZE);

        let large = dispatcher("http://localhost/v1/events", 1_000_000);
        assert_eq!(large.config.batch_size, MAX_BATCH_SIZE);
    }

    #[tokio::test]
    async fn queue_drains_in_fifo_batches() {
        let dispatcher = dispatcher("http://localhost/v1/events", 2);
        dispatcher.queue.push(event());
        dispatcher.queue.push(event());
        dispatcher.queue.push(event());

        let batch = dispatcher.queue.next_batch(2);
        assert_eq!(batch.len(), 2);
        assert_eq!(dispatcher.pending(), 1);
    }
}
