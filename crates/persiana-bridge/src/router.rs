use std::sync::Arc;
use std::time::SystemTime;

use persiana::channel::Channel;
use persiana::reading::Reading;

use tokio_util::sync::CancellationToken;

use tracing::{debug, error, warn};

use crate::bus::BusMessage;
use crate::registry::Channels;
use crate::store::ReadingStore;

/// Routes raw bus messages onto their telemetry channels.
///
/// The router is the only writer of the channel table: it decodes each
/// message, atomically replaces the channel's last-known reading, signals
/// the registered waiters, and hands the reading to the store. It runs in
/// its own task, decoupled from the bus receive path by a bounded queue, so
/// dispatch work never stalls the broker connection.
pub struct TelemetryRouter {
    channels: Arc<Channels>,
    store: Arc<dyn ReadingStore>,
}

impl TelemetryRouter {
    /// Creates a [`TelemetryRouter`] over the channel table and the store.
    #[must_use]
    pub fn new(channels: Arc<Channels>, store: Arc<dyn ReadingStore>) -> Self {
        Self { channels, store }
    }

    /// Consumes bus messages until the queue closes or the token is
    /// cancelled.
    pub async fn run(
        self,
        queue: flume::Receiver<BusMessage>,
        cancellation_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                // Use the cancellation token to stop the loop
                () = cancellation_token.cancelled() => { break; }
                message = queue.recv_async() => {
                    match message {
                        Ok(message) => self.dispatch(&message),
                        Err(_) => {
                            debug!("Bus queue closed, stopping the telemetry router");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Maps one bus message onto its channel, updates the channel, and
    /// signals the waiters.
    ///
    /// Messages on unmapped topics are dropped. An undecodable payload is
    /// logged and leaves the channel untouched: waiters keep waiting rather
    /// than being woken with garbage.
    pub fn dispatch(&self, message: &BusMessage) {
        let Some(channel) = Channel::from_topic(&message.topic) else {
            debug!("Unknown topic `{}`, message dropped", message.topic);
            return;
        };

        let reading = match Reading::decode(channel, &message.payload, SystemTime::now()) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Undecodable payload on `{}`, channel left unchanged: {e}", message.topic);
                return;
            }
        };

        self.channels.update(reading);

        // Persistence is best-effort: the waiters have already been
        // signaled, a store failure must not reach them.
        if let Err(e) = self.store.persist(&reading) {
            error!("Failed to persist a `{channel}` reading: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use crate::bus::BusMessage;
    use crate::error::{ErrorKind, Result};
    use crate::registry::Channels;
    use crate::store::{MemoryStore, ReadingStore};

    use super::{Channel, Reading, TelemetryRouter};

    fn message(topic: &str, payload: &'static [u8]) -> BusMessage {
        BusMessage {
            topic: topic.to_owned(),
            payload: bytes::Bytes::from_static(payload),
        }
    }

    fn router_over(channels: &Arc<Channels>) -> (TelemetryRouter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let router = TelemetryRouter::new(
            Arc::clone(channels),
            Arc::clone(&store) as Arc<dyn ReadingStore>,
        );
        (router, store)
    }

    #[tokio::test]
    async fn a_telemetry_message_updates_signals_and_persists() {
        let channels = Arc::new(Channels::new());
        let (router, store) = router_over(&channels);

        let waiter = channels.watch(Channel::Temperature);
        router.dispatch(&message("home/control_temperature", b"22"));

        assert_eq!(
            waiter.next(Duration::from_millis(100)).await.unwrap().value,
            22
        );
        assert_eq!(channels.last(Channel::Temperature).unwrap().value, 22);
        assert_eq!(store.readings(Channel::Temperature).len(), 1);
    }

    #[tokio::test]
    async fn unknown_topics_are_dropped() {
        let channels = Arc::new(Channels::new());
        let (router, store) = router_over(&channels);

        router.dispatch(&message("home/humidity", b"55"));

        for channel in Channel::ALL {
            assert_eq!(channels.last(channel), None);
            assert_eq!(store.readings(channel), []);
        }
    }

    #[tokio::test]
    async fn an_undecodable_payload_leaves_the_channel_unchanged() {
        let channels = Arc::new(Channels::new());
        let (router, store) = router_over(&channels);

        let waiter = channels.watch(Channel::Illumination);
        router.dispatch(&message("home/control_illumination", b"bright"));

        // Nobody is woken with garbage: the waiter keeps waiting.
        let error = waiter.next(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TimedOut);
        assert_eq!(channels.last(Channel::Illumination), None);
        assert_eq!(store.readings(Channel::Illumination), []);
    }

    #[tokio::test]
    async fn a_store_failure_does_not_reach_the_waiters() {
        struct FailingStore;

        impl ReadingStore for FailingStore {
            fn persist(&self, _reading: &Reading) -> Result<()> {
                Err(crate::error::Error::new(
                    ErrorKind::Store,
                    "the backing table is gone",
                ))
            }
        }

        let channels = Arc::new(Channels::new());
        let router = TelemetryRouter::new(Arc::clone(&channels), Arc::new(FailingStore));

        let waiter = channels.watch(Channel::Position);
        router.dispatch(&message("home/value", b"75"));

        assert_eq!(
            waiter.next(Duration::from_millis(100)).await.unwrap().value,
            75
        );
    }

    #[tokio::test]
    async fn the_run_loop_consumes_the_queue_until_cancelled() {
        let channels = Arc::new(Channels::new());
        let (router, store) = router_over(&channels);

        let (queue_tx, queue_rx) = flume::bounded(8);
        let cancellation_token = CancellationToken::new();
        let task = tokio::spawn(router.run(queue_rx, cancellation_token.clone()));

        let waiter = channels.watch(Channel::Position);
        queue_tx
            .send_async(message("home/value", b"40"))
            .await
            .unwrap();

        assert_eq!(
            waiter.next(Duration::from_millis(500)).await.unwrap().value,
            40
        );
        assert_eq!(store.readings(Channel::Position).len(), 1);

        cancellation_token.cancel();
        task.await.unwrap();
    }
}
