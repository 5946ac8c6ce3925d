use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use persiana::channel::Channel;

use bytes::Bytes;

use rumqttc::v5::{
    AsyncClient, Event, EventLoop, MqttOptions, mqttbytes::QoS, mqttbytes::v5::Packet,
};

use tokio::task::JoinHandle;

use tokio_util::sync::CancellationToken;

use tracing::{debug, error, warn};

use crate::error::{Error, ErrorKind, Result};

// The capacity of the bounded asynchronous channel.
const ASYNC_CHANNEL_CAPACITY: usize = 10;

// The capacity of the queue between the receive path and the router.
const QUEUE_CAPACITY: usize = 64;

// Keep alive time to send `pingreq` to broker when the connection is idle.
const KEEP_ALIVE_TIME: Duration = Duration::from_secs(5);

// Pause before polling again after a connection error, leaving the
// transport room to re-establish the session.
const RECONNECT_PAUSE: Duration = Duration::from_millis(500);

/// A raw message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// The topic the message arrived on.
    pub topic: String,
    /// The raw payload bytes.
    pub payload: Bytes,
}

/// Best-effort publication of a command onto the bus.
///
/// The seam between the command gateway and the transport: the bus
/// publisher implements it over MQTT, and tests implement it with simulated
/// devices.
pub trait CommandSink: Send + Sync {
    /// Hands a command to the transport.
    ///
    /// Success means the transport accepted the message, not that any
    /// device received it: command delivery is at-most-once.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Publish`] when the connection is down or the transport
    /// refuses the message. The failure is reported to the caller as-is,
    /// never retried behind its back.
    fn send_command(&self, topic: &str, payload: Option<Vec<u8>>) -> Result<()>;
}

/// A clonable publish handle onto the bus.
#[derive(Debug, Clone)]
pub struct BusPublisher {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl CommandSink for BusPublisher {
    fn send_command(&self, topic: &str, payload: Option<Vec<u8>>) -> Result<()> {
        // A stale connection must be visible immediately: fail fast instead
        // of letting the transport buffer the message until a reconnect.
        if !self.connected.load(Ordering::Acquire) {
            return Err(Error::new(
                ErrorKind::Publish,
                format!("the broker connection is down, cannot publish on `{topic}`"),
            ));
        }

        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.unwrap_or_default())
            .map_err(|e| {
                Error::new(
                    ErrorKind::Publish,
                    format!("failed to hand `{topic}` to the transport: {e}"),
                )
            })
    }
}

/// Owns the connection to the broker.
///
/// On creation the client subscribes to the fixed telemetry topic set and
/// spawns a receive task that forwards every inbound publish into a bounded
/// queue consumed by the telemetry router. Nothing but queueing happens on
/// the receive path, so a slow consumer can never stall the broker
/// connection itself.
#[derive(Debug)]
pub struct BusClient {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    cancellation_token: CancellationToken,
    receiver_handle: JoinHandle<()>,
}

impl BusClient {
    /// Connects to the broker, subscribes to every telemetry topic, and
    /// starts the receive task.
    ///
    /// Returns the client and the queue end the telemetry router consumes.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Connection`] when the broker is unreachable, refuses
    /// the session, or a subscription fails. Without the connection no
    /// command or telemetry can flow, so the failure is fatal to startup.
    pub async fn connect(
        address: &str,
        port: u16,
        client_id: &str,
    ) -> Result<(Self, flume::Receiver<BusMessage>)> {
        let mut options = MqttOptions::new(client_id, address, port);
        let _ = options.set_keep_alive(KEEP_ALIVE_TIME);

        let (client, mut eventloop) = AsyncClient::new(options, ASYNC_CHANNEL_CAPACITY);

        // The session is only usable once the broker acknowledges it.
        wait_for_ack(&mut eventloop).await?;

        for channel in Channel::ALL {
            let topic = channel.telemetry_topic();
            client
                .subscribe(topic, QoS::AtMostOnce)
                .await
                .map_err(|e| {
                    Error::new(
                        ErrorKind::Connection,
                        format!("impossible to subscribe to `{topic}`: {e}"),
                    )
                })?;
        }

        let connected = Arc::new(AtomicBool::new(true));
        let cancellation_token = CancellationToken::new();
        let (queue_tx, queue_rx) = flume::bounded(QUEUE_CAPACITY);

        let receiver_handle = tokio::spawn(run_receiver(
            eventloop,
            Arc::clone(&connected),
            cancellation_token.clone(),
            queue_tx,
        ));

        Ok((
            Self {
                client,
                connected,
                cancellation_token,
                receiver_handle,
            },
            queue_rx,
        ))
    }

    /// Returns a clonable publish handle onto the bus.
    #[must_use]
    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            client: self.client.clone(),
            connected: Arc::clone(&self.connected),
        }
    }

    /// Stops the receive task and disconnects from the broker.
    ///
    /// # Note
    ///
    /// For a graceful shutdown, this method must be called before dropping
    /// the [`BusClient`].
    pub async fn shutdown(self) {
        self.cancellation_token.cancel();
        if let Err(e) = self.receiver_handle.await {
            error!("Failed to await the bus receive task: {e}");
        }
        if let Err(e) = self.client.disconnect().await {
            warn!("Failed to disconnect from the broker: {e}");
        }
    }
}

async fn wait_for_ack(eventloop: &mut EventLoop) -> Result<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(event) => {
                debug!("Event before the broker acknowledgement, ignored: {event:?}");
            }
            Err(e) => {
                return Err(Error::new(
                    ErrorKind::Connection,
                    format!("the broker did not accept the connection: {e}"),
                ));
            }
        }
    }
}

async fn run_receiver(
    mut eventloop: EventLoop,
    connected: Arc<AtomicBool>,
    cancellation_token: CancellationToken,
    queue: flume::Sender<BusMessage>,
) {
    loop {
        tokio::select! {
            // Use the cancellation token to stop the loop
            () = cancellation_token.cancelled() => { break; }
            // Poll the `MQTT` event coming from the network
            event = eventloop.poll() => {
                match event {
                    Ok(event) => {
                        let Some(message) = parse_event(event, &connected) else {
                            continue;
                        };

                        if queue.send_async(message).await.is_err() {
                            error!("Stop forwarding bus messages: the router queue is closed");
                            break;
                        }
                    }
                    Err(e) => {
                        connected.store(false, Ordering::Release);
                        error!("Error in receiving from the bus: {e}");
                        tokio::time::sleep(RECONNECT_PAUSE).await;
                    }
                }
            }
        }
    }
    drop(queue);
    drop(eventloop);
}

#[inline]
fn parse_event(event: Event, connected: &AtomicBool) -> Option<BusMessage> {
    let packet = match event {
        Event::Incoming(packet) => packet,
        Event::Outgoing(outgoing) => {
            debug!("Outgoing packet, ignored: {outgoing:?}");
            return None;
        }
    };

    match packet {
        Packet::ConnAck(_) => {
            connected.store(true, Ordering::Release);
            debug!("Broker session established");
            None
        }
        Packet::Publish(publish) => Some(BusMessage {
            topic: String::from_utf8_lossy(&publish.topic).into_owned(),
            payload: publish.payload,
        }),
        packet => {
            debug!("Packet ignored: {packet:?}");
            None
        }
    }
}
