use std::sync::Arc;
use std::time::Duration;

use persiana::channel::Channel;
use persiana::command::{Command, CommandKind, CommandPayload};
use persiana::reading::Reading;

use tracing::debug;

use crate::bus::CommandSink;
use crate::error::{Error, ErrorKind, Result};
use crate::registry::Channels;

/// The credentials an HTTP caller presents to control a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Device identifier.
    pub device_id: String,
    /// Device secret key.
    pub key: String,
}

/// The delegated device/ownership check.
///
/// Which devices a caller may control is not the bridge's concern: it asks
/// this collaborator and maps a rejection onto
/// [`ErrorKind::Unauthorized`].
pub trait DeviceLookup: Send + Sync {
    /// Returns whether the credentials identify a known device.
    fn authorize(&self, credentials: &Credentials) -> bool;
}

/// The HTTP-facing API of the bridge.
///
/// The gateway validates a command, publishes it onto the bus, and — for
/// read-style commands — awaits the device's reply on the command's
/// telemetry channel, bounded by a timeout. The waiter is always registered
/// before the command is handed to the transport, so a reply arriving in
/// the same instant as the publish is never lost.
pub struct CommandGateway {
    sink: Arc<dyn CommandSink>,
    channels: Arc<Channels>,
    lookup: Arc<dyn DeviceLookup>,
}

impl CommandGateway {
    /// Creates a [`CommandGateway`] over the publish seam, the channel
    /// table, and the delegated device lookup.
    #[must_use]
    pub fn new(
        sink: Arc<dyn CommandSink>,
        channels: Arc<Channels>,
        lookup: Arc<dyn DeviceLookup>,
    ) -> Self {
        Self {
            sink,
            channels,
            lookup,
        }
    }

    /// Publishes a fire-and-forget command.
    ///
    /// Returns as soon as the transport accepts the message; no telemetry
    /// reply is awaited.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Unauthorized`] when the device lookup rejects the
    /// caller, [`ErrorKind::UnknownCommand`] when `name` is not a known
    /// command (nothing is published), [`ErrorKind::InvalidPayload`] when
    /// the payload shape does not match, and [`ErrorKind::Publish`] when
    /// the transport refuses the message.
    pub fn issue(
        &self,
        credentials: &Credentials,
        name: &str,
        payload: Option<CommandPayload>,
    ) -> Result<()> {
        let command = self.validate(credentials, name, payload)?;
        self.publish(&command)
    }

    /// Publishes a read-style command and awaits the device's reply on the
    /// command's telemetry channel.
    ///
    /// # Errors
    ///
    /// The [`issue`](Self::issue) errors, plus
    /// [`ErrorKind::UnknownChannel`] when the command has no telemetry
    /// channel to await a reply on and [`ErrorKind::TimedOut`] when the
    /// device stays silent past `timeout`.
    pub async fn issue_and_await(
        &self,
        credentials: &Credentials,
        name: &str,
        payload: Option<CommandPayload>,
        timeout: Duration,
    ) -> Result<Reading> {
        let command = self.validate(credentials, name, payload)?;
        let channel = command.kind().reply_channel().ok_or_else(|| {
            Error::new(
                ErrorKind::UnknownChannel,
                format!("`{name}` has no telemetry channel to await a reply on"),
            )
        })?;

        // The waiter must exist before the device can possibly observe the
        // command, otherwise an immediate reply would be lost.
        let waiter = self.channels.watch(channel);
        self.publish(&command)?;
        waiter.next(timeout).await
    }

    /// Awaits the next reading on a channel without issuing a command.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::TimedOut`] when no reading arrives within `timeout`.
    pub async fn await_next(&self, channel: Channel, timeout: Duration) -> Result<Reading> {
        self.channels.watch(channel).next(timeout).await
    }

    /// Returns the channel's last-known reading without waiting.
    #[must_use]
    pub fn last(&self, channel: Channel) -> Option<Reading> {
        self.channels.last(channel)
    }

    fn validate(
        &self,
        credentials: &Credentials,
        name: &str,
        payload: Option<CommandPayload>,
    ) -> Result<Command> {
        if !self.lookup.authorize(credentials) {
            return Err(Error::new(
                ErrorKind::Unauthorized,
                format!("device `{}` is not in the directory", credentials.device_id),
            ));
        }

        let kind = CommandKind::from_name(name).ok_or_else(|| {
            Error::new(
                ErrorKind::UnknownCommand,
                format!("`{name}` is not a known command"),
            )
        })?;

        Command::new(kind, payload).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidPayload,
                format!("the payload does not match what `{name}` expects"),
            )
        })
    }

    fn publish(&self, command: &Command) -> Result<()> {
        debug!("Publishing `{}` on `{}`", command.kind(), command.kind().topic());
        self.sink.send_command(command.kind().topic(), command.encode())
    }
}
