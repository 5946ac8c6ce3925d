use std::time::Duration;

use persiana::channel::Channel;
use persiana::reading::Reading;

use tokio::sync::watch;

use tracing::debug;

use crate::error::{Error, ErrorKind, Result};

/// The live state of every telemetry channel.
///
/// Each channel owns a single-slot cell holding its last-known [`Reading`]
/// (absent until the device first reports) and the set of waiters currently
/// registered on it. The cell is last-write-wins: a new reading always
/// overwrites one that no waiter has observed yet, and no telemetry history
/// is queued inside the bridge. Channels are independent of one another —
/// updating one never contends with waiters on another.
#[derive(Debug)]
pub struct Channels {
    illumination: watch::Sender<Option<Reading>>,
    temperature: watch::Sender<Option<Reading>>,
    position: watch::Sender<Option<Reading>>,
}

impl Channels {
    /// Creates the channel table with every channel empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            illumination: watch::Sender::new(None),
            temperature: watch::Sender::new(None),
            position: watch::Sender::new(None),
        }
    }

    fn cell(&self, channel: Channel) -> &watch::Sender<Option<Reading>> {
        match channel {
            Channel::Illumination => &self.illumination,
            Channel::Temperature => &self.temperature,
            Channel::Position => &self.position,
        }
    }

    /// Atomically replaces the channel's last-known reading and signals
    /// every waiter currently registered on it.
    ///
    /// The signal is a broadcast: all registered waiters observe the same
    /// reading, each exactly once. A reading that no waiter observed before
    /// the next update arrives is discarded, never delivered late.
    pub fn update(&self, reading: Reading) {
        debug!("Channel `{}` updated to {}", reading.channel, reading.value);
        let _ = self.cell(reading.channel).send_replace(Some(reading));
    }

    /// Returns the channel's last-known reading, if the device has ever
    /// reported on it.
    #[must_use]
    pub fn last(&self, channel: Channel) -> Option<Reading> {
        *self.cell(channel).borrow()
    }

    /// Registers a [`Waiter`] for the channel's next reading.
    ///
    /// Registration marks the current reading as already seen, so a late
    /// joiner never receives a value published before it registered: only
    /// an update that happens after this call can wake the waiter.
    #[must_use]
    pub fn watch(&self, channel: Channel) -> Waiter {
        Waiter {
            receiver: self.cell(channel).subscribe(),
        }
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-flight caller's registration for a channel's next reading.
///
/// A waiter observes exactly one reading and is then spent; dropping it
/// before a reading arrives deregisters it without any effect on the
/// channel's stored value.
#[derive(Debug)]
pub struct Waiter {
    receiver: watch::Receiver<Option<Reading>>,
}

impl Waiter {
    /// Suspends until the next reading on the channel or until `timeout`
    /// elapses, whichever comes first.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::TimedOut`] when no reading arrives within `timeout`;
    /// [`ErrorKind::Connection`] when the bridge is shutting down and the
    /// channel table has been dropped.
    pub async fn next(mut self, timeout: Duration) -> Result<Reading> {
        match tokio::time::timeout(timeout, self.changed()).await {
            Ok(reading) => reading,
            Err(_) => Err(Error::new(
                ErrorKind::TimedOut,
                "no telemetry arrived within the wait deadline",
            )),
        }
    }

    async fn changed(&mut self) -> Result<Reading> {
        loop {
            self.receiver.changed().await.map_err(|_| {
                Error::new(ErrorKind::Connection, "the channel table has been dropped")
            })?;

            // The cell starts at `None` and every update stores `Some`, so
            // the loop runs at most twice.
            if let Some(reading) = *self.receiver.borrow_and_update() {
                return Ok(reading);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use tokio::time::Instant;

    use super::{Channel, Channels, ErrorKind, Reading};

    fn reading(channel: Channel, value: i64) -> Reading {
        Reading {
            channel,
            value,
            at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn a_silent_channel_times_out_within_bounds() {
        let channels = Channels::new();
        let waiter = channels.watch(Channel::Illumination);

        let start = Instant::now();
        let error = waiter.next(Duration::from_millis(100)).await.unwrap_err();
        let elapsed = start.elapsed();

        assert_eq!(error.kind(), ErrorKind::TimedOut);
        assert!(elapsed >= Duration::from_millis(100), "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "overshot the deadline: {elapsed:?}");
    }

    #[tokio::test]
    async fn a_value_published_before_registration_is_not_delivered() {
        let channels = Channels::new();
        channels.update(reading(Channel::Temperature, 19));

        // The waiter registers after the update, so the update must not
        // wake it: only the channel's next edge counts.
        let waiter = channels.watch(Channel::Temperature);
        let error = waiter.next(Duration::from_millis(50)).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::TimedOut);
        assert_eq!(channels.last(Channel::Temperature).unwrap().value, 19);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn one_signal_wakes_every_registered_waiter() {
        let channels = Arc::new(Channels::new());

        let waiters: Vec<_> = (0..8).map(|_| channels.watch(Channel::Position)).collect();
        let tasks: Vec<_> = waiters
            .into_iter()
            .map(|waiter| tokio::spawn(waiter.next(Duration::from_secs(1))))
            .collect();

        channels.update(reading(Channel::Position, 75));

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().value, 75);
        }
    }

    #[tokio::test]
    async fn an_unobserved_reading_is_overwritten_not_queued() {
        let channels = Channels::new();
        let waiter = channels.watch(Channel::Temperature);

        channels.update(reading(Channel::Temperature, 19));
        channels.update(reading(Channel::Temperature, 22));

        // Both updates happened before the waiter looked: it must observe
        // only the latest one.
        let observed = waiter.next(Duration::from_millis(100)).await.unwrap();
        assert_eq!(observed.value, 22);
        assert_eq!(channels.last(Channel::Temperature).unwrap().value, 22);
    }

    #[tokio::test]
    async fn channels_are_independent() {
        let channels = Channels::new();
        let waiter = channels.watch(Channel::Illumination);

        // Traffic on another channel must not wake this waiter.
        channels.update(reading(Channel::Temperature, 22));
        let error = waiter.next(Duration::from_millis(50)).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::TimedOut);
        assert_eq!(channels.last(Channel::Illumination), None);
    }

    #[tokio::test]
    async fn dropping_a_waiter_leaves_the_channel_untouched() {
        let channels = Channels::new();
        let cancelled = channels.watch(Channel::Position);
        drop(cancelled);

        channels.update(reading(Channel::Position, 40));

        // A waiter registered afterwards still gets the next edge.
        let waiter = channels.watch(Channel::Position);
        channels.update(reading(Channel::Position, 41));
        assert_eq!(waiter.next(Duration::from_millis(100)).await.unwrap().value, 41);
    }

    #[test]
    fn last_is_empty_until_the_first_report() {
        let channels = Channels::new();
        for channel in Channel::ALL {
            assert_eq!(channels.last(channel), None);
        }
    }
}
