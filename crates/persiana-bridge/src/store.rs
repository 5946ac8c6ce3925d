use std::collections::VecDeque;
use std::sync::Mutex;

use persiana::channel::Channel;
use persiana::reading::Reading;

use crate::error::{Error, ErrorKind, Result};

// The maximum number of readings the in-memory log retains.
const MEMORY_STORE_CAPACITY: usize = 1024;

/// A sink for decoded telemetry readings.
///
/// The bridge hands every decoded reading to the store fire-and-forget: a
/// failure is logged by the telemetry router and never reaches the waiters
/// that have already been signaled. Implementations must not block the
/// router for long.
pub trait ReadingStore: Send + Sync {
    /// Records one reading.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Store`] when the reading could not be recorded.
    fn persist(&self, reading: &Reading) -> Result<()>;
}

/// A store that discards every reading.
///
/// For deployments that only need live values and no history.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStore;

impl ReadingStore for NoStore {
    fn persist(&self, _reading: &Reading) -> Result<()> {
        Ok(())
    }
}

/// A bounded in-memory reading log.
///
/// The in-process stand-in for an external database: once the log is full,
/// the oldest reading makes room for the newest.
#[derive(Debug, Default)]
pub struct MemoryStore {
    readings: Mutex<VecDeque<Reading>>,
}

impl MemoryStore {
    /// Creates an empty [`MemoryStore`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored readings for a channel, oldest first.
    #[must_use]
    pub fn readings(&self, channel: Channel) -> Vec<Reading> {
        self.readings
            .lock()
            .map(|readings| {
                readings
                    .iter()
                    .filter(|reading| reading.channel == channel)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ReadingStore for MemoryStore {
    fn persist(&self, reading: &Reading) -> Result<()> {
        let mut readings = self
            .readings
            .lock()
            .map_err(|_| Error::new(ErrorKind::Store, "the reading log mutex is poisoned"))?;

        if readings.len() == MEMORY_STORE_CAPACITY {
            let _ = readings.pop_front();
        }
        readings.push_back(*reading);

        Ok(())
    }
}
