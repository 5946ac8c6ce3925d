//! The `persiana-bridge` library crate reconciles two concurrency models:
//! a request/response protocol with no persistent connection to the caller,
//! and a fire-and-forget message bus with no request/response correlation
//! of its own.
//!
//! Core functionalities of this crate include:
//!
//! - Turning a validated inbound command into an outbound publish on the
//!   `MQTT` bus
//! - Turning an asynchronously-arriving telemetry message into the reply of
//!   a different, concurrently-blocked caller
//! - Keeping the last-known reading of every telemetry channel and waking
//!   all the waiters registered on it, each exactly once, when a new one
//!   arrives
//! - Bounding every wait with a deadline, so callers complete in finite
//!   time even under total device silence
//!
//! The bridge stays correct under concurrent callers because a waiter is
//! always registered before the command that should trigger the device's
//! reply is handed to the transport. `tokio` drives all asynchronous tasks:
//! the bus receive loop and the telemetry router run independently of the
//! callers suspended on channel waits.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// The `MQTT` bus client and the publish seam.
pub mod bus;
/// Error management.
pub mod error;
/// The caller-facing command gateway.
pub mod gateway;
/// Live channel state and the waiter rendezvous.
pub mod registry;
/// Telemetry dispatch from the bus onto the channels.
pub mod router;
/// The persistence boundary for decoded readings.
pub mod store;
