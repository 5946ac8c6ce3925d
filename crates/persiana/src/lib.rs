//! The shared vocabulary between a `persiana` bridge and the devices it
//! controls.
//!
//! This crate provides APIs to:
//!
//! - Name the telemetry channels a device reports on and map them onto
//!   their wire topics. A channel is a logical stream — illumination,
//!   temperature, shutter position — abstracted from the topic that
//!   carries it.
//! - Describe the fixed set of commands a controller can publish to its
//!   devices, validate their payloads, and encode them into their wire
//!   form.
//! - Decode raw telemetry payloads into typed readings, isolating the
//!   single place where malformed device data can be rejected.
//!
//! The crate is plain data: it performs no I/O and owns no connection, so
//! both the bridge and any tooling that speaks the same wire vocabulary can
//! depend on it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Telemetry channels and their wire topics.
pub mod channel;
/// The outbound command set and its payloads.
pub mod command;
/// Decoded telemetry readings.
pub mod reading;
