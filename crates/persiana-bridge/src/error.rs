use core::fmt;

use std::borrow::Cow;

/// All the kinds of failure the bridge can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The broker connection could not be established or has been lost.
    Connection,
    /// A command could not be handed to the transport.
    Publish,
    /// The command name is not part of the known command set.
    UnknownCommand,
    /// The command has no telemetry channel to await a reply on.
    UnknownChannel,
    /// The command payload does not match what the command expects.
    InvalidPayload,
    /// The delegated device lookup rejected the caller.
    Unauthorized,
    /// No telemetry arrived within the wait deadline.
    ///
    /// An expected outcome under device silence, not a fault.
    TimedOut,
    /// The reading store rejected a telemetry value.
    Store,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => "connection",
            Self::Publish => "publish",
            Self::UnknownCommand => "unknown command",
            Self::UnknownChannel => "unknown channel",
            Self::InvalidPayload => "invalid payload",
            Self::Unauthorized => "unauthorized",
            Self::TimedOut => "timed out",
            Self::Store => "store",
        }
        .fmt(f)
    }
}

/// A bridge error: an [`ErrorKind`] plus a description of the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    info: Cow<'static, str>,
}

impl Error {
    /// Creates an [`Error`] from its kind and a description.
    #[must_use]
    #[inline]
    pub fn new(kind: ErrorKind, info: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            info: info.into(),
        }
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the failure description.
    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.info)
    }
}

impl std::error::Error for Error {}

/// A specialized result whose error is always a bridge [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
