use core::fmt;

use crate::channel::Channel;

/// A wall-clock time of day carried by shutter scheduling commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Creates a [`TimeOfDay`], rejecting out-of-range fields.
    #[must_use]
    pub const fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }

    /// Parses the `HH:MM` wire form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (hour, minute) = value.split_once(':')?;
        if hour.len() != 2 || minute.len() != 2 {
            return None;
        }
        Self::new(hour.parse().ok()?, minute.parse().ok()?)
    }

    /// Returns the hour, in the `0..=23` range.
    #[must_use]
    pub const fn hour(self) -> u8 {
        self.hour
    }

    /// Returns the minute, in the `0..=59` range.
    #[must_use]
    pub const fn minute(self) -> u8 {
        self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// The fixed set of instructions a controller can publish to its devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Recalibrates the shutter motor end stops.
    Calibrate,
    /// Opens the shutter, immediately or at a scheduled time of day.
    Open,
    /// Closes the shutter, immediately or at a scheduled time of day.
    Close,
    /// Sets the illumination level and requests the measured one back.
    ControlIllumination,
    /// Sets the temperature setpoint and requests the measured one back.
    ControlTemperature,
    /// Sets the shutter position and requests the reached one back.
    Value,
}

impl CommandKind {
    /// The fixed command set.
    pub const ALL: [Self; 6] = [
        Self::Calibrate,
        Self::Open,
        Self::Close,
        Self::ControlIllumination,
        Self::ControlTemperature,
        Self::Value,
    ];

    /// Returns the wire topic the command is published on.
    #[must_use]
    pub const fn topic(self) -> &'static str {
        match self {
            Self::Calibrate => "home/calibrate",
            Self::Open => "home/open",
            Self::Close => "home/close",
            Self::ControlIllumination => "home/control_illumination",
            Self::ControlTemperature => "home/control_temperature",
            Self::Value => "home/value",
        }
    }

    /// Returns the command name used in HTTP paths and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Calibrate => "calibrate",
            Self::Open => "open",
            Self::Close => "close",
            Self::ControlIllumination => "control_illumination",
            Self::ControlTemperature => "control_temperature",
            Self::Value => "value",
        }
    }

    /// Maps a command name back onto its kind.
    ///
    /// Names outside the fixed command set return [`None`]; the bridge
    /// reports them to the caller as an unknown command.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "calibrate" => Some(Self::Calibrate),
            "open" => Some(Self::Open),
            "close" => Some(Self::Close),
            "control_illumination" => Some(Self::ControlIllumination),
            "control_temperature" => Some(Self::ControlTemperature),
            "value" => Some(Self::Value),
            _ => None,
        }
    }

    /// Returns the [`Channel`] the device answers a read-style command on.
    ///
    /// Shutter motion commands are fire-and-forget and return [`None`].
    #[must_use]
    pub const fn reply_channel(self) -> Option<Channel> {
        match self {
            Self::Calibrate | Self::Open | Self::Close => None,
            Self::ControlIllumination => Some(Channel::Illumination),
            Self::ControlTemperature => Some(Channel::Temperature),
            Self::Value => Some(Channel::Position),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

/// The value carried alongside a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPayload {
    /// An integer level: brightness, temperature setpoint, or shutter
    /// position.
    Level(i64),
    /// A wall-clock schedule for a shutter movement.
    Time(TimeOfDay),
}

/// A validated command, ready for publication.
///
/// A command is created per HTTP request, published, and discarded; it has
/// no persisted identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    payload: Option<CommandPayload>,
}

impl Command {
    /// Builds a [`Command`], checking the payload shape against the kind.
    ///
    /// Calibrate takes no payload, open and close take an optional schedule
    /// time, and the level commands require an integer level. A mismatched
    /// payload returns [`None`].
    #[must_use]
    pub const fn new(kind: CommandKind, payload: Option<CommandPayload>) -> Option<Self> {
        let accepted = match kind {
            CommandKind::Calibrate => payload.is_none(),
            CommandKind::Open | CommandKind::Close => {
                matches!(payload, None | Some(CommandPayload::Time(_)))
            }
            CommandKind::ControlIllumination | CommandKind::ControlTemperature
            | CommandKind::Value => matches!(payload, Some(CommandPayload::Level(_))),
        };

        if accepted { Some(Self { kind, payload }) } else { None }
    }

    /// Returns the command kind.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Returns the command payload, if any.
    #[must_use]
    pub const fn payload(&self) -> Option<CommandPayload> {
        self.payload
    }

    /// Returns the wire form of the payload.
    ///
    /// Levels are encoded as UTF-8 decimal text and schedule times as
    /// `HH:MM`; payload-less commands return [`None`].
    #[must_use]
    pub fn encode(&self) -> Option<Vec<u8>> {
        self.payload.map(|payload| match payload {
            CommandPayload::Level(level) => level.to_string().into_bytes(),
            CommandPayload::Time(time) => time.to_string().into_bytes(),
        })
    }
}
