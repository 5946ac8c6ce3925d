use core::fmt;

use serde::{Deserialize, Serialize};

/// A logical telemetry stream abstracted from the wire topic that carries it.
///
/// Channels are created once at process start and live for the whole process:
/// a device may stay silent on a channel for any amount of time, but the
/// channel itself is never destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Ambient light level reported by the illumination sensor.
    Illumination,
    /// Ambient temperature reported by the temperature sensor.
    Temperature,
    /// Shutter position reported after a movement or value command.
    Position,
}

impl Channel {
    /// The fixed set of channels a device reports on.
    pub const ALL: [Self; 3] = [Self::Illumination, Self::Temperature, Self::Position];

    /// Returns the wire topic the channel's telemetry arrives on.
    #[must_use]
    pub const fn telemetry_topic(self) -> &'static str {
        match self {
            Self::Illumination => "home/control_illumination",
            Self::Temperature => "home/control_temperature",
            Self::Position => "home/value",
        }
    }

    /// Maps a wire topic back onto its channel.
    ///
    /// Topics outside the fixed telemetry set return [`None`]; the caller
    /// decides whether to drop or log them.
    #[must_use]
    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            "home/control_illumination" => Some(Self::Illumination),
            "home/control_temperature" => Some(Self::Temperature),
            "home/value" => Some(Self::Position),
            _ => None,
        }
    }

    /// Returns the channel name used in HTTP paths and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Illumination => "illumination",
            Self::Temperature => "temperature",
            Self::Position => "position",
        }
    }

    /// Maps a channel name back onto its channel.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "illumination" => Some(Self::Illumination),
            "temperature" => Some(Self::Temperature),
            "position" => Some(Self::Position),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::Channel;

    #[test]
    fn topics_map_back_onto_their_channels() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_topic(channel.telemetry_topic()), Some(channel));
        }
    }

    #[test]
    fn names_map_back_onto_their_channels() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_name(channel.name()), Some(channel));
        }
    }

    #[test]
    fn unknown_topics_and_names_are_rejected() {
        assert_eq!(Channel::from_topic("home/unknown"), None);
        assert_eq!(Channel::from_topic(""), None);
        assert_eq!(Channel::from_name("humidity"), None);
    }

    #[test]
    fn channels_serialize_as_their_names() {
        assert_eq!(
            serde_json::to_value(Channel::Temperature).unwrap(),
            serde_json::json!("temperature")
        );
        assert_eq!(
            serde_json::from_value::<Channel>(serde_json::json!("position")).unwrap(),
            Channel::Position
        );
    }
}
