use core::fmt;
use core::str;

use std::time::SystemTime;

use crate::channel::Channel;

/// The reasons a raw telemetry payload can be rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is not valid UTF-8 text.
    NotText,
    /// The payload text is not a decimal integer.
    NotAnInteger(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotText => write!(f, "the payload is not valid UTF-8 text"),
            Self::NotAnInteger(text) => {
                write!(f, "the payload `{text}` is not a decimal integer")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// A decoded telemetry value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// The channel the value arrived on.
    pub channel: Channel,
    /// The raw scalar reported by the device.
    pub value: i64,
    /// When the bridge received the value.
    pub at: SystemTime,
}

impl Reading {
    /// Decodes a raw telemetry payload: UTF-8 text holding a decimal
    /// integer, surrounding whitespace ignored.
    ///
    /// # Errors
    ///
    /// A payload that is not UTF-8 or not an integer is rejected with a
    /// [`DecodeError`]; the channel state must be left unchanged by the
    /// caller in that case.
    pub fn decode(channel: Channel, payload: &[u8], at: SystemTime) -> Result<Self, DecodeError> {
        let text = str::from_utf8(payload).map_err(|_| DecodeError::NotText)?;
        let text = text.trim();
        let value = text
            .parse()
            .map_err(|_| DecodeError::NotAnInteger(text.into()))?;

        Ok(Self { channel, value, at })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::{Channel, DecodeError, Reading};

    #[test]
    fn decimal_payloads_decode() {
        let at = SystemTime::now();
        let reading = Reading::decode(Channel::Temperature, b"22", at).unwrap();
        assert_eq!(reading.channel, Channel::Temperature);
        assert_eq!(reading.value, 22);
        assert_eq!(reading.at, at);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let reading = Reading::decode(Channel::Position, b" 75\n", SystemTime::now()).unwrap();
        assert_eq!(reading.value, 75);
    }

    #[test]
    fn negative_values_decode() {
        let reading = Reading::decode(Channel::Temperature, b"-3", SystemTime::now()).unwrap();
        assert_eq!(reading.value, -3);
    }

    #[test]
    fn non_integer_payloads_are_rejected() {
        assert_eq!(
            Reading::decode(Channel::Illumination, b"bright", SystemTime::now()),
            Err(DecodeError::NotAnInteger("bright".into()))
        );
        assert_eq!(
            Reading::decode(Channel::Illumination, b"", SystemTime::now()),
            Err(DecodeError::NotAnInteger(String::new()))
        );
    }

    #[test]
    fn non_utf8_payloads_are_rejected() {
        assert_eq!(
            Reading::decode(Channel::Illumination, &[0xff, 0xfe], SystemTime::now()),
            Err(DecodeError::NotText)
        );
    }
}
