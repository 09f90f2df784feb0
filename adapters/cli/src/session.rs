#![allow(clippy::missing_errors_doc)]

use std::{
    error::Error,
    fmt::{self, Write as _},
};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ventwatch_core::{DirectionMask, VentReading};

const SESSION_DOMAIN: &str = "ventwatch";
const SESSION_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded session payload.
pub(crate) const SESSION_HEADER: &str = "ventwatch:v1";
/// Delimiter used to separate the prefix, tick count, payload and digest.
const FIELD_DELIMITER: char = ':';
/// Number of leading sha256 bytes carried as the payload digest.
const DIGEST_BYTES: usize = 8;

/// Complete client observation log for one tracked game session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct SessionRecording {
    /// Mining team size the tracker was configured with.
    pub(crate) team_size: u8,
    /// Observations in tick order, one entry per game tick.
    pub(crate) ticks: Vec<RecordedTick>,
}

/// One game tick's worth of recorded client observations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct RecordedTick {
    /// Per-vent value readings in canonical vent order.
    pub(crate) readings: [VentReading; 3],
    /// Per-vent movement directions reported by the client.
    pub(crate) directions: DirectionMask,
    /// Raw aggregate stability delta, when this tick carried an update.
    pub(crate) delta: Option<i32>,
    /// Whether the in-game vent reset landed on this tick.
    pub(crate) reset: bool,
}

impl SessionRecording {
    /// Encodes the recording into a single-line string suitable for
    /// clipboard transfer.
    #[must_use]
    pub(crate) fn encode(&self) -> String {
        let json =
            serde_json::to_vec(self).expect("session recording serialization never fails");
        let digest = payload_digest(&json);
        let encoded = STANDARD_NO_PAD.encode(json);
        format!("{SESSION_HEADER}:{}:{encoded}:{digest}", self.ticks.len())
    }

    /// Decodes a recording from the provided string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, SessionTransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SessionTransferError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(SessionTransferError::MissingPrefix)?;
        let version = parts.next().ok_or(SessionTransferError::MissingVersion)?;
        let count = parts.next().ok_or(SessionTransferError::MissingTickCount)?;
        let payload = parts.next().ok_or(SessionTransferError::MissingPayload)?;
        let digest = parts.next().ok_or(SessionTransferError::MissingDigest)?;

        if domain != SESSION_DOMAIN {
            return Err(SessionTransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SESSION_VERSION {
            return Err(SessionTransferError::UnsupportedVersion(version.to_owned()));
        }
        let declared = count
            .trim()
            .parse::<usize>()
            .map_err(|_| SessionTransferError::InvalidTickCount(count.to_owned()))?;

        let bytes = STANDARD_NO_PAD
            .decode(payload.as_bytes())
            .map_err(SessionTransferError::InvalidEncoding)?;
        let expected = payload_digest(&bytes);
        if !digest.eq_ignore_ascii_case(&expected) {
            return Err(SessionTransferError::DigestMismatch {
                expected,
                found: digest.to_owned(),
            });
        }

        let decoded: SessionRecording =
            serde_json::from_slice(&bytes).map_err(SessionTransferError::InvalidPayload)?;
        if decoded.ticks.len() != declared {
            return Err(SessionTransferError::TickCountMismatch {
                declared,
                found: decoded.ticks.len(),
            });
        }

        Ok(decoded)
    }
}

/// Hex rendering of the leading sha256 bytes of the payload.
fn payload_digest(json: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(json);
    let digest = hasher.finalize();
    let mut rendered = String::with_capacity(DIGEST_BYTES * 2);
    for byte in &digest[0..DIGEST_BYTES] {
        let _ = write!(rendered, "{byte:02x}");
    }
    rendered
}

/// Errors that can occur while decoding session transfer strings.
#[derive(Debug)]
pub(crate) enum SessionTransferError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing from the encoded recording.
    MissingPrefix,
    /// The encoded recording did not contain a version segment.
    MissingVersion,
    /// The encoded recording did not include the tick count.
    MissingTickCount,
    /// The encoded recording did not include the payload segment.
    MissingPayload,
    /// The encoded recording did not include the digest segment.
    MissingDigest,
    /// The encoded recording used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The encoded recording used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The tick count could not be parsed from the encoded recording.
    InvalidTickCount(String),
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The payload digest did not match the payload bytes.
    DigestMismatch {
        /// Digest computed from the decoded payload bytes.
        expected: String,
        /// Digest carried by the encoded recording.
        found: String,
    },
    /// The decoded payload could not be deserialised.
    InvalidPayload(serde_json::Error),
    /// The declared tick count disagreed with the decoded payload.
    TickCountMismatch {
        /// Tick count carried in the header.
        declared: usize,
        /// Number of ticks actually decoded.
        found: usize,
    },
}

impl fmt::Display for SessionTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "session payload was empty"),
            Self::MissingPrefix => write!(f, "session string is missing the prefix"),
            Self::MissingVersion => write!(f, "session string is missing the version"),
            Self::MissingTickCount => write!(f, "session string is missing the tick count"),
            Self::MissingPayload => write!(f, "session string is missing the payload"),
            Self::MissingDigest => write!(f, "session string is missing the digest"),
            Self::InvalidPrefix(prefix) => {
                write!(f, "session prefix '{prefix}' is not supported")
            }
            Self::UnsupportedVersion(version) => {
                write!(f, "session version '{version}' is not supported")
            }
            Self::InvalidTickCount(count) => {
                write!(f, "could not parse session tick count '{count}'")
            }
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode session payload: {error}")
            }
            Self::DigestMismatch { expected, found } => {
                write!(
                    f,
                    "session digest '{found}' does not match payload digest '{expected}'"
                )
            }
            Self::InvalidPayload(error) => {
                write!(f, "could not parse session payload: {error}")
            }
            Self::TickCountMismatch { declared, found } => {
                write!(
                    f,
                    "session header declares {declared} ticks but the payload holds {found}"
                )
            }
        }
    }
}

impl Error for SessionTransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidPayload(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_tick() -> RecordedTick {
        RecordedTick {
            readings: [VentReading::Hidden; 3],
            directions: DirectionMask::from_bits(0b111),
            delta: None,
            reset: false,
        }
    }

    #[test]
    fn round_trip_empty_session() {
        let recording = SessionRecording {
            team_size: 1,
            ticks: Vec::new(),
        };

        let encoded = recording.encode();
        assert!(encoded.starts_with(&format!("{SESSION_HEADER}:0:")));

        let decoded = SessionRecording::decode(&encoded).expect("session decodes");
        assert_eq!(recording, decoded);
    }

    #[test]
    fn round_trip_recorded_session() {
        let mut eventful = quiet_tick();
        eventful.readings[0] = VentReading::Visible(42);
        eventful.delta = Some(23);
        let mut reset_tick = quiet_tick();
        reset_tick.reset = true;
        let recording = SessionRecording {
            team_size: 3,
            ticks: vec![quiet_tick(), eventful, reset_tick],
        };

        let encoded = recording.encode();
        assert!(encoded.starts_with(&format!("{SESSION_HEADER}:3:")));

        let decoded = SessionRecording::decode(&encoded).expect("session decodes");
        assert_eq!(recording, decoded);
    }

    #[test]
    fn tampered_digest_is_rejected() {
        let recording = SessionRecording {
            team_size: 1,
            ticks: vec![quiet_tick()],
        };
        let mut encoded = recording.encode();
        let tampered = if encoded.ends_with('0') { '1' } else { '0' };
        let _ = encoded.pop().expect("digest has at least one character");
        encoded.push(tampered);

        assert!(matches!(
            SessionRecording::decode(&encoded),
            Err(SessionTransferError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn mismatched_tick_count_is_rejected() {
        let recording = SessionRecording {
            team_size: 1,
            ticks: vec![quiet_tick(), quiet_tick()],
        };
        let encoded = recording
            .encode()
            .replacen(&format!("{SESSION_HEADER}:2:"), &format!("{SESSION_HEADER}:3:"), 1);

        assert!(matches!(
            SessionRecording::decode(&encoded),
            Err(SessionTransferError::TickCountMismatch {
                declared: 3,
                found: 2,
            })
        ));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let recording = SessionRecording {
            team_size: 1,
            ticks: Vec::new(),
        };
        let encoded = recording
            .encode()
            .replacen("ventwatch:v1:", "ventwatch:v9:", 1);

        assert!(matches!(
            SessionRecording::decode(&encoded),
            Err(SessionTransferError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            SessionRecording::decode("   "),
            Err(SessionTransferError::EmptyPayload)
        ));
    }
}
