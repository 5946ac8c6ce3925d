use std::time::{SystemTime, UNIX_EPOCH};

use persiana::channel::Channel;
use persiana::reading::Reading;

use persiana_bridge::error::{Error, ErrorKind};

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use serde::Serialize;

/// JSON body of a decoded telemetry reading.
#[derive(Debug, Serialize)]
pub(crate) struct ReadingBody {
    channel: Channel,
    value: i64,
    at_ms: u64,
}

impl ReadingBody {
    pub(crate) fn new(reading: &Reading) -> Self {
        Self {
            channel: reading.channel,
            value: reading.value,
            at_ms: epoch_ms(reading.at),
        }
    }
}

fn epoch_ms(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| u64::try_from(elapsed.as_millis()).ok())
        .unwrap_or_default()
}

#[derive(Debug, Serialize)]
struct AckBody {
    accepted: bool,
    command: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    description: String,
}

/// A response notifying that a fire-and-forget command was accepted by the
/// transport.
pub(crate) struct AckResponse(Response);

impl AckResponse {
    /// Generates an [`AckResponse`] for the given command name.
    #[must_use]
    pub(crate) fn accepted(command: &str) -> Self {
        let body = AckBody {
            accepted: true,
            command: command.to_owned(),
        };
        Self((StatusCode::OK, Json(body)).into_response())
    }
}

impl IntoResponse for AckResponse {
    fn into_response(self) -> Response {
        self.0
    }
}

/// A response carrying a decoded telemetry reading.
pub(crate) struct ReadingResponse(Response);

impl ReadingResponse {
    /// Generates a [`ReadingResponse`].
    #[must_use]
    pub(crate) fn new(reading: &Reading) -> Self {
        Self((StatusCode::OK, Json(ReadingBody::new(reading))).into_response())
    }
}

impl IntoResponse for ReadingResponse {
    fn into_response(self) -> Response {
        self.0
    }
}

/// A response providing details about a failed bridge operation.
///
/// Carries the bridge's error taxonomy onto HTTP: timeouts map to
/// `504 Gateway Timeout`, caller mistakes to `400 Bad Request`, rejected
/// credentials to `401 Unauthorized`, and transport failures to
/// `502 Bad Gateway`.
pub(crate) struct ErrorResponse(Response);

impl ErrorResponse {
    /// Generates an [`ErrorResponse`] from a bridge [`Error`].
    #[must_use]
    pub(crate) fn from_error(error: &Error) -> Self {
        Self::with_status(status_for(error.kind()), &error.kind().to_string(), error.info())
    }

    /// Generates an [`ErrorResponse`] for a malformed request.
    #[must_use]
    pub(crate) fn bad_request(description: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, "invalid request", description)
    }

    /// Generates an [`ErrorResponse`] for missing or rejected credentials.
    #[must_use]
    pub(crate) fn unauthorized(description: &str) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, "unauthorized", description)
    }

    /// Generates an [`ErrorResponse`] for a resource that does not exist
    /// yet.
    #[must_use]
    pub(crate) fn not_found(description: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, "not found", description)
    }

    fn with_status(status: StatusCode, error: &str, description: &str) -> Self {
        let body = ErrorBody {
            error: error.to_owned(),
            description: description.to_owned(),
        };
        Self((status, Json(body)).into_response())
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        self.0
    }
}

const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::UnknownCommand | ErrorKind::UnknownChannel | ErrorKind::InvalidPayload => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Connection | ErrorKind::Publish => StatusCode::BAD_GATEWAY,
        ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use persiana::channel::Channel;
    use persiana::reading::Reading;

    use persiana_bridge::error::{Error, ErrorKind};

    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    use super::{AckResponse, ErrorResponse, ReadingBody, ReadingResponse};

    #[test]
    fn every_error_kind_maps_onto_its_status() {
        let expectations = [
            (ErrorKind::UnknownCommand, StatusCode::BAD_REQUEST),
            (ErrorKind::UnknownChannel, StatusCode::BAD_REQUEST),
            (ErrorKind::InvalidPayload, StatusCode::BAD_REQUEST),
            (ErrorKind::Unauthorized, StatusCode::UNAUTHORIZED),
            (ErrorKind::TimedOut, StatusCode::GATEWAY_TIMEOUT),
            (ErrorKind::Connection, StatusCode::BAD_GATEWAY),
            (ErrorKind::Publish, StatusCode::BAD_GATEWAY),
            (ErrorKind::Store, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (kind, status) in expectations {
            let response = ErrorResponse::from_error(&Error::new(kind, "test")).into_response();
            assert_eq!(response.status(), status, "wrong status for {kind}");
        }
    }

    #[test]
    fn success_responses_are_ok() {
        let reading = Reading {
            channel: Channel::Temperature,
            value: 22,
            at: UNIX_EPOCH + Duration::from_secs(1),
        };

        assert_eq!(
            ReadingResponse::new(&reading).into_response().status(),
            StatusCode::OK
        );
        assert_eq!(
            AckResponse::accepted("calibrate").into_response().status(),
            StatusCode::OK
        );
    }

    #[test]
    fn reading_bodies_carry_epoch_milliseconds() {
        let reading = Reading {
            channel: Channel::Position,
            value: 75,
            at: UNIX_EPOCH + Duration::from_millis(1500),
        };

        let body = serde_json::to_value(ReadingBody::new(&reading)).unwrap();
        assert_eq!(body["channel"], "position");
        assert_eq!(body["value"], 75);
        assert_eq!(body["at_ms"], 1500);
    }

    #[test]
    fn a_missing_resource_is_not_found() {
        let response = ErrorResponse::not_found("no telemetry yet").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
