use std::sync::Arc;
use std::time::Duration;

use persiana::channel::Channel;
use persiana::command::{CommandPayload, TimeOfDay};

use persiana_bridge::gateway::{CommandGateway, Credentials};
use persiana_bridge::store::MemoryStore;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};

use serde::Deserialize;

use crate::responses::{AckResponse, ErrorResponse, ReadingBody, ReadingResponse};

// Header names carrying the caller's device credentials.
const DEVICE_ID_HEADER: &str = "x-device-id";
const DEVICE_KEY_HEADER: &str = "x-device-key";

/// Shared state handed to every handler.
#[derive(Clone)]
pub(crate) struct AppState {
    /// The bridge's command gateway.
    pub(crate) gateway: Arc<CommandGateway>,
    /// The reading log backing the history endpoints.
    pub(crate) store: Arc<MemoryStore>,
    /// The wait deadline applied to every read-style call.
    pub(crate) wait_timeout: Duration,
}

/// Builds the HTTP surface of the service.
///
/// One `POST` per command, mirroring the fixed command set; command routes
/// require the `X-Device-Id`/`X-Device-Key` credential headers. The channel
/// routes are observe-only: `GET /channels/{channel}` suspends until the
/// channel's next reading or the configured deadline, `/last` returns the
/// stored value without waiting, and `/readings/{channel}` returns the
/// persisted history.
pub(crate) fn app(state: AppState) -> Router {
    Router::new()
        .route("/calibrate", post(calibrate))
        .route("/open", post(open))
        .route("/close", post(close))
        .route("/control_illumination", post(control_illumination))
        .route("/control_temperature", post(control_temperature))
        .route("/value", post(value))
        .route("/channels/{channel}", get(channel_next))
        .route("/channels/{channel}/last", get(channel_last))
        .route("/readings/{channel}", get(channel_readings))
        .with_state(state)
}

async fn calibrate(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    run_command(&state, "calibrate", &headers, &body).await
}

async fn open(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    run_command(&state, "open", &headers, &body).await
}

async fn close(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    run_command(&state, "close", &headers, &body).await
}

async fn control_illumination(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_command(&state, "control_illumination", &headers, &body).await
}

async fn control_temperature(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_command(&state, "control_temperature", &headers, &body).await
}

async fn value(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    run_command(&state, "value", &headers, &body).await
}

/// The optional JSON body of a command request.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandBody {
    level: Option<i64>,
    time: Option<String>,
}

/// Validates the request and routes it through the gateway.
///
/// Commands with a reply channel publish and then await the device's
/// answer; the others return as soon as the transport accepts the message.
async fn run_command(state: &AppState, name: &str, headers: &HeaderMap, body: &[u8]) -> Response {
    let credentials = match parse_credentials(headers) {
        Ok(credentials) => credentials,
        Err(response) => return response.into_response(),
    };

    let payload = match parse_body(body) {
        Ok(payload) => payload,
        Err(response) => return response.into_response(),
    };

    let waits = persiana::command::CommandKind::from_name(name)
        .is_some_and(|kind| kind.reply_channel().is_some());

    if waits {
        match state
            .gateway
            .issue_and_await(&credentials, name, payload, state.wait_timeout)
            .await
        {
            Ok(reading) => ReadingResponse::new(&reading).into_response(),
            Err(e) => ErrorResponse::from_error(&e).into_response(),
        }
    } else {
        match state.gateway.issue(&credentials, name, payload) {
            Ok(()) => AckResponse::accepted(name).into_response(),
            Err(e) => ErrorResponse::from_error(&e).into_response(),
        }
    }
}

async fn channel_next(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Response {
    let Some(channel) = Channel::from_name(&channel) else {
        return ErrorResponse::bad_request(&format!("`{channel}` is not a known channel"))
            .into_response();
    };

    match state.gateway.await_next(channel, state.wait_timeout).await {
        Ok(reading) => ReadingResponse::new(&reading).into_response(),
        Err(e) => ErrorResponse::from_error(&e).into_response(),
    }
}

async fn channel_last(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Response {
    let Some(channel) = Channel::from_name(&channel) else {
        return ErrorResponse::bad_request(&format!("`{channel}` is not a known channel"))
            .into_response();
    };

    match state.gateway.last(channel) {
        Some(reading) => ReadingResponse::new(&reading).into_response(),
        None => ErrorResponse::not_found(&format!(
            "no telemetry has arrived on `{channel}` yet"
        ))
        .into_response(),
    }
}

async fn channel_readings(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Response {
    let Some(channel) = Channel::from_name(&channel) else {
        return ErrorResponse::bad_request(&format!("`{channel}` is not a known channel"))
            .into_response();
    };

    let readings: Vec<ReadingBody> = state
        .store
        .readings(channel)
        .iter()
        .map(ReadingBody::new)
        .collect();

    Json(readings).into_response()
}

fn parse_credentials(headers: &HeaderMap) -> Result<Credentials, ErrorResponse> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };

    match (header(DEVICE_ID_HEADER), header(DEVICE_KEY_HEADER)) {
        (Some(device_id), Some(key)) => Ok(Credentials { device_id, key }),
        _ => Err(ErrorResponse::unauthorized(
            "the `X-Device-Id` and `X-Device-Key` headers are required",
        )),
    }
}

fn parse_body(body: &[u8]) -> Result<Option<CommandPayload>, ErrorResponse> {
    if body.is_empty() {
        return Ok(None);
    }

    let body: CommandBody = serde_json::from_slice(body)
        .map_err(|e| ErrorResponse::bad_request(&format!("malformed command body: {e}")))?;

    match (body.level, body.time) {
        (None, None) => Ok(None),
        (Some(level), None) => Ok(Some(CommandPayload::Level(level))),
        (None, Some(time)) => TimeOfDay::parse(&time)
            .map(|time| Some(CommandPayload::Time(time)))
            .ok_or_else(|| {
                ErrorResponse::bad_request(&format!("`{time}` is not a `HH:MM` time of day"))
            }),
        (Some(_), Some(_)) => Err(ErrorResponse::bad_request(
            "a command carries either a level or a time, not both",
        )),
    }
}
