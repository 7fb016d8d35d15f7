//! HTTP API for the relay.
//!
//! | Path        | Method | Query            | Body          |
//! |-------------|--------|------------------|---------------|
//! | `/sign_in`  | GET    | `<name>`         | -             |
//! | `/sign_out` | GET    | `peer_id`        | -             |
//! | `/message`  | POST   | `peer_id`, `to`  | opaque bytes  |
//! | `/wait`     | GET    | `peer_id`        | -             |
//!
//! Successful responses name the relevant peer in the `Pragma` header
//! (mirrored in `X-Peer-Id`). A wrong method is a 400, not a 405.
//! Message bodies are relayed verbatim with no size limit.

use crate::error::{Error, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderName, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use sigrelay_core::{PeerId, Relay};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Header carrying the origin peer id alongside `Pragma`.
pub const X_PEER_ID: &str = "x-peer-id";

const PEER_ID_PARAM: &str = "peer_id";
const TO_PARAM: &str = "to";

const INVALID_PEER_OR_TO: &str = "Invalid Peer or To ID";

/// Query string as ordered key/value pairs.
type Params = Vec<(String, String)>;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(relay: Arc<Relay>, shutdown: watch::Receiver<bool>) -> Self {
        Self { relay, shutdown }
    }

    /// Resolves once the node starts shutting down. Never resolves if the
    /// shutdown sender goes away without signalling.
    fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.shutdown.clone();
        async move {
            if rx.wait_for(|stop| *stop).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Build the API router.
pub fn build_router(state: AppState, server_id: HeaderValue) -> Router {
    Router::new()
        .route("/sign_in", any(sign_in))
        .route("/sign_out", any(sign_out))
        .route("/message", any(message))
        .route("/wait", any(wait))
        .fallback(unrouted)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(static_header(header::CACHE_CONTROL, "no-cache"))
        .layer(SetResponseHeaderLayer::overriding(header::SERVER, server_id))
        .layer(static_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .layer(static_header(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true"))
        .layer(static_header(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            "GET,POST,OPTIONS",
        ))
        .layer(static_header(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            "Content-Type,Content-Length,Cache-Control,Connection",
        ))
        .layer(static_header(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            "Content-Length,X-Peer-Id",
        ))
        .layer(static_header(header::CONNECTION, "close"))
        .with_state(state)
}

fn static_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

// --- Helpers ---

fn require_method(actual: &Method, expected: Method) -> Result<()> {
    if *actual == expected {
        Ok(())
    } else {
        Err(Error::InvalidInput("Bad request".into()))
    }
}

/// First value of `key`; repeated keys are ignored.
fn param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// The registration name is the first non-empty key whose value is empty.
fn sign_in_name(params: &Params) -> Option<&str> {
    params
        .iter()
        .find(|(k, v)| !k.is_empty() && v.is_empty())
        .map(|(k, _)| k.as_str())
}

/// Unparseable ids are reported as unknown peers.
fn parse_peer(raw: &str) -> Result<PeerId> {
    raw.parse()
        .map_err(|_| Error::Relay(sigrelay_core::Error::UnknownPeer(raw.to_string())))
}

fn with_origin(origin: PeerId, body: impl IntoResponse) -> Response {
    let id = origin.to_string();
    (
        [
            (header::PRAGMA, id.clone()),
            (HeaderName::from_static(X_PEER_ID), id),
        ],
        body,
    )
        .into_response()
}

// --- Handlers ---

async fn sign_in(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<Params>,
) -> Result<Response> {
    require_method(&method, Method::GET)?;
    let name = sign_in_name(&params).ok_or_else(|| Error::InvalidInput("No name".into()))?;
    let registration = state.relay.register(name)?;
    Ok(with_origin(registration.peer.id, registration.body()))
}

async fn sign_out(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<Params>,
) -> Result<Response> {
    require_method(&method, Method::GET)?;
    let raw = param(&params, PEER_ID_PARAM)
        .ok_or_else(|| Error::InvalidInput("Missing Peer ID".into()))?;
    let peer = state.relay.deregister(parse_peer(raw)?)?;
    Ok(with_origin(peer.id, ()))
}

async fn message(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<Params>,
    body: Bytes,
) -> Result<Response> {
    require_method(&method, Method::POST)?;
    let (Some(from), Some(to)) = (param(&params, PEER_ID_PARAM), param(&params, TO_PARAM)) else {
        return Err(Error::InvalidInput("Missing Peer or To ID".into()));
    };
    let invalid = || Error::InvalidInput(INVALID_PEER_OR_TO.into());
    let (Ok(from), Ok(to)) = (from.parse::<PeerId>(), to.parse::<PeerId>()) else {
        return Err(invalid());
    };
    state.relay.send(from, to, body).map_err(|e| match e {
        sigrelay_core::Error::UnknownPeer(_) => invalid(),
        other => Error::Relay(other),
    })?;
    Ok(with_origin(from, ()))
}

/// Long-poll. If the client hangs up, hyper drops this future and the
/// relay's wait guard clears the peer's waiting mark.
async fn wait(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<Params>,
) -> Result<Response> {
    require_method(&method, Method::GET)?;
    let raw = param(&params, PEER_ID_PARAM)
        .ok_or_else(|| Error::InvalidInput("Missing Peer ID".into()))?;
    let id = parse_peer(raw)?;

    match state.relay.receive_until(id, state.shutdown_signal()).await? {
        Some(envelope) => Ok(with_origin(envelope.from, envelope.body)),
        None => Err(Error::ShuttingDown),
    }
}

async fn unrouted(method: Method, uri: Uri) -> impl IntoResponse {
    tracing::debug!(%method, %uri, "unrouted request");
}
