//! `GET /ws`: the per-client session.
//!
//! A session is registered with the broadcast registry on connect and
//! removed on disconnect, transport error or keepalive timeout. It forwards
//! queued broadcast frames, answers `request_historical_data` on a spawned
//! task, and pings the client periodically.

use std::{fmt::Display, time::Duration};

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::{
    sync::mpsc,
    time::{interval_at, sleep_until, Instant},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::broadcast::{ClientEvent, ServerEvent, SessionRegistry};
use crate::history::{HistoryService, TimeRange};

// ---

/// What a session needs besides its transport.
#[derive(Clone)]
pub struct SessionContext {
    pub sessions: SessionRegistry,
    pub history: HistoryService,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
}

impl SessionContext {
    fn from_state(state: &AppState) -> Self {
        Self {
            sessions: state.sessions.clone(),
            history: state.history.clone(),
            ping_interval: state.config.ws_ping_interval,
            ping_timeout: state.config.ws_ping_timeout,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // ---
    let ctx = SessionContext::from_state(&state);
    ws.on_upgrade(move |socket: WebSocket| async move {
        let (sink, stream) = socket.split();
        run_session(sink, stream, ctx).await;
    })
}

/// Drive one session until the client goes away.
pub async fn run_session<Tx, Rx, E>(mut sink: Tx, mut stream: Rx, ctx: SessionContext)
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: Display,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    // ---
    let (id, reply, mut outbound) = ctx.sessions.register().await;
    let mut ping = interval_at(Instant::now() + ctx.ping_interval, ctx.ping_interval);
    let mut last_seen = Instant::now();

    let reason = loop {
        let idle_deadline = last_seen + ctx.ping_timeout;

        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    break "outbound queue closed".to_string();
                };
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    break format!("send failed: {}", e);
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(message)) => {
                    last_seen = Instant::now();
                    match message {
                        Message::Text(text) => handle_client_frame(id, text.as_str(), &ctx, &reply),
                        Message::Close(_) => break "client closed".to_string(),
                        Message::Binary(_) => warn!("Session {} sent a binary frame, ignored", id),
                        Message::Ping(_) | Message::Pong(_) => {}
                    }
                }
                Some(Err(e)) => break format!("transport error: {}", e),
                None => break "stream ended".to_string(),
            },
            _ = ping.tick() => {
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    break format!("ping failed: {}", e);
                }
            }
            _ = sleep_until(idle_deadline) => {
                break format!("no traffic for {:?}", ctx.ping_timeout);
            }
        }
    };

    ctx.sessions.remove(id).await;
    if let Err(e) = sink.close().await {
        debug!("Session {} close: {}", id, e);
    }
    info!("Client disconnected: {} ({})", id, reason);
}

/// Handle one application frame. Malformed frames are logged and ignored.
fn handle_client_frame(
    id: Uuid,
    text: &str,
    ctx: &SessionContext,
    reply: &mpsc::Sender<axum::extract::ws::Utf8Bytes>,
) {
    // ---
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("Session {} sent an unreadable frame: {}", id, e);
            return;
        }
    };

    match event {
        ClientEvent::RequestHistoricalData(request) => {
            let range = TimeRange::from_token(request.time_range.as_deref());
            debug!("Session {} requested historical data ({})", id, range.token());

            let history = ctx.history.clone();
            let reply = reply.clone();
            tokio::spawn(async move {
                let bundle = match history.bundle(range).await {
                    Ok(bundle) => bundle,
                    Err(e) => {
                        error!("Error sending historical data: {}", e);
                        return;
                    }
                };
                let frame = match ServerEvent::HistoricalDataUpdate(bundle).to_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!("Failed to serialize historical data: {}", e);
                        return;
                    }
                };
                if reply.send(frame).await.is_err() {
                    debug!("Session {} gone, historical result discarded", id);
                }
            });
        }
    }
}
