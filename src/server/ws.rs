//! Live viewer route
//!
//! Each WebSocket session registers one viewer under the requested tenant.
//! Outbound frames flow through the hub's writer task. The session itself
//! sends keep-alive pings and watches the inbound half; it ends when the
//! peer closes, when nothing arrives within the idle limit, or when the
//! writer finishes because the viewer was evicted or the hub stopped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant};

use super::ingest::error_response;
use super::AppState;
use crate::hub::{
    spawn_writer, FanoutHub, TenantId, TransportClosed, ViewerConnection, ViewerTransport,
};

#[derive(Debug, Deserialize)]
pub struct SubscribeParams {
    pub farm_id: Option<String>,
}

/// `GET /ws?farm_id=<tenant>`
pub async fn serve_ws(
    State(state): State<AppState>,
    Query(params): Query<SubscribeParams>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let tenant = match params.farm_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => TenantId::new(id),
        _ => return error_response(StatusCode::BAD_REQUEST, "farm_id is required"),
    };

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let hub = state.hub.clone();
    let idle = state.viewer_idle_timeout;
    upgrade.on_upgrade(move |socket| viewer_session(socket, hub, tenant, idle))
}

async fn viewer_session(socket: WebSocket, hub: FanoutHub, tenant: TenantId, idle: Duration) {
    let (sink, inbound) = socket.split();
    let sink = Arc::new(Mutex::new(sink));

    let (connection, mailbox) = ViewerConnection::new(tenant, hub.config().mailbox_capacity);
    let viewer = connection.id().clone();

    if let Err(e) = hub.register(connection).await {
        tracing::warn!(viewer = %viewer, error = %e, "Viewer not registered");
        return;
    }
    let transport = WsTransport {
        sink: Arc::clone(&sink),
    };
    let mut writer = spawn_writer(viewer.clone(), mailbox, transport, hub.clone());

    let end = watch_session(inbound, &*sink, &mut writer, idle).await;
    tracing::debug!(viewer = %viewer, reason = ?end, "Viewer session ended");

    let _ = hub.unregister(viewer.clone()).await;
    if end != SessionEnd::WriterFinished {
        // The peer is gone; frames still queued have nowhere to go
        writer.abort();
    }
}

/// Why a viewer session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Close frame, read error or end of stream
    PeerClosed,
    /// Nothing received within the idle limit
    Idle,
    /// Writer exited: evicted, unregistered or hub stopped
    WriterFinished,
}

/// Watch one session until it should end
///
/// Any inbound message, pongs included, resets the idle deadline. A ping goes
/// out every nine tenths of the idle limit so a live peer always has
/// something to answer.
async fn watch_session<St, Si>(
    mut inbound: St,
    sink: &Mutex<Si>,
    writer: &mut JoinHandle<()>,
    idle: Duration,
) -> SessionEnd
where
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
    Si: Sink<Message> + Unpin,
{
    let period = (idle * 9 / 10).max(Duration::from_millis(1));
    let mut keepalive = interval_at(Instant::now() + period, period);
    let deadline = sleep(idle);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut *writer => return SessionEnd::WriterFinished,
            _ = &mut deadline => return SessionEnd::Idle,
            _ = keepalive.tick() => {
                let ping = async { sink.lock().await.send(Message::Ping(Vec::new())).await };
                match timeout(idle, ping).await {
                    Ok(Ok(())) => {}
                    _ => return SessionEnd::PeerClosed,
                }
            }
            message = inbound.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return SessionEnd::PeerClosed,
                Some(Ok(_)) => deadline.as_mut().reset(Instant::now() + idle),
            },
        }
    }
}

struct WsTransport<Si> {
    sink: Arc<Mutex<Si>>,
}

#[async_trait]
impl<Si> ViewerTransport for WsTransport<Si>
where
    Si: Sink<Message> + Unpin + Send + 'static,
{
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportClosed> {
        let text = String::from_utf8_lossy(&frame).into_owned();
        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|_| TransportClosed)
    }

    async fn close(&mut self) {
        let _ = self.sink.lock().await.close().await;
    }
}
