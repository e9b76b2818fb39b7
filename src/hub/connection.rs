//! Viewer connections and their outbound mailboxes
//!
//! A [`ViewerConnection`] is the hub-side half of a viewer: the sending end
//! of a bounded mailbox plus the viewer's identity. The receiving end, the
//! [`Mailbox`], is drained by exactly one writer task into a
//! [`ViewerTransport`]. Dropping the connection (which only the hub does)
//! closes the mailbox, which in turn makes the writer close the transport.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::error::TransportClosed;
use super::event::TenantId;
use super::registry::FanoutHub;

/// Receiving end of a viewer's outbound queue
pub type Mailbox = mpsc::Receiver<Bytes>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a registered viewer: its connection id and the tenant it
/// belongs to for its whole lifetime
///
/// Only [`ViewerConnection::new`] mints ids, so an id always names the
/// tenant its connection was registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewerId {
    connection: ConnectionId,
    tenant: TenantId,
}

impl ViewerId {
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.tenant, self.connection)
    }
}

/// Why a frame could not be queued for a viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeliveryFailure {
    /// Mailbox at capacity: the viewer is not keeping up
    Full,
    /// Writer task is gone
    Closed,
}

/// Hub-side handle for one live viewer
#[derive(Debug)]
pub struct ViewerConnection {
    id: ViewerId,
    mailbox: mpsc::Sender<Bytes>,
}

impl ViewerConnection {
    /// Create a connection for `tenant` with a mailbox of `capacity` frames
    ///
    /// Returns the connection (to hand to [`FanoutHub::register`]) and the
    /// mailbox its writer drains.
    pub fn new(tenant: TenantId, capacity: usize) -> (Self, Mailbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let connection = Self {
            id: ViewerId {
                connection: ConnectionId::next(),
                tenant,
            },
            mailbox: tx,
        };
        (connection, rx)
    }

    pub fn id(&self) -> &ViewerId {
        &self.id
    }

    pub fn tenant(&self) -> &TenantId {
        &self.id.tenant
    }

    /// Queue a frame without waiting
    pub(crate) fn try_deliver(&self, frame: Bytes) -> Result<(), DeliveryFailure> {
        self.mailbox.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryFailure::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }
}

/// Outbound side of one real viewer transport (WebSocket, SSE, test sink...)
#[async_trait]
pub trait ViewerTransport: Send + 'static {
    /// Write one frame to the peer
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportClosed>;

    /// Close the transport. Called at most once, by the writer task.
    async fn close(&mut self);
}

/// Spawn the dedicated writer for a viewer
///
/// The writer forwards frames from `mailbox` to `transport` in order. If the
/// transport fails it unregisters the viewer from `hub`. When the mailbox is
/// closed (unregister, eviction or hub shutdown) it closes the transport and
/// exits.
pub fn spawn_writer<T: ViewerTransport>(
    viewer: ViewerId,
    mut mailbox: Mailbox,
    mut transport: T,
    hub: FanoutHub,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut frames_sent: u64 = 0;

        while let Some(frame) = mailbox.recv().await {
            if transport.send(frame).await.is_err() {
                tracing::debug!(viewer = %viewer, "Viewer transport closed");
                let _ = hub.unregister(viewer.clone()).await;
                break;
            }
            frames_sent += 1;
        }

        transport.close().await;
        tracing::debug!(viewer = %viewer, frames_sent, "Viewer writer finished");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::hub::{Event, HubConfig};

    #[derive(Default)]
    struct Recorded {
        frames: Vec<Bytes>,
        closes: usize,
    }

    struct RecordingTransport {
        recorded: Arc<Mutex<Recorded>>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl ViewerTransport for RecordingTransport {
        async fn send(&mut self, frame: Bytes) -> Result<(), TransportClosed> {
            let mut recorded = self.recorded.lock().unwrap();
            if Some(recorded.frames.len()) == self.fail_after {
                return Err(TransportClosed);
            }
            recorded.frames.push(frame);
            Ok(())
        }

        async fn close(&mut self) {
            self.recorded.lock().unwrap().closes += 1;
        }
    }

    #[test]
    fn test_connection_ids_unique() {
        let (a, _rx_a) = ViewerConnection::new(TenantId::new("F1"), 4);
        let (b, _rx_b) = ViewerConnection::new(TenantId::new("F1"), 4);

        assert_ne!(a.id(), b.id());
        assert_eq!(a.tenant(), b.tenant());
    }

    #[test]
    fn test_viewer_id_carries_registration_tenant() {
        let (conn, _rx) = ViewerConnection::new(TenantId::new("F7"), 4);
        let id = conn.id();

        assert_eq!(id.tenant(), conn.tenant());
        assert_eq!(id.to_string(), format!("F7#{}", id.connection()));
    }

    #[test]
    fn test_try_deliver_full_and_closed() {
        let (conn, rx) = ViewerConnection::new(TenantId::new("F1"), 1);

        assert_eq!(conn.try_deliver(Bytes::from_static(b"1")), Ok(()));
        assert_eq!(
            conn.try_deliver(Bytes::from_static(b"2")),
            Err(DeliveryFailure::Full)
        );

        drop(rx);
        assert_eq!(
            conn.try_deliver(Bytes::from_static(b"3")),
            Err(DeliveryFailure::Closed)
        );
    }

    #[tokio::test]
    async fn test_writer_drains_then_closes_once() {
        let (hub, _worker) = FanoutHub::spawn(HubConfig::default());
        let (conn, mailbox) = ViewerConnection::new(TenantId::new("F1"), 8);
        let viewer = conn.id().clone();
        hub.register(conn).await.unwrap();

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let transport = RecordingTransport {
            recorded: Arc::clone(&recorded),
            fail_after: None,
        };
        let writer = spawn_writer(viewer.clone(), mailbox, transport, hub.clone());

        for i in 0..3 {
            let event = Event::alert(TenantId::new("F1"), None, "test", format!("n{i}"));
            hub.broadcast(event).await.unwrap();
        }
        hub.unregister(viewer.clone()).await.unwrap();
        hub.unregister(viewer).await.unwrap();
        tokio_test::assert_ok!(writer.await);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.frames.len(), 3);
        assert_eq!(recorded.closes, 1);
    }

    #[tokio::test]
    async fn test_writer_unregisters_on_transport_failure() {
        let (hub, _worker) = FanoutHub::spawn(HubConfig::default());
        let tenant = TenantId::new("F1");
        let (conn, mailbox) = ViewerConnection::new(tenant.clone(), 8);
        let viewer = conn.id().clone();
        hub.register(conn).await.unwrap();

        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let transport = RecordingTransport {
            recorded: Arc::clone(&recorded),
            fail_after: Some(0),
        };
        let writer = spawn_writer(viewer, mailbox, transport, hub.clone());

        hub.broadcast(Event::alert(tenant.clone(), None, "test", "x"))
            .await
            .unwrap();
        tokio_test::assert_ok!(writer.await);

        assert_eq!(hub.viewer_count(&tenant).await.unwrap(), 0);
        assert_eq!(recorded.lock().unwrap().closes, 1);
    }
}
