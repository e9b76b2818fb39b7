//! Fan-out hub implementation
//!
//! [`FanoutHub`] is a cheap, cloneable handle. All registry state lives in a
//! single [`HubWorker`] task that consumes commands in arrival order.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::config::HubConfig;
use super::connection::{ConnectionId, DeliveryFailure, ViewerConnection, ViewerId};
use super::error::HubError;
use super::event::{Event, TenantId};
use crate::stats::HubStats;

enum Command {
    Register(ViewerConnection),
    Unregister(ViewerId),
    Broadcast(Event),
    ViewerCount(TenantId, oneshot::Sender<usize>),
    Stats(oneshot::Sender<HubStats>),
    Shutdown,
}

/// Handle to the fan-out hub
///
/// Every method enqueues a command for the worker; the worker processes
/// commands strictly in the order they were enqueued, so two broadcasts for
/// the same tenant reach every viewer registered before both in the order
/// they were issued.
#[derive(Clone)]
pub struct FanoutHub {
    commands: mpsc::Sender<Command>,
    config: HubConfig,
}

impl FanoutHub {
    /// Spawn the worker task and return a handle to it
    ///
    /// The worker stops when [`shutdown`](Self::shutdown) is called or when
    /// every handle has been dropped.
    pub fn spawn(config: HubConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.command_queue_capacity.max(1));
        let worker = HubWorker::default();
        let handle = tokio::spawn(worker.run(rx));

        tracing::info!(
            command_queue = config.command_queue_capacity,
            mailbox = config.mailbox_capacity,
            "Fan-out hub started"
        );

        (
            Self {
                commands: tx,
                config,
            },
            handle,
        )
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Add a viewer to its tenant's registry
    ///
    /// Takes the connection by value, so a connection is registered at most
    /// once.
    pub async fn register(&self, connection: ViewerConnection) -> Result<(), HubError> {
        self.send(Command::Register(connection)).await
    }

    /// Remove a viewer and close its mailbox
    ///
    /// Unregistering a viewer that is not (or no longer) registered is a no-op.
    pub async fn unregister(&self, viewer: ViewerId) -> Result<(), HubError> {
        self.send(Command::Unregister(viewer)).await
    }

    /// Deliver an event to every viewer currently registered under its tenant
    ///
    /// Returns once the event is queued for the worker; delivery to viewer
    /// mailboxes never waits on a slow viewer.
    pub async fn broadcast(&self, event: Event) -> Result<(), HubError> {
        self.send(Command::Broadcast(event)).await
    }

    /// Number of viewers registered under `tenant`
    pub async fn viewer_count(&self, tenant: &TenantId) -> Result<usize, HubError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ViewerCount(tenant.clone(), tx)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Snapshot of registry size and counters
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stats(tx)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Close every mailbox and stop the worker
    pub async fn shutdown(&self) -> Result<(), HubError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<(), HubError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::Closed)
    }
}

/// Sole owner of the tenant → viewers registry
#[derive(Default)]
struct HubWorker {
    tenants: HashMap<TenantId, HashMap<ConnectionId, ViewerConnection>>,
    stats: HubStats,
}

impl HubWorker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Register(connection) => self.register(connection),
                Command::Unregister(viewer) => self.unregister(&viewer),
                Command::Broadcast(event) => self.broadcast(&event),
                Command::ViewerCount(tenant, reply) => {
                    let count = self.tenants.get(&tenant).map_or(0, HashMap::len);
                    let _ = reply.send(count);
                }
                Command::Stats(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                Command::Shutdown => break,
            }
        }

        let viewers = self.viewer_total();
        // Dropping the registry closes every remaining mailbox.
        self.tenants.clear();
        tracing::info!(viewers_closed = viewers, "Fan-out hub stopped");
    }

    // A connection is moved into the hub, so each id arrives here once.
    fn register(&mut self, connection: ViewerConnection) {
        let viewer = connection.id().clone();
        let viewers = self.tenants.entry(viewer.tenant().clone()).or_default();
        viewers.insert(viewer.connection(), connection);

        tracing::info!(
            tenant = %viewer.tenant(),
            connection = %viewer.connection(),
            viewers = viewers.len(),
            "Viewer registered"
        );
    }

    fn unregister(&mut self, viewer: &ViewerId) {
        let Some(viewers) = self.tenants.get_mut(viewer.tenant()) else {
            tracing::debug!(viewer = %viewer, "Viewer not registered");
            return;
        };

        if viewers.remove(&viewer.connection()).is_none() {
            tracing::debug!(viewer = %viewer, "Viewer not registered");
            return;
        }
        let remaining = viewers.len();
        if remaining == 0 {
            self.tenants.remove(viewer.tenant());
        }

        tracing::info!(
            tenant = %viewer.tenant(),
            connection = %viewer.connection(),
            viewers = remaining,
            "Viewer unregistered"
        );
    }

    fn broadcast(&mut self, event: &Event) {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, event_type = event.event_type(), "Failed to serialize event");
                return;
            }
        };
        self.stats.broadcasts += 1;

        let tenant = event.tenant();
        let Some(viewers) = self.tenants.get_mut(tenant) else {
            return;
        };

        let mut dropped = Vec::new();
        for (id, viewer) in viewers.iter() {
            match viewer.try_deliver(frame.clone()) {
                Ok(()) => self.stats.frames_delivered += 1,
                Err(DeliveryFailure::Full) => {
                    tracing::warn!(
                        tenant = %tenant,
                        connection = %id,
                        "Viewer mailbox full, evicting slow consumer"
                    );
                    self.stats.evictions += 1;
                    dropped.push(*id);
                }
                Err(DeliveryFailure::Closed) => {
                    tracing::debug!(tenant = %tenant, connection = %id, "Viewer writer gone");
                    dropped.push(*id);
                }
            }
        }

        for id in &dropped {
            viewers.remove(id);
        }
        if viewers.is_empty() {
            self.tenants.remove(tenant);
        }
    }

    fn viewer_total(&self) -> usize {
        self.tenants.values().map(HashMap::len).sum()
    }

    fn snapshot(&self) -> HubStats {
        HubStats {
            tenants: self.tenants.len(),
            viewers: self.viewer_total(),
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::Value;

    use super::*;
    use crate::hub::EntityId;

    fn alert(tenant: &str, message: &str) -> Event {
        Event::alert(TenantId::new(tenant), None, "test", message)
    }

    fn message_of(frame: &Bytes) -> String {
        let value: Value = serde_json::from_slice(frame).unwrap();
        value["payload"]["message"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_register_and_broadcast() {
        let (hub, _worker) = FanoutHub::spawn(HubConfig::default());
        let (conn, mut rx) = ViewerConnection::new(TenantId::new("F1"), 8);

        hub.register(conn).await.unwrap();
        hub.broadcast(alert("F1", "hello")).await.unwrap();

        let frame = rx.recv().await.unwrap();
        assert_eq!(message_of(&frame), "hello");

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.tenants, 1);
        assert_eq!(stats.viewers, 1);
        assert_eq!(stats.broadcasts, 1);
        assert_eq!(stats.frames_delivered, 1);
    }

    #[tokio::test]
    async fn test_each_connection_registered_once() {
        let (hub, _worker) = FanoutHub::spawn(HubConfig::default());
        let tenant = TenantId::new("F1");
        let (a, mut rx_a) = ViewerConnection::new(tenant.clone(), 8);
        let (b, mut rx_b) = ViewerConnection::new(tenant.clone(), 8);

        hub.register(a).await.unwrap();
        hub.register(b).await.unwrap();
        hub.broadcast(alert("F1", "once")).await.unwrap();

        assert_eq!(hub.viewer_count(&tenant).await.unwrap(), 2);
        assert_eq!(message_of(&rx_a.recv().await.unwrap()), "once");
        assert_eq!(message_of(&rx_b.recv().await.unwrap()), "once");
        assert!(rx_a.try_recv().is_err());
        assert_eq!(hub.stats().await.unwrap().frames_delivered, 2);
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let (hub, _worker) = FanoutHub::spawn(HubConfig::default());
        let (f1, mut rx1) = ViewerConnection::new(TenantId::new("F1"), 8);
        let (f2, mut rx2) = ViewerConnection::new(TenantId::new("F2"), 8);
        hub.register(f1).await.unwrap();
        hub.register(f2).await.unwrap();

        hub.broadcast(alert("F1", "only-f1")).await.unwrap();
        // Stats round-trip guarantees the broadcast was processed
        hub.stats().await.unwrap();

        assert_eq!(message_of(&rx1.try_recv().unwrap()), "only-f1");
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_order_per_tenant() {
        let (hub, _worker) = FanoutHub::spawn(HubConfig::default());
        let (conn, mut rx) = ViewerConnection::new(TenantId::new("F1"), 64);
        hub.register(conn).await.unwrap();

        for i in 0..20 {
            hub.broadcast(alert("F1", &format!("e{i}"))).await.unwrap();
        }

        for i in 0..20 {
            assert_eq!(message_of(&rx.recv().await.unwrap()), format!("e{i}"));
        }
    }

    #[tokio::test]
    async fn test_unregister_idempotent() {
        let (hub, _worker) = FanoutHub::spawn(HubConfig::default());
        let tenant = TenantId::new("F1");
        let (conn, mut rx) = ViewerConnection::new(tenant.clone(), 8);
        let viewer = conn.id().clone();
        hub.register(conn).await.unwrap();

        hub.unregister(viewer.clone()).await.unwrap();
        hub.unregister(viewer).await.unwrap();

        assert_eq!(hub.viewer_count(&tenant).await.unwrap(), 0);
        // Mailbox closed exactly once: receiver observes end of stream
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_slow_consumer_evicted() {
        let (hub, _worker) = FanoutHub::spawn(HubConfig::default());
        let tenant = TenantId::new("F1");
        let (slow, mut slow_rx) = ViewerConnection::new(tenant.clone(), 1);
        let (healthy, mut healthy_rx) = ViewerConnection::new(tenant.clone(), 16);
        hub.register(slow).await.unwrap();
        hub.register(healthy).await.unwrap();

        for i in 0..5 {
            hub.broadcast(alert("F1", &format!("e{i}"))).await.unwrap();
        }

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.viewers, 1);

        // Slow viewer got what fit, then its mailbox was closed
        assert_eq!(message_of(&slow_rx.recv().await.unwrap()), "e0");
        assert!(slow_rx.recv().await.is_none());

        for i in 0..5 {
            assert_eq!(message_of(&healthy_rx.recv().await.unwrap()), format!("e{i}"));
        }
    }

    #[tokio::test]
    async fn test_dropped_mailbox_pruned() {
        let (hub, _worker) = FanoutHub::spawn(HubConfig::default());
        let tenant = TenantId::new("F1");
        let (conn, rx) = ViewerConnection::new(tenant.clone(), 8);
        hub.register(conn).await.unwrap();
        drop(rx);

        hub.broadcast(alert("F1", "gone")).await.unwrap();

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.viewers, 0);
        assert_eq!(stats.tenants, 0);
        assert_eq!(stats.evictions, 0);
    }

    #[tokio::test]
    async fn test_position_update_routed_with_entity() {
        use crate::hub::PositionPayload;

        let (hub, _worker) = FanoutHub::spawn(HubConfig::default());
        let (conn, mut rx) = ViewerConnection::new(TenantId::new("F1"), 8);
        hub.register(conn).await.unwrap();

        let payload = PositionPayload {
            animal_id: EntityId::new("A1"),
            lat: -20.0,
            lng: -54.0,
            speed_kmh: 3.5,
            battery: 87,
            timestamp: chrono::Utc::now(),
        };
        hub.broadcast(Event::position_update(TenantId::new("F1"), payload))
            .await
            .unwrap();

        let value: Value = serde_json::from_slice(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(value["type"], "position-update");
        assert_eq!(value["animal_id"], "A1");
    }

    #[tokio::test]
    async fn test_shutdown_closes_mailboxes() {
        let (hub, worker) = FanoutHub::spawn(HubConfig::default());
        let (conn, mut rx) = ViewerConnection::new(TenantId::new("F1"), 8);
        hub.register(conn).await.unwrap();

        hub.shutdown().await.unwrap();
        tokio_test::assert_ok!(worker.await);

        assert!(rx.recv().await.is_none());
        assert_eq!(
            hub.broadcast(alert("F1", "late")).await,
            Err(HubError::Closed)
        );
        assert_eq!(hub.stats().await, Err(HubError::Closed));
    }
}
