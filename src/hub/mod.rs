//! Per-farm fan-out hub for live viewers
//!
//! The hub owns the registry of viewer connections, grouped by tenant, and
//! delivers every published event to the viewers of that event's tenant.
//!
//! # Architecture
//!
//! ```text
//!     FanoutHub (cloneable handle)
//!         │  register / unregister / broadcast / stats
//!         ▼
//!   ┌──────────────────────────┐
//!   │ mpsc::Sender<Command>    │  bounded, FIFO
//!   └────────────┬─────────────┘
//!                ▼
//!   ┌──────────────────────────────────┐
//!   │ HubWorker (single task)          │
//!   │ tenants: HashMap<TenantId,       │
//!   │   HashMap<ConnectionId, Viewer>> │
//!   └───────┬──────────────┬───────────┘
//!           │ try_send     │ try_send
//!           ▼              ▼
//!      [mailbox]       [mailbox]      bounded per viewer
//!           │              │
//!      spawn_writer()  spawn_writer()
//!           │              │
//!           ▼              ▼
//!      transport       transport
//! ```
//!
//! Only the worker task touches the registry, so register, unregister and
//! broadcast are totally ordered by arrival on the command queue. Broadcast
//! never waits on a viewer: a full mailbox evicts that viewer instead.
//!
//! # Zero-Copy Design
//!
//! An event is serialized once per broadcast into `bytes::Bytes`; every
//! mailbox receives a reference-counted clone of the same allocation.

pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod registry;

pub use config::HubConfig;
pub use connection::{spawn_writer, ConnectionId, Mailbox, ViewerConnection, ViewerId, ViewerTransport};
pub use error::{HubError, TransportClosed};
pub use event::{AlertPayload, EntityId, Event, PositionPayload, TenantId};
pub use registry::FanoutHub;
