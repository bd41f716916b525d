//! Watch engine: ordered fan-out of injected resource events
//!
//! Producers emit typed resource changes; every watcher registered for that
//! resource kind receives them in emission order through its own bounded
//! queue, at its own pace.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  Producer    │ emit(kind, type, object)
//! └──────┬───────┘
//!        │ KindHandler::admit()       (payload type check)
//!        ▼
//! ┌──────────────────┐
//! │  Broadcaster     │ per-kind emit lock, assigns order key
//! └──────┬───────────┘
//!        │ snapshot of the kind's bucket (DashMap → Mutex<HashMap>)
//!        ▼
//! ┌──────────────────┐
//! │ Per-Watcher      │ tokio mpsc, bounded (default 100),
//! │ Queues           │ one concurrent enqueue per watcher
//! └──────┬───────────┘
//!        ▼
//! ┌──────────────────┐
//! │ WatcherHandle    │ next() / stop() / into_stream()
//! └──────────────────┘
//!
//! TimeoutSupervisor ── periodic scan ──► deregister idle watchers
//! ```
//!
//! # Delivery contract
//!
//! - Events of one kind reach every watcher in the order they were emitted.
//! - No events are replayed: a watcher sees only events emitted after it was
//!   registered.
//! - Queues are bounded-blocking. A full queue holds up the next emit of that
//!   kind until the consumer reads, stops, expires or drops its handle; it
//!   never delays the other watchers' copy of the current event.
//! - Deregistration (stop, expiry, shutdown, drop) drains instead of
//!   discarding: events already queued are still returned by `next()`.
//!
//! Kinds are independent: nothing orders events across kinds, and no lock is
//! shared between them.

mod broadcaster;
mod event;
mod handler;
mod registry;
mod selector;
mod supervisor;
mod watcher;


pub use broadcaster::Broadcaster;
pub use event::EventType;
pub use event::WatchEvent;
pub use handler::builtin_handlers;
pub use handler::KindHandler;
pub use handler::TypedHandler;
pub use registry::WatchRegistry;
pub use selector::FieldSelector;
pub use selector::LabelSelector;
pub use selector::WatchOptions;
pub use supervisor::TimeoutSupervisor;
pub use watcher::CloseReason;
pub use watcher::WatcherHandle;
pub use watcher::WatcherState;
