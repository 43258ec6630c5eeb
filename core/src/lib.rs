//! Optimistic client-side cache for the items API.
//!
//! # Overview
//! `ListSynchronizer` keeps an in-memory list of items in step with a remote
//! REST store. Mutations show up in the cache at once and are confirmed or
//! reverted when the server answers. UIs render `ListState` snapshots,
//! either by polling `state()` or through `subscribe()`.
//!
//! # Design
//! - `ItemClient` is stateless: `build_*` produces an `HttpRequest`,
//!   `parse_*` consumes an `HttpResponse`, so the I/O boundary is explicit.
//! - `Transport` performs the round-trip. `UreqTransport` speaks HTTP,
//!   `RetryTransport` adds a fixed retry budget on top.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod sync;
pub mod transport;
pub mod types;

pub use client::ItemClient;
pub use config::SyncConfig;
pub use error::{ApiError, ConfigError, SyncError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use sync::{ListState, ListSynchronizer, Outcome, PendingKind};
pub use transport::{RetryTransport, Transport, TransportError, UreqTransport};
pub use types::{CreateItem, Item, ItemKey, ListItem, UpdateItem};
