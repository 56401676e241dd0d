// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime synchronization core for the Murmur chat client.
//!
//! Reconciles a persistent pub/sub connection, paginated history fetches,
//! and live push events into the canonical [`MessageCache`]:
//!
//! - [`ConnectionManager`] owns the transport activation and its state
//! - [`SubscriptionRegistry`] keeps desired and active topic subscriptions
//!   converged across reconnects
//! - [`PaginationCoordinator`] loads history pages through a configurable
//!   [`CursorStrategy`]
//! - [`SendPipeline`] publishes outbound messages
//! - [`SyncClient`] wires everything together and runs the inbound loop
//!
//! [`MessageCache`]: murmur_cache::MessageCache

pub mod actions;
pub mod client;
pub mod connection;
pub mod frame;
pub mod pagination;
pub mod registry;
pub mod send;

pub use actions::MessageActions;
pub use client::{SyncClient, SyncClientBuilder, SyncSettings};
pub use connection::{ConnectionManager, ConnectionSettings, ConnectionState};
pub use frame::{FrameError, InboundEvent};
pub use pagination::{
    BeforeIdStrategy, CursorStrategy, PageNumberStrategy, PageOutcome, PaginationCoordinator,
};
pub use registry::{ResubscribeReport, SubscriptionRegistry, TopicScheme};
pub use send::{SendPipeline, SendReceipt};
