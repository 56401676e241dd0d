// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits consumed by the sync core.
//!
//! The core only ever talks to the network through these seams, which use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod credentials;
pub mod history;
pub mod mutation;
pub mod transport;

pub use credentials::{CredentialProvider, StaticCredentials};
pub use history::HistoryApi;
pub use mutation::MutationApi;
pub use transport::{ConnectOptions, SubscriptionHandle, Transport, TransportEvent};
