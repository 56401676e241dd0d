// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Murmur integration tests.
//!
//! Provides scriptable mocks of every capability the sync core consumes and
//! a harness that assembles a [`SyncClient`](murmur_sync::SyncClient)
//! around them, so tests run without a broker or an HTTP server.
//!
//! # Components
//!
//! - [`MockTransport`] - Pub/sub transport with failure injection and frame injection
//! - [`MockHistoryApi`] - History endpoint backed by an in-memory message list
//! - [`MockMutationApi`] - Edit/delete/reaction endpoints with call capture
//! - [`SyncHarness`] - A started client wired to the three mocks

pub mod harness;
pub mod mock_history;
pub mod mock_mutation;
pub mod mock_transport;

pub use harness::{SyncHarness, SyncHarnessBuilder};
pub use mock_history::MockHistoryApi;
pub use mock_mutation::{MockMutationApi, MutationCall};
pub use mock_transport::MockTransport;
