// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST side of the Murmur sync client.
//!
//! [`RestClient`] implements both [`murmur_core::HistoryApi`] and
//! [`murmur_core::MutationApi`] against the chat server, attaching the
//! current bearer token to every request.

pub mod client;

pub use client::RestClient;
