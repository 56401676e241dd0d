// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! STOMP 1.2 over WebSocket transport for Murmur.
//!
//! [`StompTransport`] implements [`murmur_core::Transport`]: it dials the
//! chat server's WebSocket endpoint, performs the STOMP handshake with the
//! caller's connect headers, keeps the link alive with negotiated
//! heartbeats, and redials on a fixed delay until deactivated.

pub mod codec;
pub mod error;
pub mod transport;

pub use codec::{Command, Decoded, Frame, Heartbeat};
pub use error::StompError;
pub use transport::StompTransport;
