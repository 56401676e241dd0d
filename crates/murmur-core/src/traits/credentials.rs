// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source of the current access credential.

use std::sync::RwLock;

/// Supplies the bearer token used for the transport handshake and REST calls.
///
/// Returning `None` means "not signed in"; callers treat it as an unmet
/// precondition rather than an error.
pub trait CredentialProvider: Send + Sync + 'static {
    fn access_token(&self) -> Option<String>;
}

/// A credential held in memory that can be rotated at runtime.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.filter(|t| !t.is_empty())),
        }
    }

    /// Replace the stored token. Takes effect on the next connect.
    pub fn set(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token.filter(|t| !t.is_empty());
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn access_token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }
}
