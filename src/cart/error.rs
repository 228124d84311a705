// SPDX-License-Identifier: GPL-3.0-only

/// Errors surfaced to callers of the cart engine.
///
/// Network failures are deliberately absent: they degrade to local-only
/// behavior and a [`crate::engine::CartNotice`] instead of an error.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CartError {
    #[error("Invalid cart input: {0}")]
    Validation(String),

    #[error("Remote cart rejected the request: status={status} message={message}")]
    RemoteRejected { status: u16, message: String },
}

impl CartError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
