// SPDX-License-Identifier: GPL-3.0-only

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Timeout,
    Aborted,
    ServerError(u16),
    Transport(String),
}

impl std::fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkErrorKind::Timeout => f.write_str("timed out"),
            NetworkErrorKind::Aborted => f.write_str("aborted"),
            NetworkErrorKind::ServerError(status) => write!(f, "server error {}", status),
            NetworkErrorKind::Transport(message) => write!(f, "transport error: {}", message),
        }
    }
}

/// The remote could not be reached after the retry budget was spent
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Request {kind} after {attempts} attempt(s)")]
pub struct NetworkError {
    pub kind: NetworkErrorKind,
    pub attempts: u32,
}

impl NetworkError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind, NetworkErrorKind::Aborted)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// 4xx answer; returned on the first attempt, never retried
    #[error("Request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}
