// SPDX-License-Identifier: GPL-3.0-only
pub mod error;
pub mod retry;
pub mod traits;

pub use error::{NetworkError, NetworkErrorKind, RequestError};
pub use retry::{RequestExecutor, RetryPolicy};
pub use traits::ReachabilityObserver;
