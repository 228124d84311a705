// SPDX-License-Identifier: GPL-3.0-only
pub mod backend;
pub mod debounce;
pub mod traits;

pub use backend::HttpCartGateway;
pub use debounce::DebouncedTrigger;
pub use traits::{GatewayError, RemoteCartGateway};
