// SPDX-License-Identifier: GPL-3.0-only
pub mod http;
pub mod traits;

pub use http::ReqwestTransport;
pub use traits::{HttpRequest, HttpResponse, Method, Transport, TransportError};
