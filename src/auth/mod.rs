// SPDX-License-Identifier: GPL-3.0-only
pub mod handle;
pub mod traits;

pub use handle::AuthHandle;
pub use traits::AuthProvider;
