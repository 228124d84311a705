// SPDX-License-Identifier: GPL-3.0-only
pub mod notice;
pub mod service;

pub use notice::{CartNotice, CartOperation, SyncOutcome};
pub use service::{CartEngine, EngineSettings};
