// SPDX-License-Identifier: GPL-3.0-only
pub mod setup;

pub use setup::setup_logging;
