// SPDX-License-Identifier: GPL-3.0-only
pub mod machine;
pub mod monitor;

pub use machine::{ConnectivityEffect, ConnectivityEvent, ConnectivityMachine, ConnectivityMode, Transition};
pub use monitor::Connectivity;
