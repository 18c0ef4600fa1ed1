//! Test helpers for wiring the bursar core in memory.

#![warn(clippy::all)]

mod helpers;

pub use helpers::{assert_conservation, funded_account, Harness};
