// SPDX-License-Identifier: MIT

//! State management for workflow runs
//!
//! This module provides:
//! - `GraphState` - the mutable key/value record threaded through a run
//! - `StateSnapshot` - an immutable copy of it for auditing and observers

mod store;

pub use store::{GraphState, StateSnapshot, FINAL_OUTPUT};
