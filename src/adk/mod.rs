// SPDX-License-Identifier: MIT

//! Agent primitives: agents, their function registries, the language model
//! seam, the per-run execution context and the error taxonomy.

pub mod agent;
pub mod context;
pub mod error;
pub mod function;
pub mod model;
