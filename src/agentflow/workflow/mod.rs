// SPDX-License-Identifier: MIT

pub mod agent_factory;
pub mod compiler;
pub mod condition;
pub mod config;
pub mod graph;
pub mod loader;
pub mod state;
pub mod types;
