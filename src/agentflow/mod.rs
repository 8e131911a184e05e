// SPDX-License-Identifier: MIT

//! Workflow engine: definitions, graph construction and execution

pub mod workflow;
