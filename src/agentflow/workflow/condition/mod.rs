// SPDX-License-Identifier: MIT

//! Condition expressions for definition-declared conditional edges
//!
//! Conditions are simple boolean expressions over graph state:
//! - `intent == 'search'`
//! - `confidence > 0.8`
//! - `not (intent == 'bug' and priority > 3)`

mod ast;
mod evaluator;
mod parser;

pub use ast::{CompareOp, Expression, Literal};
pub use evaluator::evaluate;
pub use parser::{parse, ParseError};
