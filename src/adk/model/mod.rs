// SPDX-License-Identifier: MIT

//! Model module - the language model service seam
//!
//! Agents never talk to a provider directly. Prompt-completion requests go
//! through [`LanguageModel`], which the run's execution context carries.
//! Provider implementations live in their own submodules:
//! - [openai] - OpenAI chat completions API

pub mod openai;

use crate::adk::error::ServiceError;
use async_trait::async_trait;

/// Prompt-in, text-out completion service
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt` with the given model identifier.
    ///
    /// A non-success upstream answer is an error; implementations must not
    /// turn it into an empty string.
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: Option<u32>,
    ) -> Result<String, ServiceError>;
}
