// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the retrieval QA pipeline
//!
//! - Splitter construction errors (invalid sizes)
//! - Prompt template errors (malformed template, missing variables)

use thiserror::Error;

/// Errors raised when building a text splitter
#[derive(Error, Debug, PartialEq)]
pub enum ChunkerError {
    #[error("Chunk size must be greater than 0")]
    ZeroChunkSize,

    #[error("Chunk overlap ({overlap}) is larger than chunk size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },
}

/// Errors raised by prompt templates
#[derive(Error, Debug, PartialEq)]
pub enum PromptError {
    /// A `{` without a matching `}` (or a stray `}`)
    #[error("Unbalanced brace at byte {position} of the template")]
    UnbalancedBrace { position: usize },

    /// `{}` or a placeholder that is not a plain identifier
    #[error("Invalid placeholder '{{{0}}}' in template")]
    InvalidPlaceholder(String),

    /// The template uses a variable the caller did not provide
    #[error("Missing value for template variable '{0}'")]
    MissingVariable(String),

    /// The template does not use a variable the chain needs to fill in
    #[error("Template does not reference required variable '{0}'")]
    UnusedVariable(String),
}
