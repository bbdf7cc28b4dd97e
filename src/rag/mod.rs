// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// RAG (Retrieval-Augmented Generation) module
// Chunking, prompt templating and the retrieval QA chain

pub mod chain;
pub mod chunker;
pub mod errors;
pub mod prompt;

pub use chain::{QaAnswer, RetrievalQa};
pub use chunker::{CharacterTextSplitter, Chunk};
pub use errors::{ChunkerError, PromptError};
pub use prompt::{PromptTemplate, DEFAULT_QA_TEMPLATE};
