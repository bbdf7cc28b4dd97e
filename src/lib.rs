// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod app;
pub mod chat;
pub mod cli;
pub mod config;
pub mod documents;
pub mod embeddings;
pub mod inference;
pub mod models;
pub mod rag;
pub mod vector;
pub mod version;

// Re-export main types for convenience
pub use app::{run, RunOutcome};
pub use chat::{is_exit_command, ChatLoop};
pub use config::{ChatConfig, IndexKind};
pub use documents::{load_documents, Document};
pub use embeddings::{Embedder, OnnxEmbeddingModel};
pub use inference::{GenerationParams, LlmEngine, TextGenerator};
pub use models::{ensure_model, EnsureOutcome, ModelDownloader, ModelSource};
pub use rag::{CharacterTextSplitter, Chunk, PromptTemplate, QaAnswer, RetrievalQa};
pub use vector::{Retriever, ScoredChunk, VectorStore};
