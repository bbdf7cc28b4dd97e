// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the local RAG chat

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Full version string with feature description
pub const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"), "-local-rag");

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "txt-loader",
    "character-splitter",
    "minilm-embeddings",
    "flat-index",
    "hnsw-index",
    "gguf-download",
    "llama-cpp-inference",
    "stuff-chain",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Local RAG Chat {} ({})", VERSION, FEATURES.join(", "))
}
