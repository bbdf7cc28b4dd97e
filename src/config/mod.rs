// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Runtime configuration for the chat pipeline
//!
//! Every field defaults to the values the pipeline was tuned with
//! (300/50 character chunks, top-3 retrieval, TinyLlama Q4_K_M with a
//! 1024 token context). Each one can be overridden through an
//! environment variable or a `.env` file.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_DOCS_DIR: &str = "docs/";
pub const DEFAULT_MODELS_DIR: &str = "models";
pub const DEFAULT_MODEL_REPO: &str = "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF";
pub const DEFAULT_MODEL_FILE: &str = "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf";
pub const DEFAULT_EMBEDDING_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Which similarity index backs the vector store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Exact search by L2 distance
    Flat,
    /// Approximate search with cosine distance
    Hnsw,
}

impl FromStr for IndexKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" | "exact" => Ok(Self::Flat),
            "hnsw" => Ok(Self::Hnsw),
            other => Err(ConfigError::UnknownIndex(other.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Unknown index kind: {0} (expected 'flat' or 'hnsw')")]
    UnknownIndex(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub docs_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedding_repo: String,
    pub index_kind: IndexKind,
    pub top_k: usize,
    pub models_dir: PathBuf,
    pub model_repo: String,
    pub model_file: String,
    /// Hex SHA-256 of the model file, checked after download when set
    pub model_sha256: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub top_p: f32,
    /// Candidates kept by top-k sampling; 0 keeps all
    pub sampling_top_k: i32,
    pub repeat_penalty: f32,
    pub context_size: usize,
    pub gpu_layers: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from(DEFAULT_DOCS_DIR),
            chunk_size: 300,
            chunk_overlap: 50,
            embedding_repo: DEFAULT_EMBEDDING_REPO.to_string(),
            index_kind: IndexKind::Flat,
            top_k: 3,
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            model_repo: DEFAULT_MODEL_REPO.to_string(),
            model_file: DEFAULT_MODEL_FILE.to_string(),
            model_sha256: None,
            temperature: 0.7,
            max_tokens: 200,
            top_p: 0.95,
            sampling_top_k: 40,
            repeat_penalty: 1.1,
            context_size: 1024,
            gpu_layers: 0,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ChatConfig {
    /// Load configuration from environment variables
    ///
    /// A `.env` file in the working directory is read first. Values that
    /// fail to parse keep their default.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        Self {
            docs_dir: env::var("RAG_DOCS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.docs_dir),
            chunk_size: env_parse("RAG_CHUNK_SIZE", defaults.chunk_size),
            chunk_overlap: env_parse("RAG_CHUNK_OVERLAP", defaults.chunk_overlap),
            embedding_repo: env::var("RAG_EMBEDDING_REPO").unwrap_or(defaults.embedding_repo),
            index_kind: env_parse("RAG_INDEX", defaults.index_kind),
            top_k: env_parse("RAG_TOP_K", defaults.top_k),
            models_dir: env::var("RAG_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),
            model_repo: env::var("RAG_MODEL_REPO").unwrap_or(defaults.model_repo),
            model_file: env::var("RAG_MODEL_FILE").unwrap_or(defaults.model_file),
            model_sha256: env::var("RAG_MODEL_SHA256")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            temperature: env_parse("RAG_TEMPERATURE", defaults.temperature),
            max_tokens: env_parse("RAG_MAX_TOKENS", defaults.max_tokens),
            top_p: env_parse("RAG_TOP_P", defaults.top_p),
            sampling_top_k: env_parse("RAG_SAMPLING_TOP_K", defaults.sampling_top_k),
            repeat_penalty: env_parse("RAG_REPEAT_PENALTY", defaults.repeat_penalty),
            context_size: env_parse("RAG_CONTEXT_SIZE", defaults.context_size),
            gpu_layers: env_parse("GPU_LAYERS", defaults.gpu_layers),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".into()));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be at least 1".into()));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "top_p must be in (0, 1], got {}",
                self.top_p
            )));
        }
        if !(self.temperature >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be >= 0, got {}",
                self.temperature
            )));
        }
        if self.sampling_top_k < 0 {
            return Err(ConfigError::Invalid(format!(
                "sampling_top_k must be >= 0, got {}",
                self.sampling_top_k
            )));
        }
        if !(self.repeat_penalty > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "repeat_penalty must be > 0, got {}",
                self.repeat_penalty
            )));
        }
        if self.context_size <= self.max_tokens {
            return Err(ConfigError::Invalid(format!(
                "context_size ({}) must exceed max_tokens ({})",
                self.context_size, self.max_tokens
            )));
        }
        if self.model_file.trim().is_empty() {
            return Err(ConfigError::Invalid("model_file must not be empty".into()));
        }
        Ok(())
    }

    /// Where the GGUF model is expected on disk
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(&self.model_file)
    }
}
