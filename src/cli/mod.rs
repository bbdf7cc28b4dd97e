// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::config::{ChatConfig, IndexKind};
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

/// Ask questions about the text files in a local folder
///
/// Every flag is optional; without flags the program reads `docs/*.txt`
/// and uses the TinyLlama chat model stored under `models/`. Environment
/// variables are read by `ChatConfig::from_env`, flags win over them.
#[derive(Parser, Debug, Default)]
#[command(name = "local-rag-chat")]
#[command(version = crate::version::VERSION)]
#[command(about = "Local retrieval-augmented chat over a folder of text files", long_about = None)]
pub struct Cli {
    /// Folder with the .txt documents
    #[arg(long)]
    pub docs_dir: Option<PathBuf>,

    /// Folder where the GGUF model is stored
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Hugging Face repository the model is downloaded from
    #[arg(long)]
    pub model_repo: Option<String>,

    /// GGUF file name inside the repository
    #[arg(long)]
    pub model_file: Option<String>,

    /// Number of chunks passed to the model per question
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Similarity index used for retrieval
    #[arg(long, value_parser = IndexKind::from_str)]
    pub index: Option<IndexKind>,

    /// Show pipeline logs on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply the flags that were given on top of `config`
    pub fn apply(&self, mut config: ChatConfig) -> ChatConfig {
        if let Some(dir) = &self.docs_dir {
            config.docs_dir = dir.clone();
        }
        if let Some(dir) = &self.models_dir {
            config.models_dir = dir.clone();
        }
        if let Some(repo) = &self.model_repo {
            config.model_repo = repo.clone();
        }
        if let Some(file) = &self.model_file {
            config.model_file = file.clone();
        }
        if let Some(k) = self.top_k {
            config.top_k = k;
        }
        if let Some(kind) = self.index {
            config.index_kind = kind;
        }
        config
    }

    /// Config built from the environment with the flags layered on top
    pub fn into_config(self) -> ChatConfig {
        self.apply(ChatConfig::from_env())
    }
}
