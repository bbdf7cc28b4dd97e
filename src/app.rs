// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end pipeline: documents, chunks, index, model, chat loop

use crate::chat::{ChatLoop, ChatSummary};
use crate::config::ChatConfig;
use crate::documents::load_documents;
use crate::embeddings::{Embedder, EmbeddingModelFiles, OnnxEmbeddingModel};
use crate::inference::{EngineConfig, GenerationParams, LlmEngine};
use crate::models::{ensure_model, DownloadConfig, ModelDownloader, ModelSource};
use crate::rag::{CharacterTextSplitter, Chunk, PromptTemplate, RetrievalQa};
use crate::vector::{Retriever, VectorStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The chat loop ran and the user left it
    Completed(ChatSummary),
    /// Nothing to index; the program stops before loading any model
    NoDocuments,
    /// The model was missing and could not be fetched
    DownloadFailed,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed(_) | RunOutcome::NoDocuments => 0,
            RunOutcome::DownloadFailed => 1,
        }
    }
}

/// Load and split every document under `config.docs_dir`
///
/// Prints the file, document and chunk counts as it goes.
pub async fn load_chunks(config: &ChatConfig) -> Result<Vec<Chunk>> {
    let documents = load_documents(&config.docs_dir)
        .await
        .with_context(|| format!("Failed to load documents from {}", config.docs_dir.display()))?;

    // One document per file
    println!("📄 Total de arquivos carregados: {}", documents.len());
    println!("📚 Total de documentos: {}", documents.len());

    let splitter = CharacterTextSplitter::new(config.chunk_size, config.chunk_overlap)?;
    let chunks = splitter.split_documents(&documents);
    println!("🧩 Total de chunks: {}", chunks.len());

    Ok(chunks)
}

fn report_empty(config: &ChatConfig) {
    println!(
        "⚠️ Nenhum texto encontrado. Verifique a pasta '{}'",
        config.docs_dir.display()
    );
}

/// Chunks and indexes the documents; `None` when there is nothing to index
pub async fn build_store(
    config: &ChatConfig,
    embedder: &dyn Embedder,
) -> Result<Option<VectorStore>> {
    let chunks = load_chunks(config).await?;
    if chunks.is_empty() {
        report_empty(config);
        return Ok(None);
    }

    let store = VectorStore::from_chunks(chunks, embedder, config.index_kind).await?;
    Ok(Some(store))
}

pub fn generation_params(config: &ChatConfig) -> GenerationParams {
    GenerationParams {
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: config.sampling_top_k,
        repeat_penalty: config.repeat_penalty,
        ..Default::default()
    }
}

/// Run the whole program against stdin/stdout
pub async fn run(config: ChatConfig) -> Result<RunOutcome> {
    config.validate()?;
    info!("Starting with {:?}", config);

    let chunks = load_chunks(&config).await?;
    if chunks.is_empty() {
        report_empty(&config);
        return Ok(RunOutcome::NoDocuments);
    }

    let files = EmbeddingModelFiles::fetch(&config.embedding_repo).await?;
    let embedder: Arc<dyn Embedder> = Arc::new(OnnxEmbeddingModel::from_files(&files).await?);
    let store = Arc::new(
        VectorStore::from_chunks(chunks, embedder.as_ref(), config.index_kind).await?,
    );

    let model_path = config.model_path();
    let source = ModelSource::hugging_face(config.model_repo.clone(), config.model_file.clone());
    let downloader = ModelDownloader::new(DownloadConfig::default())?;
    if let Err(e) = ensure_model(
        &model_path,
        &source,
        &downloader,
        config.model_sha256.as_deref(),
    )
    .await
    {
        error!("Model download failed: {}", e);
        println!("Erro no download do modelo: {}", e);
        return Ok(RunOutcome::DownloadFailed);
    }

    let engine_config = EngineConfig {
        model_path,
        context_size: config.context_size,
        gpu_layers: config.gpu_layers,
        ..Default::default()
    };
    let engine = tokio::task::spawn_blocking(move || LlmEngine::load(engine_config))
        .await
        .context("Model loading task panicked")??;

    let chain = RetrievalQa::new(
        Retriever::new(store, embedder, config.top_k),
        Arc::new(engine),
        PromptTemplate::default_qa()?,
        generation_params(&config),
    );

    let chat = ChatLoop::new(Arc::new(chain));
    let summary = chat
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    info!(
        "Session ended ({:?}): {} answered, {} failed",
        summary.exit, summary.answered, summary.failed
    );

    Ok(RunOutcome::Completed(summary))
}
