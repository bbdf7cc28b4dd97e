// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Retrieval QA chain ("stuff" strategy)
//!
//! Retrieve the top-k chunks for a question, concatenate all of them into
//! the `context` slot of the prompt, and hand the rendered prompt to the
//! generator in a single call.

use crate::inference::{GenerationParams, TextGenerator};
use crate::rag::PromptTemplate;
use crate::vector::{Retriever, ScoredChunk};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Separator placed between retrieved chunks in the prompt context
pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Serialize)]
pub struct QaAnswer {
    pub text: String,
    /// Files the retrieved chunks came from, best match first
    pub sources: Vec<PathBuf>,
}

pub struct RetrievalQa {
    retriever: Retriever,
    generator: Arc<dyn TextGenerator>,
    prompt: PromptTemplate,
    params: GenerationParams,
}

/// Join chunk texts into the prompt's context block
pub fn stuff_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

impl RetrievalQa {
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn TextGenerator>,
        prompt: PromptTemplate,
        params: GenerationParams,
    ) -> Self {
        Self {
            retriever,
            generator,
            prompt,
            params,
        }
    }

    pub async fn answer(&self, question: &str) -> Result<QaAnswer> {
        let started = Instant::now();

        let hits = self.retriever.retrieve(question).await?;
        let context = stuff_context(&hits);
        let prompt = self
            .prompt
            .render_qa(&context, question)
            .context("Failed to render prompt")?;

        let text = self
            .generator
            .generate(&prompt, &self.params)
            .await
            .context("Text generation failed")?;

        let mut sources: Vec<PathBuf> = Vec::with_capacity(hits.len());
        for hit in &hits {
            if !sources.contains(&hit.chunk.source) {
                sources.push(hit.chunk.source.clone());
            }
        }

        info!(
            chunks = hits.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Answered question"
        );

        Ok(QaAnswer {
            text: text.trim().to_string(),
            sources,
        })
    }
}
