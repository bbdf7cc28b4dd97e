// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::rag::RetrievalQa;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Words that end the session, compared case-insensitively
pub const EXIT_COMMANDS: [&str; 3] = ["sair", "exit", "quit"];

const QUESTION_PROMPT: &str = "\nPergunta: ";

pub fn is_exit_command(line: &str) -> bool {
    let normalized = line.trim().to_lowercase();
    EXIT_COMMANDS.contains(&normalized.as_str())
}

/// Turns one question into one answer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String>;
}

#[async_trait]
impl QuestionAnswerer for RetrievalQa {
    async fn ask(&self, question: &str) -> Result<String> {
        let answer = self.answer(question).await?;
        debug!(
            sources = %serde_json::to_string(&answer.sources).unwrap_or_default(),
            "Answer sources"
        );
        Ok(answer.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    /// The user typed an exit keyword
    Command,
    /// Input ended
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSummary {
    pub answered: usize,
    pub failed: usize,
    pub exit: ExitReason,
}

pub struct ChatLoop {
    answerer: Arc<dyn QuestionAnswerer>,
}

impl ChatLoop {
    pub fn new(answerer: Arc<dyn QuestionAnswerer>) -> Self {
        Self { answerer }
    }

    /// Read questions from `reader` until an exit keyword or end of input
    ///
    /// A question that fails is reported on `writer` and the loop goes on.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<ChatSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut answered = 0;
        let mut failed = 0;

        let exit = loop {
            writer
                .write_all(QUESTION_PROMPT.as_bytes())
                .await
                .context("Failed to write prompt")?;
            writer.flush().await?;

            let line = match lines.next_line().await.context("Failed to read question")? {
                Some(line) => line,
                None => break ExitReason::Eof,
            };

            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            if is_exit_command(question) {
                break ExitReason::Command;
            }

            match self.answerer.ask(question).await {
                Ok(answer) => {
                    answered += 1;
                    writer
                        .write_all(format!("\nResposta: {}\n\n", answer).as_bytes())
                        .await?;
                }
                Err(e) => {
                    failed += 1;
                    warn!("Question failed: {:#}", e);
                    writer.write_all(format!("Erro: {:#}\n", e).as_bytes()).await?;
                }
            }
        };

        // Leave the cursor on a fresh line after the last prompt
        if exit == ExitReason::Eof {
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;

        Ok(ChatSummary {
            answered,
            failed,
            exit,
        })
    }
}
