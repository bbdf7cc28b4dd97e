// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Folder-to-documents loader
//!
//! Lists the `*.txt` files directly inside a folder (no recursion, hidden
//! files skipped) and reads each one as a single [`Document`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Extension of the files picked up by the loader (case-sensitive)
pub const TEXT_EXTENSION: &str = "txt";

/// A loaded text file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub source: PathBuf,
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to list {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is not valid UTF-8 text")]
    InvalidUtf8 { path: PathBuf },
}

fn is_text_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(true, |n| n.starts_with('.'));
    !hidden && path.extension().and_then(|e| e.to_str()) == Some(TEXT_EXTENSION)
}

/// Load every `*.txt` file in `dir`, sorted by path
///
/// A missing folder is treated as an empty one.
pub async fn load_documents(dir: impl AsRef<Path>) -> Result<Vec<Document>, LoadError> {
    let dir = dir.as_ref();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("Documents folder {} does not exist", dir.display());
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(LoadError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut paths = Vec::new();
    loop {
        let entry = entries.next_entry().await.map_err(|source| LoadError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let Some(entry) = entry else { break };

        let path = entry.path();
        // metadata() follows symlinks, so a link to a text file still counts
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if is_file && is_text_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| LoadError::ReadFile {
                path: path.clone(),
                source,
            })?;
        let content =
            String::from_utf8(bytes).map_err(|_| LoadError::InvalidUtf8 { path: path.clone() })?;

        debug!("Loaded {} ({} bytes)", path.display(), content.len());
        documents.push(Document {
            content,
            source: path,
        });
    }

    Ok(documents)
}
