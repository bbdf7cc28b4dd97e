// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use futures::StreamExt;
use hf_hub::api::tokio::ApiBuilder;
use hf_hub::{Repo, RepoType};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const PART_SUFFIX: &str = "part";

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub connect_timeout_secs: u64,
    pub retry_policy: RetryPolicy,
    /// Draw an indicatif progress bar on stderr
    pub show_progress: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            retry_policy: RetryPolicy::default(),
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            exponential_base: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: usize) -> Duration {
        let factor = self.exponential_base.powi(retry as i32);
        let ms = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

/// Where a model file can be fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    HuggingFace {
        repo_id: String,
        filename: String,
        revision: Option<String>,
    },
    Http {
        url: String,
    },
}

impl ModelSource {
    pub fn hugging_face(repo_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self::HuggingFace {
            repo_id: repo_id.into(),
            filename: filename.into(),
            revision: None,
        }
    }

    /// Direct download URL
    pub fn url(&self) -> Result<String, DownloadError> {
        match self {
            ModelSource::HuggingFace {
                repo_id,
                filename,
                revision,
            } => {
                let api = ApiBuilder::new()
                    .with_progress(false)
                    .build()
                    .map_err(|e| DownloadError::InvalidSource(e.to_string()))?;
                let repo = Repo::with_revision(
                    repo_id.clone(),
                    RepoType::Model,
                    revision.clone().unwrap_or_else(|| "main".to_string()),
                );
                Ok(api.repo(repo).url(filename))
            }
            ModelSource::Http { url } => {
                if url.starts_with("http://") || url.starts_with("https://") {
                    Ok(url.clone())
                } else {
                    Err(DownloadError::InvalidSource(format!(
                        "unsupported URL scheme: {}",
                        url
                    )))
                }
            }
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::HuggingFace {
                repo_id, filename, ..
            } => write!(f, "{}/{}", repo_id, filename),
            ModelSource::Http { url } => f.write_str(url),
        }
    }
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Checksum mismatch - expected: {expected}, actual: {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("Max retries exceeded: {attempts} attempts, last error: {last_error}")]
    MaxRetriesExceeded { attempts: usize, last_error: String },
    #[error("Invalid download source: {0}")]
    InvalidSource(String),
}

impl DownloadError {
    /// Network failures, 5xx and 429 are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Network(_) => true,
            DownloadError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        DownloadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        DownloadError::Network(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub local_path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
    pub source_url: String,
    pub attempts: usize,
    pub download_time_ms: u64,
}

/// Temporary path a download is streamed into before the final rename
///
/// `tag` keeps the part files of overlapping downloads of the same model
/// apart, so neither truncates the other.
pub fn part_path(dest: &Path, tag: u64) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{:016x}.{}", tag, PART_SUFFIX));
    dest.with_file_name(name)
}

fn progress_bar(total: Option<u64>, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    match total {
        Some(total) => {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(
                "[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => ProgressBar::new_spinner(),
    }
}

#[derive(Clone)]
pub struct ModelDownloader {
    config: DownloadConfig,
    client: reqwest::Client,
}

impl ModelDownloader {
    pub fn new(config: DownloadConfig) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("local-rag-chat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Fetch `source` into `dest`
    ///
    /// The body is streamed into its own `<dest>.<tag>.part` and renamed into
    /// place only once it is complete and, when `expected_sha256` is given,
    /// verified.
    /// A failed download removes the part file and never touches `dest`.
    pub async fn download(
        &self,
        source: &ModelSource,
        dest: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<DownloadResult, DownloadError> {
        let url = source.url()?;
        let start = Instant::now();

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let part = part_path(dest, rand::random());
        let policy = &self.config.retry_policy;
        let mut attempts = 0;

        let (size_bytes, sha256) = loop {
            attempts += 1;
            debug!("Download attempt {} for {}", attempts, url);

            match self.fetch_to_file(&url, &part).await {
                Ok(done) => break done,
                Err(e) => {
                    remove_quietly(&part).await;
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if attempts > policy.max_retries {
                        return Err(DownloadError::MaxRetriesExceeded {
                            attempts,
                            last_error: e.to_string(),
                        });
                    }
                    let delay = policy.delay_for(attempts - 1);
                    warn!(
                        "Download attempt {} failed: {}. Retrying in {:?}",
                        attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };

        if let Some(expected) = expected_sha256 {
            let expected = expected.trim().to_lowercase();
            if expected != sha256 {
                remove_quietly(&part).await;
                return Err(DownloadError::ChecksumMismatch {
                    expected,
                    actual: sha256,
                });
            }
            debug!("Checksum verified for {}", dest.display());
        }

        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;

        let download_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Downloaded {} ({} bytes) to {} in {} ms",
            url,
            size_bytes,
            dest.display(),
            download_time_ms
        );

        Ok(DownloadResult {
            local_path: dest.to_path_buf(),
            size_bytes,
            sha256,
            source_url: url,
            attempts,
            download_time_ms,
        })
    }

    async fn fetch_to_file(&self, url: &str, part: &Path) -> Result<(u64, String), DownloadError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let total = response.content_length();
        let pb = progress_bar(total, self.config.show_progress);

        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| DownloadError::io(part, e))?;
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(part, e))?;
            hasher.update(&chunk);
            written += chunk.len() as u64;
            pb.set_position(written);
        }

        file.flush().await.map_err(|e| DownloadError::io(part, e))?;
        file.sync_all()
            .await
            .map_err(|e| DownloadError::io(part, e))?;
        pb.finish_and_clear();

        if let Some(total) = total {
            if written != total {
                return Err(DownloadError::Network(format!(
                    "body ended after {} of {} bytes",
                    written, total
                )));
            }
        }

        Ok((written, hex::encode(hasher.finalize())))
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}

/// Whether the model had to be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnsureOutcome {
    AlreadyPresent,
    Downloaded,
}

/// Make sure a model file exists at `path`, downloading it when missing
///
/// An existing file is trusted as-is; no network request is made.
pub async fn ensure_model(
    path: &Path,
    source: &ModelSource,
    downloader: &ModelDownloader,
    expected_sha256: Option<&str>,
) -> Result<EnsureOutcome, DownloadError> {
    let present = tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);

    if present {
        println!("✅ Modelo encontrado localmente.");
        return Ok(EnsureOutcome::AlreadyPresent);
    }

    println!(
        "❌ Modelo não encontrado em {}. Iniciando download...",
        path.display()
    );
    info!("Fetching {} into {}", source, path.display());
    downloader.download(source, path, expected_sha256).await?;
    println!("Download concluído com sucesso!");

    Ok(EnsureOutcome::Downloaded)
}
