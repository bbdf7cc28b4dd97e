// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Tests for streaming model downloads

use super::fixtures::{fast_downloader, TestServer, MODEL_BYTES};
use local_rag_chat::models::DownloadError;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::atomic::Ordering;
use tempfile::TempDir;

/// Part files still lying next to `dest`
fn leftover_parts(dest: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dest.parent().unwrap()) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .count()
}

#[cfg(test)]
mod downloading_tests {
    use super::*;

    fn model_sha() -> String {
        hex::encode(Sha256::digest(MODEL_BYTES))
    }

    #[tokio::test]
    async fn test_download_writes_file_and_reports_hash() {
        let server = TestServer::start().await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("models").join("tiny.gguf");

        let result = fast_downloader()
            .download(&server.source("model.gguf"), &dest, None)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), MODEL_BYTES);
        assert_eq!(result.size_bytes, MODEL_BYTES.len() as u64);
        assert_eq!(result.sha256, model_sha());
        assert_eq!(result.attempts, 1);
        assert_eq!(leftover_parts(&dest), 0);
    }

    #[tokio::test]
    async fn test_matching_checksum_is_accepted() {
        let server = TestServer::start().await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("tiny.gguf");
        let expected = model_sha().to_uppercase();

        fast_downloader()
            .download(&server.source("model.gguf"), &dest, Some(&expected))
            .await
            .unwrap();
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_checksum_mismatch_leaves_no_file() {
        let server = TestServer::start().await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("tiny.gguf");

        let err = fast_downloader()
            .download(&server.source("model.gguf"), &dest, Some(&"0".repeat(64)))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::ChecksumMismatch { .. }));
        assert!(!dest.exists());
        assert_eq!(leftover_parts(&dest), 0);
        // Not retried
        assert_eq!(server.hits.model.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_overlapping_downloads_both_leave_a_whole_file() {
        let server = TestServer::start().await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("tiny.gguf");
        let source = server.source("model.gguf");
        let downloader = fast_downloader();

        let (first, second) = tokio::join!(
            downloader.download(&source, &dest, None),
            downloader.download(&source, &dest, None)
        );

        assert_eq!(first.unwrap().sha256, model_sha());
        assert_eq!(second.unwrap().sha256, model_sha());
        assert_eq!(std::fs::read(&dest).unwrap(), MODEL_BYTES);
        assert_eq!(server.hits.model.load(Ordering::SeqCst), 2);
        assert_eq!(leftover_parts(&dest), 0);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = TestServer::start().await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("tiny.gguf");

        let err = fast_downloader()
            .download(&server.source("missing.gguf"), &dest, None)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::HttpStatus { status: 404, .. }));
        assert_eq!(server.hits.missing.load(Ordering::SeqCst), 1);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let server = TestServer::start().await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("tiny.gguf");

        let result = fast_downloader()
            .download(&server.source("flaky.gguf"), &dest, None)
            .await
            .unwrap();

        assert_eq!(result.attempts, 3);
        assert_eq!(std::fs::read(&dest).unwrap(), MODEL_BYTES);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let server = TestServer::start().await;
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("tiny.gguf");

        let err = fast_downloader()
            .download(&server.source("broken.gguf"), &dest, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DownloadError::MaxRetriesExceeded { attempts: 4, .. }
        ));
        assert_eq!(server.hits.broken.load(Ordering::SeqCst), 4);
        assert!(!dest.exists());
        assert_eq!(leftover_parts(&dest), 0);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_network_failure() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("tiny.gguf");
        let source = local_rag_chat::models::ModelSource::Http {
            url: format!("http://127.0.0.1:{}/model.gguf", port),
        };

        let err = fast_downloader()
            .download(&source, &dest, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::MaxRetriesExceeded { .. }));
        assert!(!dest.exists());
    }
}
