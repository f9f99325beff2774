//! Model artifact download.
//!
//! Fetches model files into the cache directory with a progress bar, writes
//! through a temp file, and verifies a SHA-256 checksum when one is pinned.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

/// One downloadable artifact.
pub struct ModelArtifact {
    pub name: &'static str,
    pub url: &'static str,
    /// Hex SHA-256 of the file, when pinned upstream.
    pub sha256: Option<&'static str>,
}

/// The artifact set for the default local model stack.
pub const DEFAULT_ARTIFACTS: &[ModelArtifact] = &[
    ModelArtifact {
        name: "embeddinggemma-300M-Q8_0.gguf",
        url: "https://huggingface.co/ggml-org/embeddinggemma-300M-GGUF/resolve/main/embeddinggemma-300M-Q8_0.gguf",
        sha256: None,
    },
    ModelArtifact {
        name: "qwen3-reranker-0.6b-q8_0.gguf",
        url: "https://huggingface.co/Qwen/Qwen3-Reranker-0.6B-GGUF/resolve/main/qwen3-reranker-0.6b-q8_0.gguf",
        sha256: None,
    },
    ModelArtifact {
        name: "Qwen3-0.6B-Q8_0.gguf",
        url: "https://huggingface.co/Qwen/Qwen3-0.6B-GGUF/resolve/main/Qwen3-0.6B-Q8_0.gguf",
        sha256: None,
    },
];

/// Download every artifact that is not already present in `cache_dir`.
pub async fn download_models(cache_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    for artifact in DEFAULT_ARTIFACTS {
        let dest = cache_dir.join(artifact.name);
        if dest.exists() {
            println!("{} already exists, skipping", artifact.name);
            continue;
        }
        println!("Downloading {}...", artifact.name);
        download_file(artifact.url, &dest, artifact.sha256).await?;
        println!("Saved to {}", dest.display());
    }

    println!("Model download complete.");
    Ok(())
}

/// Download one file with progress. Writes to a temp file, verifies the
/// checksum if pinned, then renames into place.
async fn download_file(url: &str, dest: &PathBuf, expected_sha256: Option<&str>) -> Result<()> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
                    .expect("valid template")
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    let bytes = response.bytes().await.context("error reading response")?;
    pb.inc(bytes.len() as u64);

    if let Some(expected) = expected_sha256 {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let actual = hex::encode(hasher.finalize());
        anyhow::ensure!(
            actual == expected,
            "checksum mismatch for {url}: expected {expected}, got {actual}"
        );
    }

    file.write_all(&bytes).await.context("error writing to file")?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}
