//! Streaming downloads and archive extraction
//!
//! Used for the dataset archive and for ONNX model weights. Downloads are
//! streamed to disk with byte progress; a failed transfer never leaves a
//! partial file behind.

use crate::error::{PipelineError, Result};
use crate::services::ProgressIndicator;
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use std::fs;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use tracing::Instrument;

/// HTTP downloader with progress reporting
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    show_progress: bool,
}

impl Downloader {
    /// Create a new downloader
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(show_progress: bool) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PipelineError::network_error("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            show_progress,
        })
    }

    /// Download `url` to `destination`, removing the partial file on failure
    pub async fn download_file(&self, url: &str, destination: &Path) -> Result<u64> {
        log::info!("Downloading: {}", url);

        let span = crate::tracing_config::spans::download(url, destination);
        match self.stream_to_file(url, destination).instrument(span).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                if destination.exists() {
                    if let Err(cleanup_err) = fs::remove_file(destination) {
                        log::warn!(
                            "Failed to remove partial download {}: {}",
                            destination.display(),
                            cleanup_err
                        );
                    }
                }
                Err(e)
            },
        }
    }

    async fn stream_to_file(&self, url: &str, local_path: &Path) -> Result<u64> {
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::file_io_error("create directory", parent, &e))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::network_error(format!("Failed to download {}", url), e))?;

        if !response.status().is_success() {
            return Err(PipelineError::network_error(
                format!("Failed to download {}", url),
                format!("HTTP {}", response.status()),
            ));
        }

        let total_size = response.content_length();
        let label = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let progress = ProgressIndicator::bytes(&label, self.show_progress);
        if let Some(total) = total_size {
            progress.set_length(total);
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| PipelineError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 64 * 1024];

        loop {
            let bytes_read = tokio::io::AsyncReadExt::read(&mut stream, &mut buffer)
                .await
                .map_err(|e| PipelineError::network_error("Failed to read download stream", e))?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| PipelineError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;
            progress.set_position(downloaded);
        }

        file.flush()
            .await
            .map_err(|e| PipelineError::file_io_error("flush file", local_path, &e))?;

        if let Some(total) = total_size {
            if downloaded != total {
                return Err(PipelineError::network_error(
                    format!("Incomplete download of {}", url),
                    format!("received {downloaded} of {total} bytes"),
                ));
            }
        }

        progress.finish_and_clear();
        log::debug!("Downloaded {} bytes to {}", downloaded, local_path.display());
        Ok(downloaded)
    }
}

/// Extract a gzip-compressed tar archive into `destination`
pub fn extract_tar_gz(archive_path: &Path, destination: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)
        .map_err(|e| PipelineError::file_io_error("open archive", archive_path, &e))?;
    let decoder = flate2::read::GzDecoder::new(std::io::BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);

    fs::create_dir_all(destination)
        .map_err(|e| PipelineError::file_io_error("create directory", destination, &e))?;

    archive.unpack(destination).map_err(|e| {
        PipelineError::archive(format!(
            "Failed to extract '{}': {}",
            archive_path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::build_tar_gz;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_download_file() {
        let mut server = mockito::Server::new_async().await;
        let body = b"archive-bytes".to_vec();
        let mock = server
            .mock("GET", "/images.tar.gz")
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;

        let temp_dir = tempdir().unwrap();
        let destination = temp_dir.path().join("nested").join("images.tar.gz");
        let downloader = Downloader::new(false).unwrap();
        let bytes = downloader
            .download_file(&format!("{}/images.tar.gz", server.url()), &destination)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, body.len() as u64);
        assert_eq!(fs::read(&destination).unwrap(), body);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_file() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let temp_dir = tempdir().unwrap();
        let destination = temp_dir.path().join("missing.tar.gz");
        let downloader = Downloader::new(false).unwrap();
        let result = downloader
            .download_file(&format!("{}/missing.tar.gz", server.url()), &destination)
            .await;

        assert!(matches!(result, Err(PipelineError::Network(_))));
        assert!(!destination.exists());
    }

    #[test]
    fn test_extract_tar_gz() {
        let temp_dir = tempdir().unwrap();
        let archive = temp_dir.path().join("images.tar.gz");
        fs::write(
            &archive,
            build_tar_gz(&[
                ("images/Bengal_1.jpg", b"one".as_slice()),
                ("images/Bengal_2.jpg", b"two".as_slice()),
            ]),
        )
        .unwrap();

        let out = temp_dir.path().join("out");
        extract_tar_gz(&archive, &out).unwrap();
        assert_eq!(fs::read(out.join("images/Bengal_2.jpg")).unwrap(), b"two");
    }

    #[test]
    fn test_extract_corrupt_archive() {
        let temp_dir = tempdir().unwrap();
        let archive = temp_dir.path().join("broken.tar.gz");
        fs::write(&archive, b"not a gzip stream").unwrap();

        let result = extract_tar_gz(&archive, &temp_dir.path().join("out"));
        assert!(matches!(result, Err(PipelineError::Archive(_))));
    }
}
