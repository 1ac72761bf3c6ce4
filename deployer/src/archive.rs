//! Branch archive download and unpack.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::DeployError;

/// Source of the tree the compose project is built from.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Replace the extraction root with a fresh copy of the source tree.
    async fn fetch_and_unpack(&self) -> Result<(), DeployError>;
}

/// Downloads a zip archive over HTTP(S) and unpacks it into `extract_dir`.
pub struct HttpArchive {
    client: reqwest::Client,
    url: String,
    extract_dir: PathBuf,
}

impl HttpArchive {
    /// `fetch_timeout` bounds both connecting and each read from the socket.
    pub fn new(url: String, extract_dir: PathBuf, fetch_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(fetch_timeout)
            .read_timeout(fetch_timeout)
            .build()?;
        Ok(Self {
            client,
            url,
            extract_dir,
        })
    }
}

#[async_trait]
impl ArchiveSource for HttpArchive {
    async fn fetch_and_unpack(&self) -> Result<(), DeployError> {
        info!(url = %self.url, "downloading archive");
        let context = format!("GET {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DeployError::upstream(&context, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeployError::upstream(&context, format!("HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DeployError::upstream(&context, e))?;
        debug!(bytes = bytes.len(), "archive downloaded");

        // Blocking work is not cancellable: if the operation is aborted while
        // this runs, the unpack still finishes.
        let extract_dir = self.extract_dir.clone();
        let entries = tokio::task::spawn_blocking(move || unpack(&bytes, &extract_dir))
            .await
            .map_err(|e| DeployError::Unexpected(format!("unpack task failed: {e}")))??;

        info!(entries, dir = %self.extract_dir.display(), "archive unpacked");
        Ok(())
    }
}

/// Wipe `extract_dir` and unpack the zip in `bytes` into it.
///
/// The payload is opened before anything is removed, so a response that is
/// not a zip archive leaves the previous tree in place.
pub fn unpack(bytes: &[u8], extract_dir: &Path) -> Result<usize, DeployError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DeployError::upstream("reading zip archive", e))?;

    if extract_dir.exists() {
        std::fs::remove_dir_all(extract_dir).map_err(|e| {
            DeployError::upstream(format!("clearing {}", extract_dir.display()), e)
        })?;
    }
    std::fs::create_dir_all(extract_dir)
        .map_err(|e| DeployError::upstream(format!("creating {}", extract_dir.display()), e))?;

    let entries = archive.len();
    archive
        .extract(extract_dir)
        .map_err(|e| DeployError::upstream(format!("extracting into {}", extract_dir.display()), e))?;
    Ok(entries)
}
