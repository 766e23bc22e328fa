//! Peer transports: fetch a remote snapshot and remote file bytes.

use crate::error::{SyncError, SyncResult};
use crate::tree::snapshot::SnapshotWire;
use crate::tree::{Snapshot, SnapshotBuilder};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Default request timeout for HTTP peers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of remote snapshots and file contents
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the peer's current snapshot.
    async fn fetch_snapshot(&self) -> SyncResult<Snapshot>;

    /// Stream the peer file at `relative` (relative to the peer's root) into
    /// `dest`, creating or truncating it.
    async fn fetch_file(&self, relative: &Path, dest: &Path) -> SyncResult<()>;

    /// Human-readable peer address, for logs and reports.
    fn peer(&self) -> String;
}

/// Pick a transport for a peer address.
///
/// `http://` and `https://` addresses use [`HttpTransport`]; `file://` URLs and
/// plain paths use [`DirectoryTransport`].
pub fn connect(peer: &str, timeout: Duration) -> SyncResult<Box<dyn Transport>> {
    if peer.starts_with("http://") || peer.starts_with("https://") {
        return Ok(Box::new(HttpTransport::with_timeout(peer, timeout)?));
    }
    let dir = peer.strip_prefix("file://").unwrap_or(peer);
    if dir.is_empty() {
        return Err(SyncError::Config("peer address is empty".to_string()));
    }
    Ok(Box::new(DirectoryTransport::new(dir)))
}

/// Split a root-relative path into URL-safe string segments.
fn relative_segments(relative: &Path) -> SyncResult<Vec<&str>> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_str().ok_or_else(|| {
                SyncError::Wire(format!("path is not valid UTF-8: {}", relative.display()))
            })?),
            _ => return Err(SyncError::path_mapping(relative, ".")),
        }
    }
    if segments.is_empty() {
        return Err(SyncError::path_mapping(relative, "."));
    }
    Ok(segments)
}

fn classify(err: reqwest::Error, context: &str) -> SyncError {
    let message = format!("{context}: {err}");
    let retryable = err.is_timeout()
        || err.is_connect()
        || err.is_body()
        || err.status().is_some_and(|s| s.is_server_error());
    SyncError::Transport { message, retryable }
}

fn check_status(response: Response, context: &str) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = format!("peer returned {status} for {context}");
    if status.is_server_error() {
        Err(SyncError::transport_retryable(message))
    } else {
        Err(SyncError::transport_fatal(message))
    }
}

/// HTTP peer serving `/index` and `/files/*path`
pub struct HttpTransport {
    base_url: Url,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> SyncResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| SyncError::Config(format!("invalid peer URL {base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "peer URL cannot be used as a base: {base_url}"
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: parsed,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> SyncResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Config(format!("invalid peer URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn index_url(&self) -> SyncResult<Url> {
        self.endpoint(&["index"])
    }

    /// Each path segment is percent-encoded on its own.
    pub(crate) fn file_url(&self, relative: &Path) -> SyncResult<Url> {
        let mut segments = vec!["files"];
        segments.extend(relative_segments(relative)?);
        self.endpoint(&segments)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_snapshot(&self) -> SyncResult<Snapshot> {
        let url = self.index_url()?;
        debug!(url = %url, "Fetching remote snapshot");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(e, "failed to fetch index"))?;
        let response = check_status(response, "index")?;
        let wire: SnapshotWire = response.json().await.map_err(|e| {
            SyncError::transport_fatal(format!("failed to decode index response: {e}"))
        })?;
        Snapshot::from_wire(wire)
    }

    async fn fetch_file(&self, relative: &Path, dest: &Path) -> SyncResult<()> {
        let url = self.file_url(relative)?;
        let context = format!("file {}", relative.display());
        debug!(url = %url, dest = %dest.display(), "Fetching file");
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(e, &context))?;
        response = check_status(response, &context)?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| SyncError::io(dest, e))?;
        while let Some(chunk) = response.chunk().await.map_err(|e| classify(e, &context))? {
            file.write_all(&chunk)
                .await
                .map_err(|e| SyncError::io(dest, e))?;
        }
        file.flush().await.map_err(|e| SyncError::io(dest, e))
    }

    fn peer(&self) -> String {
        self.base_url.to_string()
    }
}

/// Another local directory acting as the peer
#[derive(Debug, Clone)]
pub struct DirectoryTransport {
    root: PathBuf,
}

impl DirectoryTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Transport for DirectoryTransport {
    async fn fetch_snapshot(&self) -> SyncResult<Snapshot> {
        let builder = SnapshotBuilder::new(self.root.clone());
        tokio::task::spawn_blocking(move || builder.build())
            .await
            .map_err(|e| SyncError::transport_fatal(format!("snapshot task failed: {e}")))?
    }

    async fn fetch_file(&self, relative: &Path, dest: &Path) -> SyncResult<()> {
        let mut source = self.root.clone();
        source.extend(relative_segments(relative)?);
        tokio::fs::copy(&source, dest)
            .await
            .map_err(|e| SyncError::io(&source, e))?;
        Ok(())
    }

    fn peer(&self) -> String {
        self.root.display().to_string()
    }
}
