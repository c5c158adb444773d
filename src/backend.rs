use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use tokio::{fs::File, io::AsyncWriteExt, time};
use url::Url;

use crate::config::HttpConfig;
use crate::error::ClientError;
use crate::model::JobRequest;
use crate::progress::ProgressPayload;

/// File name the retrieved archive is saved under
pub const ARCHIVE_NAME: &str = "playlist.zip";

/// The external service that does the actual downloading and packaging.
#[async_trait]
pub trait JobBackend: Send + Sync + 'static {
    /// Creates the job. Any non-success response is fatal for the submission.
    async fn start_download(&self, request: &JobRequest) -> Result<(), ClientError>;

    /// Reads the state of the current job.
    async fn fetch_progress(&self) -> Result<ProgressPayload, ClientError>;

    /// Saves the finished archive into `dir`, returning the written path.
    async fn fetch_archive(&self, dir: &Path) -> Result<PathBuf, ClientError>;
}

pub struct HttpBackend {
    client: Client,
    base: Url,
    request_timeout: Duration,
    stall_timeout: Duration,
}

impl HttpBackend {
    pub fn new(mut base: Url, http: &HttpConfig) -> Result<Self, ClientError> {
        // Url::join drops the last segment unless the base ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .connect_timeout(http.connect_timeout)
            .build()
            .map_err(ClientError::Client)?;
        Ok(Self {
            client,
            base,
            request_timeout: http.request_timeout,
            stall_timeout: http.stall_timeout,
        })
    }

    pub fn endpoint(&self, name: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(name)?)
    }
}

#[async_trait]
impl JobBackend for HttpBackend {
    async fn start_download(&self, request: &JobRequest) -> Result<(), ClientError> {
        let url = self.endpoint("start-download")?;
        tracing::debug!(%url, "POST job request");
        let response = self
            .client
            .post(url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(())
    }

    async fn fetch_progress(&self) -> Result<ProgressPayload, ClientError> {
        let response = self
            .client
            .get(self.endpoint("progress")?)
            .timeout(self.request_timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response.json::<ProgressPayload>().await?)
    }

    async fn fetch_archive(&self, dir: &Path) -> Result<PathBuf, ClientError> {
        // Only the wait for headers and the gaps between chunks are bounded;
        // a large archive may take as long as it needs
        let request = self.client.get(self.endpoint("get-zip")?).send();
        let response = time::timeout(self.stall_timeout, request)
            .await
            .map_err(|_| ClientError::Stalled(self.stall_timeout))??;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(ARCHIVE_NAME);
        let written = write_stream(response.bytes_stream(), &path, self.stall_timeout).await?;
        tracing::info!(path = %path.display(), bytes = written, "Archive saved");
        Ok(path)
    }
}

/// `<path>.part`, the file a download is written to before it is complete
pub fn partial_path(path: &Path) -> PathBuf {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    PathBuf::from(partial)
}

/// Copies a byte stream into `path`.
///
/// Bytes go to `<path>.part` first, which replaces `path` only once the
/// stream has ended cleanly. On any failure the partial file is removed and
/// whatever was at `path` before is left untouched.
pub async fn write_stream<S, E>(
    stream: S,
    path: &Path,
    stall_timeout: Duration,
) -> Result<u64, ClientError>
where
    S: Stream<Item = Result<Bytes, E>>,
    ClientError: From<E>,
{
    let partial = partial_path(path);
    let result = async {
        let total = copy_stream(stream, &partial, stall_timeout).await?;
        tokio::fs::rename(&partial, path).await?;
        Ok::<_, ClientError>(total)
    }
    .await;

    if result.is_err() {
        if let Err(err) = tokio::fs::remove_file(&partial).await {
            tracing::warn!(path = %partial.display(), error = %err, "Could not remove partial archive");
        }
    }
    result
}

async fn copy_stream<S, E>(stream: S, path: &Path, stall_timeout: Duration) -> Result<u64, ClientError>
where
    S: Stream<Item = Result<Bytes, E>>,
    ClientError: From<E>,
{
    let mut stream = std::pin::pin!(stream);
    let mut file = File::create(path).await?;
    let mut total = 0u64;
    loop {
        let chunk = match time::timeout(stall_timeout, stream.next()).await {
            Ok(Some(chunk)) => chunk?,
            Ok(None) => break,
            Err(_) => return Err(ClientError::Stalled(stall_timeout)),
        };
        total += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(total)
}
