//! Artifact and manifest downloads

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{OpmError, Result};

/// Size of the chunks a download is read in
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Progress callback: (bytes received so far, total size if known)
pub type ProgressCallback<'a> = Option<&'a dyn Fn(u64, Option<u64>)>;

/// Source of remote bytes
pub trait Fetch {
    fn fetch(&self, url: &str, on_progress: ProgressCallback<'_>) -> Result<Vec<u8>>;
}

/// HTTP(S) fetcher with a whole-transfer timeout
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("opm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OpmError::DownloadFailed {
                url: String::new(),
                message: format!("could not create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, on_progress: ProgressCallback<'_>) -> Result<Vec<u8>> {
        let failed = |message: String| OpmError::DownloadFailed {
            url: url.to_string(),
            message,
        };

        tracing::debug!("GET {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)));
        }

        let total = response.content_length();
        read_chunked(&mut response, total, on_progress).map_err(|e| failed(e.to_string()))
    }
}

/// Read `reader` to the end in [`CHUNK_SIZE`] chunks, reporting progress
pub fn read_chunked<R: Read>(
    reader: &mut R,
    total: Option<u64>,
    on_progress: ProgressCallback<'_>,
) -> std::io::Result<Vec<u8>> {
    let capacity = total.map(|t| t.min(256 * 1024 * 1024) as usize).unwrap_or(0);
    let mut data = Vec::with_capacity(capacity);
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        data.extend_from_slice(&chunk[..n]);
        if let Some(f) = on_progress {
            f(data.len() as u64, total);
        }
    }

    Ok(data)
}
