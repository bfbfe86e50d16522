use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::SrefError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub trait Fetcher {
    /// Downloads `url` into `destination`. On error nothing is left at `destination`.
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), SrefError>;
}

#[derive(Clone)]
pub struct NomadsHttpClient {
    client: Client,
}

impl NomadsHttpClient {
    pub fn new() -> Result<Self, SrefError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, SrefError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("sref-fetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SrefError::Transport(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| SrefError::Transport(err.to_string()))?;

        Ok(Self { client })
    }

    fn write_response_to_file(
        &self,
        mut response: Response,
        destination: &Path,
    ) -> Result<u64, SrefError> {
        let parent = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|err| SrefError::Filesystem(err.to_string()))?;

        let mut temp = tempfile::Builder::new()
            .prefix(".sref-download")
            .tempfile_in(parent)
            .map_err(|err| SrefError::Filesystem(err.to_string()))?;
        let written = response
            .copy_to(temp.as_file_mut())
            .map_err(|err| SrefError::Transport(format!("body truncated: {err}")))?;
        if let Some(expected) = response.content_length() {
            if expected != written {
                return Err(SrefError::Transport(format!(
                    "body truncated: expected {expected} bytes, received {written}"
                )));
            }
        }
        temp.as_file_mut()
            .flush()
            .map_err(|err| SrefError::Filesystem(err.to_string()))?;
        temp.persist(destination)
            .map_err(|err| SrefError::Filesystem(err.to_string()))?;
        Ok(written)
    }
}

impl Fetcher for NomadsHttpClient {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), SrefError> {
        tracing::debug!(url, destination = %destination.display(), "nomads.request");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| SrefError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SrefError::TransportStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = self.write_response_to_file(response, destination)?;
        tracing::debug!(bytes, "nomads.response");
        Ok(())
    }
}
