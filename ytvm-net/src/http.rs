// ytvm-net/src/http.rs
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LOCATION, USER_AGENT};
use reqwest::{Client, Response};
use tokio::fs::{self, File as TokioFile};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};
use url::Url;
use ytvm_common::config::Config;
use ytvm_common::error::{Result, YtvmError};

use crate::validation::validate_url;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str =
    concat!("yt-vod-manager launcher/", env!("CARGO_PKG_VERSION"), " (Rust)");

/// Builds the client used for release downloads.
///
/// Redirects are not followed by reqwest; `fetch_to_file` follows them itself
/// so it can bound the hop count and detect cycles.
pub fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| YtvmError::HttpError(format!("Failed to build HTTP client: {e}")))
}

/// Downloads `url` into `dest`, following up to `config.max_redirects`
/// redirects. The body is streamed to a sibling temporary file that is
/// renamed onto `dest` once the stream completes.
pub async fn fetch_to_file(
    client: &Client,
    url: &str,
    dest: &Path,
    config: &Config,
) -> Result<PathBuf> {
    let asset_name = dest
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut current = validate_url(url, config.allow_insecure)?;
    let mut visited: HashSet<Url> = HashSet::new();
    let mut hops = 0usize;

    loop {
        if !visited.insert(current.clone()) {
            error!("Redirect cycle detected at {}", current);
            return Err(YtvmError::RedirectCycle(current.to_string()));
        }

        debug!("Requesting {}", current);
        let response = client.get(current.clone()).send().await.map_err(|e| {
            debug!("HTTP request failed for {current}: {e}");
            YtvmError::HttpError(format!("HTTP request failed for {current}: {e}"))
        })?;
        let status = response.status();
        debug!("Received HTTP status: {} for {}", status, current);

        if status.is_redirection() {
            if let Some(next) = redirect_target(&response, &current)? {
                hops += 1;
                if hops > config.max_redirects {
                    error!("Exceeded {} redirects fetching {}", config.max_redirects, url);
                    return Err(YtvmError::TooManyRedirects {
                        url: url.to_string(),
                        hops,
                    });
                }
                debug!("Following redirect {} -> {}", current, next);
                current = validate_url(next.as_str(), config.allow_insecure)?;
                continue;
            }
        }

        if !status.is_success() {
            error!("HTTP error {} for URL {}", status, current);
            return Err(YtvmError::DownloadError(
                asset_name,
                current.to_string(),
                format!("Download failed ({})", status.as_u16()),
            ));
        }

        stream_to_file(response, dest, &current).await?;
        return Ok(dest.to_path_buf());
    }
}

fn redirect_target(response: &Response, current: &Url) -> Result<Option<Url>> {
    let Some(location) = response.headers().get(LOCATION) else {
        return Ok(None);
    };
    let location = location.to_str().map_err(|e| {
        YtvmError::HttpError(format!("Invalid Location header from {current}: {e}"))
    })?;
    current.join(location).map(Some).map_err(|e| {
        YtvmError::HttpError(format!(
            "Invalid redirect target '{location}' from {current}: {e}"
        ))
    })
}

async fn stream_to_file(response: Response, dest: &Path, source: &Url) -> Result<()> {
    let temp_filename = format!(
        ".{}.download",
        dest.file_name().unwrap_or_default().to_string_lossy()
    );
    let temp_path = dest.with_file_name(temp_filename);
    debug!("Downloading to temporary path: {}", temp_path.display());

    let result = write_stream(response, &temp_path, source).await;
    if let Err(e) = result {
        if let Err(remove_err) = fs::remove_file(&temp_path).await {
            debug!(
                "Failed to remove partial download {}: {}",
                temp_path.display(),
                remove_err
            );
        }
        return Err(e);
    }

    fs::rename(&temp_path, dest).await.map_err(|e| {
        YtvmError::InstallError(format!(
            "Failed to move temp file {} to {}: {}",
            temp_path.display(),
            dest.display(),
            e
        ))
    })?;
    debug!("Finished download to {}", dest.display());
    Ok(())
}

async fn write_stream(response: Response, temp_path: &Path, source: &Url) -> Result<()> {
    let mut temp_file = TokioFile::create(temp_path).await.map_err(|e| {
        YtvmError::InstallError(format!(
            "Failed to create temp file {}: {}",
            temp_path.display(),
            e
        ))
    })?;

    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            YtvmError::HttpError(format!("Failed to read response body from {source}: {e}"))
        })?;
        temp_file.write_all(&chunk).await.map_err(|e| {
            YtvmError::InstallError(format!(
                "Failed to write download stream to {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        written += chunk.len() as u64;
    }
    temp_file.flush().await?;
    debug!("Wrote {} bytes from {}", written, source);
    Ok(())
}
