//! Where a roll comes from: a local file, an HTTP(S) URL or bytes in memory.
//!
//! pdfium opens documents by path, so remote and in-memory rolls are staged
//! into a private temporary directory owned by the [`ResolvedInput`]; the
//! staged file disappears when the input is dropped. Every source passes the
//! same header check before pdfium sees it.

use crate::error::VoterListError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// PDF readers accept leading junk before `%PDF` up to this offset.
const HEADER_WINDOW: usize = 1024;

/// Name recorded for rolls that arrive without one.
const UNNAMED: &str = "document.pdf";

/// A roll ready to be opened by path.
#[derive(Debug)]
pub struct ResolvedInput {
    path: PathBuf,
    name: String,
    _staging: Option<TempDir>,
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name recorded as `pdf_filename` in the record set.
    pub fn file_name(&self) -> String {
        self.name.clone()
    }

    /// [`Self::file_name`] without its extension, used to name artifacts.
    pub fn file_stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or URL to a local roll.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<ResolvedInput, VoterListError> {
    if is_url(input) {
        download(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Stage in-memory bytes under `name` for the lifetime of the returned input.
pub async fn stage_bytes(bytes: &[u8], name: &str) -> Result<ResolvedInput, VoterListError> {
    check_header(bytes, Path::new(name))?;

    let staging = tempfile::Builder::new()
        .prefix("voterlist-")
        .tempdir()
        .map_err(|e| VoterListError::Internal(format!("staging directory: {e}")))?;
    let path = staging.path().join(name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| VoterListError::Internal(format!("staging write: {e}")))?;

    debug!("Staged {} bytes at {}", bytes.len(), path.display());
    Ok(ResolvedInput {
        path,
        name: name.to_string(),
        _staging: Some(staging),
    })
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, VoterListError> {
    let path = PathBuf::from(path_str);
    if !path.is_file() {
        return Err(VoterListError::FileNotFound { path });
    }

    let mut head = Vec::with_capacity(HEADER_WINDOW + 3);
    let read = std::fs::File::open(&path)
        .and_then(|f| f.take((HEADER_WINDOW + 3) as u64).read_to_end(&mut head));
    match read {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(VoterListError::PermissionDenied { path });
        }
        Err(_) => return Err(VoterListError::FileNotFound { path }),
    }
    check_header(&head, &path)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| UNNAMED.to_string());
    debug!("Resolved local roll: {}", path.display());
    Ok(ResolvedInput {
        path,
        name,
        _staging: None,
    })
}

/// `%PDF` must start within the first [`HEADER_WINDOW`] bytes.
fn check_header(head: &[u8], path: &Path) -> Result<(), VoterListError> {
    if head.windows(4).take(HEADER_WINDOW).any(|w| w == b"%PDF") {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = head.len().min(4);
    magic[..n].copy_from_slice(&head[..n]);
    Err(VoterListError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

async fn download(url: &str, timeout_secs: u64) -> Result<ResolvedInput, VoterListError> {
    info!("Downloading roll from {}", url);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| VoterListError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let body = fetch(&client, url).await.map_err(|e| {
        if e.is_timeout() {
            VoterListError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            VoterListError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    stage_bytes(&body, &url_file_name(url)).await
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Last path segment of `url`, forced to a `.pdf` name.
fn url_file_name(url: &str) -> String {
    let segment = reqwest::Url::parse(url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut s| s.next_back())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    });
    match segment {
        Some(s) if s.to_ascii_lowercase().ends_with(".pdf") => s,
        Some(s) => format!("{s}.pdf"),
        None => UNNAMED.to_string(),
    }
}
