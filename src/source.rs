// Input resolution: turns a file path, URL or inline base64 payload into a
// single in-memory buffer and enforces the upload size limit before anything
// is sent to the platform.

use crate::api::ApiClient;
use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::percent_decode_str;
use reqwest::Url;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Largest image the platform accepts: 10 MiB, inclusive.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Where the image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    LocalFile(PathBuf),
    RemoteUrl(String),
    InlineData(String),
}

impl ImageSource {
    /// Classify a single opaque input. Inline payloads are only chosen when
    /// the caller says so; `http://` and `https://` inputs are URLs and
    /// everything else is a path.
    pub fn classify(input: &str, inline: bool) -> Self {
        if inline {
            ImageSource::InlineData(input.to_string())
        } else if input.starts_with("http://") || input.starts_with("https://") {
            ImageSource::RemoteUrl(input.to_string())
        } else {
            ImageSource::LocalFile(PathBuf::from(input))
        }
    }
}

/// Resolved image bytes. The file name is kept when one is known so the
/// multipart part can carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
    file_name: Option<String>,
}

impl ByteBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        ByteBuffer {
            bytes,
            file_name: None,
        }
    }

    fn named(bytes: Vec<u8>, file_name: Option<String>) -> Self {
        ByteBuffer { bytes, file_name }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Resolves an `ImageSource` into a `ByteBuffer`. URL fetches reuse the API
/// client so they share its timeout.
#[derive(Debug)]
pub struct ImageSourceResolver<'a> {
    api: &'a ApiClient,
    max_bytes: usize,
}

impl<'a> ImageSourceResolver<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        ImageSourceResolver {
            api,
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    pub fn resolve(&self, source: &ImageSource) -> Result<ByteBuffer> {
        let buffer = match source {
            ImageSource::LocalFile(path) => read_file(path, self.max_bytes)?,
            ImageSource::RemoteUrl(url) => self.fetch(url)?,
            ImageSource::InlineData(data) => ByteBuffer::new(decode_inline(data)?),
        };
        debug!(size = buffer.len(), "resolved image source");
        check_size(buffer.len(), self.max_bytes)?;
        Ok(buffer)
    }

    /// Download at most `max_bytes + 1` bytes: an advertised
    /// `Content-Length` over the limit is rejected before reading, and a
    /// body that keeps going is cut one byte past the limit so the size
    /// check still fails.
    fn fetch(&self, url: &str) -> Result<ByteBuffer> {
        debug!(%url, "downloading image");
        let res = self
            .api
            .http()
            .get(url)
            .send()
            .map_err(|e| Error::transport(format!("Failed to download image from {}", url), e))?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::http_status(format!("Failed to download image from {}", url), status));
        }
        if let Some(len) = res.content_length() {
            check_size(to_usize(len), self.max_bytes)?;
        }

        let mut bytes = Vec::new();
        res.take(self.max_bytes as u64 + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| Error::Transport {
                context: format!("Failed to read image body from {}: {}", url, e),
                source: None,
            })?;
        Ok(ByteBuffer::named(bytes, url_file_name(url)))
    }
}

/// Read a local file, rejecting it by its metadata size before reading.
fn read_file(path: &Path, max_bytes: usize) -> Result<ByteBuffer> {
    let not_found = |source: std::io::Error| Error::NotFound {
        path: path.to_path_buf(),
        source,
    };
    let len = std::fs::metadata(path).map_err(not_found)?.len();
    check_size(to_usize(len), max_bytes)?;

    let bytes = std::fs::read(path).map_err(not_found)?;
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string);
    Ok(ByteBuffer::named(bytes, file_name))
}

fn to_usize(len: u64) -> usize {
    usize::try_from(len).unwrap_or(usize::MAX)
}

/// Decode a base64 payload. Whitespace (line-wrapped output from `base64`)
/// and a leading `data:<mime>;base64,` prefix are accepted.
fn decode_inline(data: &str) -> Result<Vec<u8>> {
    let payload = match data.trim_start().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, body)| body)
            .ok_or_else(|| Error::Decode("Invalid base64 data: data URL has no payload".into()))?,
        None => data,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(Error::Decode("Invalid base64 data: payload is empty".into()));
    }
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Error::Decode(format!("Invalid base64 data: {}", e)))
}

fn check_size(size: usize, limit: usize) -> Result<()> {
    if size > limit {
        return Err(Error::SizeLimitExceeded { size, limit });
    }
    Ok(())
}

/// Last non-empty path segment of `url`, percent-decoded.
fn url_file_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?;
    let name = percent_decode_str(segment).decode_utf8().ok()?;
    (!name.is_empty()).then(|| name.into_owned())
}
