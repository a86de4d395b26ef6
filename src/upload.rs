//! Handing the finished drawing to a server.
//!
//! The core only validates and packages: it sanitizes the filename, checks
//! that an auth token exists, encodes the PNG and guards against concurrent
//! uploads. Transport lives behind [`UploadSink`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::UploadError;

pub const DEFAULT_STEM: &str = "drawing";

/// Lowercase `[a-z0-9._-]` name ending in `.png`. Whitespace runs become
/// `_`, any other character (path separators, control characters, non-ASCII)
/// becomes `_`, and leading dots are stripped.
pub fn sanitize_filename(raw: &str) -> Result<String, UploadError> {
    let trimmed = raw.trim();
    let mut name = String::with_capacity(trimmed.len() + 4);
    let mut in_whitespace = false;
    for c in trimmed.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                name.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            name.push(c.to_ascii_lowercase());
        } else {
            name.push('_');
        }
    }

    let name = name.trim_start_matches('.');
    if name.is_empty() {
        return Err(UploadError::EmptyFilename);
    }
    if name.ends_with(".png") {
        Ok(name.to_owned())
    } else {
        Ok(format!("{name}.png"))
    }
}

/// `<stem>_<millis>.png` for local downloads; an empty name uses `drawing`.
pub fn download_filename(raw: &str, timestamp_millis: u64) -> String {
    let base = sanitize_filename(raw).unwrap_or_else(|_| format!("{DEFAULT_STEM}.png"));
    let stem = base.strip_suffix(".png").unwrap_or(&base);
    format!("{stem}_{timestamp_millis}.png")
}

/// Uses the stored token, falling back to `prompt`. Blank answers count as missing.
pub fn resolve_token(
    stored: Option<String>,
    prompt: impl FnOnce() -> Option<String>,
) -> Result<String, UploadError> {
    stored
        .filter(|t| !t.trim().is_empty())
        .or_else(prompt)
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .ok_or(UploadError::MissingToken)
}

/// Ensures a trailing slash so `<base><filename>` is a child path.
pub fn normalize_base_url(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    let mut url = if trimmed.is_empty() { fallback.to_owned() } else { trimmed.to_owned() };
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadReceipt {
    Put { url: String },
    Post { url: String, filename: String },
}

impl UploadReceipt {
    pub fn message(&self) -> String {
        match self {
            Self::Put { url } => format!("Saved via PUT to {url}"),
            Self::Post { url, filename } => format!("Saved {filename} via POST to {url}"),
        }
    }
}

pub trait UploadSink: Send + Sync {
    fn upload(&self, png: &[u8], filename: &str, token: &str) -> Result<UploadReceipt, UploadError>;
}

/// Everything needed for one upload, validated and encoded up front.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub png: Vec<u8>,
    pub filename: String,
    pub token: String,
}

impl UploadJob {
    pub fn run(&self, sink: &dyn UploadSink) -> Result<UploadReceipt, UploadError> {
        log::info!("Uploading {} ({} bytes)", self.filename, self.png.len());
        let result = sink.upload(&self.png, &self.filename, &self.token);
        match &result {
            Ok(receipt) => log::info!("{}", receipt.message()),
            Err(err) => log::error!("Upload of {} failed: {err}", self.filename),
        }
        result
    }
}

#[derive(Debug, Default)]
enum SlotState {
    #[default]
    Idle,
    InFlight,
    Finished(Result<UploadReceipt, UploadError>),
}

/// At most one upload at a time. Shared between the UI and the worker that
/// runs the job; the UI disables Save while [`UploadSlot::is_busy`].
#[derive(Debug, Clone, Default)]
pub struct UploadSlot {
    state: Arc<Mutex<SlotState>>,
}

impl UploadSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        matches!(*self.state.lock(), SlotState::InFlight)
    }

    pub fn try_begin(&self) -> Result<(), UploadError> {
        let mut state = self.state.lock();
        if matches!(*state, SlotState::InFlight) {
            return Err(UploadError::Busy);
        }
        *state = SlotState::InFlight;
        Ok(())
    }

    pub fn finish(&self, result: Result<UploadReceipt, UploadError>) {
        *self.state.lock() = SlotState::Finished(result);
    }

    /// Takes a finished result, returning the slot to idle.
    pub fn take_finished(&self) -> Option<Result<UploadReceipt, UploadError>> {
        let mut state = self.state.lock();
        if !matches!(*state, SlotState::Finished(_)) {
            return None;
        }
        match std::mem::take(&mut *state) {
            SlotState::Finished(result) => Some(result),
            _ => None,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use http::HttpUploader;

#[cfg(not(target_arch = "wasm32"))]
mod http {
    use reqwest::blocking::multipart::{Form, Part};
    use reqwest::blocking::{Client, RequestBuilder};
    use reqwest::header::{CONTENT_TYPE, COOKIE};

    use super::{UploadError, UploadReceipt, UploadSink};

    /// PUT to `<base><filename>`; on any failure, multipart POST to `<base>`.
    #[derive(Debug, Clone)]
    pub struct HttpUploader {
        client: Client,
        base_url: String,
        auth_cookie: String,
    }

    impl HttpUploader {
        pub fn new(base_url: &str, auth_cookie: &str) -> Result<Self, reqwest::Error> {
            Ok(Self {
                client: Client::builder().build()?,
                base_url: super::normalize_base_url(base_url, "/"),
                auth_cookie: auth_cookie.to_owned(),
            })
        }

        fn with_auth(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
            request.header(COOKIE, format!("{}={}", self.auth_cookie, token))
        }

        fn put(&self, png: &[u8], url: &str, token: &str) -> Result<(), String> {
            let request = self
                .client
                .put(url)
                .header(CONTENT_TYPE, "image/png")
                .body(png.to_vec());
            match self.with_auth(request, token).send() {
                Ok(response) if response.status().is_success() => Ok(()),
                Ok(response) => Err(format!("status {}", response.status().as_u16())),
                Err(err) => Err(err.to_string()),
            }
        }

        fn post(&self, png: &[u8], filename: &str, token: &str) -> Result<(), String> {
            let part = Part::bytes(png.to_vec())
                .file_name(filename.to_owned())
                .mime_str("image/png")
                .map_err(|err| err.to_string())?;
            let form = Form::new().part("file", part);
            let request = self.client.post(&self.base_url).multipart(form);
            match self.with_auth(request, token).send() {
                Ok(response) if response.status().is_success() => Ok(()),
                Ok(response) => Err(format!("Upload failed with status {}", response.status().as_u16())),
                Err(err) => Err(err.to_string()),
            }
        }
    }

    impl UploadSink for HttpUploader {
        fn upload(&self, png: &[u8], filename: &str, token: &str) -> Result<UploadReceipt, UploadError> {
            let url = format!("{}{}", self.base_url, filename);
            let put = match self.put(png, &url, token) {
                Ok(()) => return Ok(UploadReceipt::Put { url }),
                Err(reason) => reason,
            };
            log::warn!("PUT {url} failed ({put}), falling back to POST {}", self.base_url);

            match self.post(png, filename, token) {
                Ok(()) => Ok(UploadReceipt::Post {
                    url: self.base_url.clone(),
                    filename: filename.to_owned(),
                }),
                Err(post) => Err(UploadError::Failed { put, post }),
            }
        }
    }
}
