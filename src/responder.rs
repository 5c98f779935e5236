//! Responses and the static file responder.
//!
//! The HTTP server itself is outside this crate. The handler produces a
//! [`Response`] value, and a [`StaticResponder`] turns a validated cache
//! file into one. [`FileResponder`] is the stock implementation: it reads the
//! file and sets `Content-Type`, `Content-Length`, `Cache-Control` (from
//! `max_age`) and a strong `ETag`.

use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    InternalServerError,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NotFound => 404,
            Status::InternalServerError => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Plain-text response with a short diagnostic body.
    pub fn text(status: Status, body: impl Into<String>) -> Self {
        let body = body.into().into_bytes();
        Self {
            status,
            headers: vec![
                ("Content-Type".into(), "text/plain; charset=utf-8".into()),
                ("Content-Length".into(), body.len().to_string()),
            ],
            body,
        }
    }

    pub fn not_found(body: impl Into<String>) -> Self {
        Self::text(Status::NotFound, body)
    }

    pub fn server_error(body: impl Into<String>) -> Self {
        Self::text(Status::InternalServerError, body)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serves a file that the handler has already validated.
pub trait StaticResponder: Send + Sync {
    fn serve(&self, file: &Path) -> Response;
}

/// Reads cache files from disk.
#[derive(Debug, Clone, Default)]
pub struct FileResponder {
    max_age: Duration,
}

impl FileResponder {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }
}

fn content_type(file: &Path) -> &'static str {
    image::ImageFormat::from_path(file)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

impl StaticResponder for FileResponder {
    fn serve(&self, file: &Path) -> Response {
        let body = match std::fs::read(file) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Response::not_found("Not found");
            }
            Err(e) => {
                warn!(file = %file.display(), error = %e, "failed to read cache file");
                return Response::server_error("Internal error");
            }
        };
        let etag = format!("\"{:x}\"", Sha256::digest(&body));
        Response {
            status: Status::Ok,
            headers: vec![
                ("Content-Type".into(), content_type(file).into()),
                ("Content-Length".into(), body.len().to_string()),
                (
                    "Cache-Control".into(),
                    format!("public, max-age={}", self.max_age.as_secs()),
                ),
                ("ETag".into(), etag),
            ],
            body,
        }
    }
}
