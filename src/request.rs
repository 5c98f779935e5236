//! Decoding an incoming variant path back into source and options.
//!
//! This is the inverse of [`build_cache_key`](crate::cache_key::build_cache_key).
//! The base name is split at the **last** options marker: everything before
//! it is the real base name, everything after it is the encoded option
//! fragment. Base names that themselves contain the marker are not
//! supported; they decode to a different source than the one that was
//! encoded.

use crate::cache_key::{join_segments, normalize_separators, split_path};
use crate::options::{OptionSet, OptionsError, Separators, decode};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("invalid request path '{path}': {reason}")]
    InvalidRequestPath { path: String, reason: &'static str },
    #[error("malformed options: {0}")]
    MalformedOptions(#[from] OptionsError),
}

/// A variant request resolved into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRequest {
    /// Source path relative to the source root, e.g. `large/image.jpg`.
    pub source: String,
    /// Decoded options; every value is a string.
    pub options: OptionSet,
    /// Cache file path relative to the destination directory.
    pub cache_file: String,
}

/// Strip a mount prefix such as `/ip` from a request path.
///
/// Only whole segments match: `/ip/a.jpg` strips to `/a.jpg`, `/ipx/a.jpg`
/// does not match. An empty prefix always matches.
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn has_relative_segments(path: &str) -> bool {
    path.split('/').any(|segment| segment == ".." || segment == ".")
}

/// Normalize a source name the application asks for directly (warm-up,
/// [`ImagePrinter::variant`](crate::handler::ImagePrinter::variant)).
///
/// Applies the same path rules as [`decode_request`]: `\` becomes `/`,
/// leading slashes are dropped, and `.`/`..` segments or an empty name are
/// `InvalidRequestPath`.
pub fn contained_source(source: &str) -> Result<String, RequestError> {
    let invalid = |reason| RequestError::InvalidRequestPath {
        path: source.to_string(),
        reason,
    };
    let normalized = normalize_separators(source);
    if has_relative_segments(&normalized) {
        return Err(invalid("relative path segments are not allowed"));
    }
    let trimmed = normalized.trim_start_matches('/');
    if split_path(trimmed).base.is_empty() {
        return Err(invalid("empty base file name"));
    }
    Ok(trimmed.to_string())
}

/// Decode a request path (already stripped of any mount prefix).
pub fn decode_request(
    request_path: &str,
    separators: &Separators,
) -> Result<DecodedRequest, RequestError> {
    let invalid = |reason| RequestError::InvalidRequestPath {
        path: request_path.to_string(),
        reason,
    };

    let normalized = normalize_separators(request_path);
    if has_relative_segments(&normalized) {
        return Err(invalid("relative path segments are not allowed"));
    }

    let parts = split_path(&normalized);
    let marker = parts
        .base
        .rfind(separators.opts.as_str())
        .ok_or_else(|| invalid("no options marker in file name"))?;
    let base = &parts.base[..marker];
    if base.is_empty() {
        return Err(invalid("empty base file name"));
    }
    let fragment = &parts.base[marker + separators.opts.len()..];
    let options = decode(fragment, separators)?;

    let source_file = format!("{base}{}", parts.ext);
    let cache_file_name = format!("{}{}", parts.base, parts.ext);
    Ok(DecodedRequest {
        source: join_segments(&[parts.dir, &source_file]),
        options,
        cache_file: join_segments(&[parts.dir, &cache_file_name]),
    })
}
