//! Mapping from `(source path, options)` to the cache file path.
//!
//! The options are spliced into the file name, between the base name and the
//! extension:
//!
//! ```text
//! large/image.jpg + {width: 200, crop: true}
//!   → large/image__width-200,crop-true.jpg
//! ```
//!
//! The same string serves as the URL of the variant (behind an optional
//! prefix) and, relative to the destination directory, as the on-disk cache
//! path. Separators are therefore always `/`, whatever the host uses.
//! [`request::decode_request`](crate::request::decode_request) inverts this.

use crate::options::{OptionSet, OptionsError, Separators, encode};

/// A path broken into `dir`, `base` and `ext` the way POSIX `dirname`,
/// `basename` and `extname` would.
///
/// `dir` carries no leading or trailing `/` and is empty for a bare file
/// name. `ext` includes its dot and is empty when there is none; a dot at
/// the start of the name (`.hidden`) does not start an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParts<'a> {
    pub dir: &'a str,
    pub base: &'a str,
    pub ext: &'a str,
}

/// Replace `\` with `/` so Windows-style input yields URL-style output.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Split an already-normalized path into its parts.
pub fn split_path(path: &str) -> PathParts<'_> {
    let trimmed = path.trim_matches('/');
    let (dir, file) = match trimmed.rfind('/') {
        Some(idx) => (trimmed[..idx].trim_end_matches('/'), &trimmed[idx + 1..]),
        None => ("", trimmed),
    };
    let (base, ext) = match file.rfind('.') {
        Some(idx) if idx > 0 => (&file[..idx], &file[idx..]),
        _ => (file, ""),
    };
    PathParts { dir, base, ext }
}

/// Join non-empty path segments with `/`, keeping a leading `/` on the first.
pub(crate) fn join_segments(segments: &[&str]) -> String {
    let mut out = String::new();
    for segment in segments {
        let segment = if out.is_empty() {
            segment.trim_end_matches('/')
        } else {
            segment.trim_matches('/')
        };
        if segment.is_empty() || segment == "." {
            continue;
        }
        if !out.is_empty() && !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

/// Build the cache path for `source` rendered with `options`.
///
/// `prefix` is prepended verbatim (minus trailing slashes) and is meant for
/// link generation; pass `""` to get the path relative to the destination.
pub fn build_cache_key(
    source: &str,
    options: &OptionSet,
    prefix: &str,
    separators: &Separators,
) -> Result<String, OptionsError> {
    let normalized = normalize_separators(source);
    let parts = split_path(&normalized);
    let file_name = format!(
        "{}{}{}{}",
        parts.base,
        separators.opts,
        encode(options, separators)?,
        parts.ext
    );
    let prefix = normalize_separators(prefix);
    Ok(join_segments(&[&prefix, parts.dir, &file_name]))
}
