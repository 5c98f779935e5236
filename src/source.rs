//! Where source images come from.
//!
//! A [`Source`] is either a directory on disk ([`Source::PathRoot`]) or an
//! application-supplied [`SourceResolver`] that turns a logical name into
//! a file path or raw bytes. Before anything is rendered the request handler
//! asks a [`SourceValidator`] whether the source exists and when it last
//! changed. Path roots get [`FsValidator`] by default; resolvers get
//! [`Bypass`] unless the application installs its own validator.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source image not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("resolver failed: {0}")]
    Resolver(String),
}

/// Source image content handed to the imaging backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceImage {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// Result of validating a source: does it exist, and when did it change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceCheck {
    pub valid: bool,
    pub modified: Option<SystemTime>,
}

impl SourceCheck {
    pub fn valid(modified: Option<SystemTime>) -> Self {
        Self {
            valid: true,
            modified,
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            modified: None,
        }
    }
}

/// Turns a logical source name into image content.
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<SourceImage, SourceError>;
}

impl<F> SourceResolver for F
where
    F: Fn(&str) -> Result<SourceImage, SourceError> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Result<SourceImage, SourceError> {
        self(name)
    }
}

/// Reports whether a source exists and its modification time.
pub trait SourceValidator: Send + Sync {
    fn validate(&self, name: &str) -> SourceCheck;
}

impl<F> SourceValidator for F
where
    F: Fn(&str) -> SourceCheck + Send + Sync,
{
    fn validate(&self, name: &str) -> SourceCheck {
        self(name)
    }
}

/// Configured origin of source images.
#[derive(Clone)]
pub enum Source {
    /// Sources are files below this directory.
    PathRoot(PathBuf),
    /// Sources are looked up by name.
    Resolver(Arc<dyn SourceResolver>),
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::PathRoot(root) => f.debug_tuple("PathRoot").field(root).finish(),
            Source::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl Source {
    pub fn resolver(resolver: impl SourceResolver + 'static) -> Self {
        Source::Resolver(Arc::new(resolver))
    }

    /// Resolve `name` into readable image content.
    pub fn resolve(&self, name: &str) -> Result<SourceImage, SourceError> {
        match self {
            Source::PathRoot(root) => {
                let path = root.join(name);
                if path.is_file() {
                    Ok(SourceImage::File(path))
                } else {
                    Err(SourceError::NotFound(path.display().to_string()))
                }
            }
            Source::Resolver(resolver) => resolver.resolve(name),
        }
    }

    /// The validator used when the application does not supply one.
    pub fn default_validator(&self) -> Arc<dyn SourceValidator> {
        match self {
            Source::PathRoot(root) => Arc::new(FsValidator::new(root.clone())),
            Source::Resolver(_) => Arc::new(Bypass),
        }
    }
}

/// Validates sources by stat-ing them below a root directory.
#[derive(Debug, Clone)]
pub struct FsValidator {
    root: PathBuf,
}

impl FsValidator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceValidator for FsValidator {
    fn validate(&self, name: &str) -> SourceCheck {
        match std::fs::metadata(self.root.join(name)) {
            Ok(meta) if meta.is_file() => SourceCheck::valid(meta.modified().ok()),
            _ => SourceCheck::invalid(),
        }
    }
}

/// Accepts every source and reports no timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bypass;

impl SourceValidator for Bypass {
    fn validate(&self, _name: &str) -> SourceCheck {
        SourceCheck::valid(None)
    }
}
