//! Rendering a variant and publishing it into the cache.
//!
//! [`Materializer::materialize`] runs, in order:
//!
//! 1. look up the requested operation (`op`, default `default`) and let it
//!    build the pipeline
//! 2. create the cache file's parent directory
//! 3. resolve the source image
//! 4. render the pipeline with the backend
//! 5. write the encoded bytes to a temp file next to the cache file and
//!    rename it into place
//!
//! The operation runs before anything touches the disk, so a request for
//! an unknown operation or with options it rejects leaves the destination
//! tree exactly as it was. Step 5 means readers only ever see a complete file at the cache
//! path; a crash mid-write leaves a stray temp file, never a truncated
//! cache entry.
//!
//! Two requests for the same missing variant may both render it. Rendering
//! is deterministic, so the last rename wins with identical bytes.

use crate::imaging::{
    ImageBackend, OperationError, OperationRegistry, Pipeline, UnknownOperation, output_format,
};
use crate::options::OptionSet;
use crate::source::{Source, SourceError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Prefix of in-flight temp files inside the destination tree.
pub const TEMP_PREFIX: &str = ".imageprinter-";

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),
    #[error(transparent)]
    UnknownOperation(#[from] UnknownOperation),
    #[error("malformed options: {0}")]
    MalformedOptions(String),
    #[error("could not create cache directory {}: {source}", .path.display())]
    DirectoryCreateFailed { path: PathBuf, source: io::Error },
    #[error("could not write cache file {}: {source}", .path.display())]
    CacheWriteFailed { path: PathBuf, source: io::Error },
    #[error("image processing failed: {0}")]
    ProcessingFailed(String),
}

impl MaterializeError {
    /// Errors that mean "no such variant" rather than a server fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            MaterializeError::SourceUnavailable(_)
                | MaterializeError::UnknownOperation(_)
                | MaterializeError::MalformedOptions(_)
        )
    }
}

impl From<OperationError> for MaterializeError {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::InvalidOption { .. } => {
                MaterializeError::MalformedOptions(err.to_string())
            }
            OperationError::Failed(msg) => MaterializeError::ProcessingFailed(msg),
        }
    }
}

/// Renders variants with a backend and a registry of operations.
#[derive(Clone)]
pub struct Materializer {
    backend: Arc<dyn ImageBackend>,
    registry: Arc<OperationRegistry>,
}

impl Materializer {
    pub fn new(backend: impl ImageBackend + 'static, registry: Arc<OperationRegistry>) -> Self {
        Self::shared(Arc::new(backend), registry)
    }

    /// Build around a backend that is already shared.
    pub fn shared(backend: Arc<dyn ImageBackend>, registry: Arc<OperationRegistry>) -> Self {
        Self { backend, registry }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Render `name` from `source` with `options` and publish it at `cache_file`.
    pub fn materialize(
        &self,
        source: &Source,
        name: &str,
        cache_file: &Path,
        options: &OptionSet,
    ) -> Result<(), MaterializeError> {
        let operation = self.registry.resolve_for(options)?;
        let mut pipeline = Pipeline::new();
        operation(options, &mut pipeline)?;

        if let Some(dir) = cache_file.parent() {
            std::fs::create_dir_all(dir).map_err(|source| {
                MaterializeError::DirectoryCreateFailed {
                    path: dir.to_path_buf(),
                    source,
                }
            })?;
        }

        let image = source.resolve(name)?;
        let format = output_format(cache_file)
            .map_err(|e| MaterializeError::ProcessingFailed(e.to_string()))?;
        let bytes = self
            .backend
            .render(&image, &pipeline, format)
            .map_err(|e| MaterializeError::ProcessingFailed(e.to_string()))?;
        if bytes.is_empty() {
            return Err(MaterializeError::ProcessingFailed(
                "backend produced no output".into(),
            ));
        }

        write_atomic(cache_file, &bytes).map_err(|source| MaterializeError::CacheWriteFailed {
            path: cache_file.to_path_buf(),
            source,
        })?;
        debug!(
            cache_file = %cache_file.display(),
            bytes = bytes.len(),
            "materialized variant"
        );
        Ok(())
    }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
