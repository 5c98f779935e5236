//! The request-handling boundary.
//!
//! [`ImagePrinter::handle`] takes a request path and always answers with a
//! [`Response`]; no error escapes it. The flow is:
//!
//! ```text
//! strip prefix → decode → validate source → check cache ─┬─ valid ──────────────→ serve
//!                                                       └─ missing/stale/empty → materialize → serve
//! ```
//!
//! Failures map to 404 when the variant cannot exist (bad path, bad
//! options, missing source, unknown operation) and to 500 when the
//! infrastructure failed (directory creation, cache write, processing).
//! Decode failures are answered before the filesystem is touched.

use crate::cache_key::build_cache_key;
use crate::imaging::{ImageBackend, OperationRegistry, RustBackend};
use crate::materialize::{MaterializeError, Materializer};
use crate::options::{OptionSet, Separators};
use crate::request::{DecodedRequest, RequestError, contained_source, decode_request, strip_prefix};
use crate::responder::{FileResponder, Response, StaticResponder, Status};
use crate::source::{Source, SourceValidator};
use crate::staleness::check_cache;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum HandleError {
    #[error("request path outside prefix '{0}'")]
    OutsidePrefix(String),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

impl HandleError {
    pub fn status(&self) -> Status {
        match self {
            HandleError::Materialize(e) if !e.is_not_found() => Status::InternalServerError,
            _ => Status::NotFound,
        }
    }
}

/// How a variant came to be on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A valid cache file was already there.
    Cached,
    /// The variant was rendered for this call.
    Rendered,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Cached => f.write_str("cached"),
            Outcome::Rendered => f.write_str("rendered"),
        }
    }
}

/// A variant that is ready to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub path: PathBuf,
    pub outcome: Outcome,
}

type KeyLocks = Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

/// Request handler over one destination tree and one source.
pub struct ImagePrinter {
    destination: PathBuf,
    source: Source,
    validator: Arc<dyn SourceValidator>,
    separators: Separators,
    prefix: String,
    materializer: Materializer,
    responder: Box<dyn StaticResponder>,
    in_flight: Option<KeyLocks>,
}

impl fmt::Debug for ImagePrinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePrinter")
            .field("destination", &self.destination)
            .field("source", &self.source)
            .field("separators", &self.separators)
            .field("prefix", &self.prefix)
            .field("single_flight", &self.in_flight.is_some())
            .finish_non_exhaustive()
    }
}

impl ImagePrinter {
    pub fn builder(destination: impl Into<PathBuf>, source: Source) -> ImagePrinterBuilder {
        ImagePrinterBuilder::new(destination.into(), source)
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn separators(&self) -> &Separators {
        &self.separators
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn validator(&self) -> &dyn SourceValidator {
        self.validator.as_ref()
    }

    pub fn registry(&self) -> &OperationRegistry {
        self.materializer.registry()
    }

    /// Answer a request for `path`.
    pub fn handle(&self, path: &str) -> Response {
        match self.resolve_request(path) {
            Ok(variant) => self.responder.serve(&variant.path),
            Err(err) => {
                let status = err.status();
                if status == Status::NotFound {
                    debug!(path, error = %err, "not found");
                    Response::not_found("Not found")
                } else {
                    warn!(path, error = %err, "failed to materialize variant");
                    Response::server_error("Internal error")
                }
            }
        }
    }

    /// Make sure the variant a request path names is on disk.
    pub fn resolve_request(&self, path: &str) -> Result<Variant, HandleError> {
        let stripped = strip_prefix(path, &self.prefix)
            .ok_or_else(|| HandleError::OutsidePrefix(self.prefix.clone()))?;
        let DecodedRequest {
            source,
            options,
            cache_file,
        } = decode_request(stripped, &self.separators)?;
        debug!(path, source = %source, cache_file = %cache_file, "decoded request");
        self.ensure(&source, &self.destination.join(&cache_file), &options)
    }

    /// Make sure `source` rendered with `options` is on disk.
    ///
    /// `source` obeys the same path rules as a request: it may not leave the
    /// source root, and its variant may not leave the destination.
    pub fn variant(&self, source: &str, options: &OptionSet) -> Result<Variant, HandleError> {
        let source = contained_source(source)?;
        let key = build_cache_key(&source, options, "", &self.separators)
            .map_err(RequestError::from)?;
        self.ensure(&source, &self.destination.join(key), options)
    }

    fn ensure(
        &self,
        source: &str,
        cache_file: &Path,
        options: &OptionSet,
    ) -> Result<Variant, HandleError> {
        let check = self.validator.validate(source);
        if !check.valid {
            return Err(HandleError::SourceUnavailable(source.to_string()));
        }

        let status = check_cache(cache_file, check.modified);
        debug!(cache_file = %cache_file.display(), %status, "cache status");
        if status.is_valid() {
            return Ok(Variant {
                path: cache_file.to_path_buf(),
                outcome: Outcome::Cached,
            });
        }

        let outcome = self.exclusive(cache_file, || {
            // Another holder of the key may have rendered it meanwhile.
            if self.in_flight.is_some() && check_cache(cache_file, check.modified).is_valid() {
                return Ok(Outcome::Cached);
            }
            self.materializer
                .materialize(&self.source, source, cache_file, options)
                .map(|()| Outcome::Rendered)
        })?;
        Ok(Variant {
            path: cache_file.to_path_buf(),
            outcome,
        })
    }

    /// Run `f` holding the per-key lock when single flight is on.
    fn exclusive<T>(&self, key: &Path, f: impl FnOnce() -> T) -> T {
        let Some(in_flight) = &self.in_flight else {
            return f();
        };
        let lock = in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_path_buf())
            .or_default()
            .clone();
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        let mut locks = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this call still hold it.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
        result
    }
}

/// Builder for [`ImagePrinter`].
pub struct ImagePrinterBuilder {
    destination: PathBuf,
    source: Source,
    validator: Option<Arc<dyn SourceValidator>>,
    separators: Separators,
    prefix: String,
    backend: Option<Arc<dyn ImageBackend>>,
    registry: Option<Arc<OperationRegistry>>,
    responder: Option<Box<dyn StaticResponder>>,
    max_age: Duration,
    single_flight: bool,
}

impl ImagePrinterBuilder {
    fn new(destination: PathBuf, source: Source) -> Self {
        Self {
            destination,
            source,
            validator: None,
            separators: Separators::default(),
            prefix: String::new(),
            backend: None,
            registry: None,
            responder: None,
            max_age: Duration::ZERO,
            single_flight: false,
        }
    }

    /// Replace the source's default validator.
    pub fn validator(mut self, validator: impl SourceValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn separators(mut self, separators: Separators) -> Self {
        self.separators = separators;
        self
    }

    /// Mount prefix stripped from request paths.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Image backend; defaults to [`RustBackend::new`].
    pub fn backend(mut self, backend: impl ImageBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    /// Operation registry; defaults to one holding only the built-in default.
    pub fn registry(mut self, registry: Arc<OperationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Static responder; defaults to a [`FileResponder`] using `max_age`.
    pub fn responder(mut self, responder: impl StaticResponder + 'static) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    pub fn build(self) -> ImagePrinter {
        let validator = self
            .validator
            .unwrap_or_else(|| self.source.default_validator());
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(OperationRegistry::new()));
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(RustBackend::new()));
        let materializer = Materializer::shared(backend, registry);
        let responder = self
            .responder
            .unwrap_or_else(|| Box::new(FileResponder::new(self.max_age)));
        ImagePrinter {
            destination: self.destination,
            source: self.source,
            validator,
            separators: self.separators,
            prefix: self.prefix,
            materializer,
            responder,
            in_flight: self.single_flight.then(KeyLocks::default),
        }
    }
}
