//! Named image operations.
//!
//! An operation reads the decoded options and describes the work on a
//! [`Pipeline`]. Requests select one with the `op` option; without it the
//! operation registered as [`DEFAULT_OPERATION`] runs.
//!
//! The [`OperationRegistry`] is built at startup and shared by reference.
//! Registration takes a write lock and lookups a read lock, so registering
//! while requests are in flight is safe, though applications normally
//! register everything before serving.

use super::params::{MAX_DIMENSION, Pipeline, Quality};
use crate::options::OptionSet;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Name of the operation used when a request has no `op` option.
pub const DEFAULT_OPERATION: &str = "default";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("invalid value '{value}' for option '{key}'")]
    InvalidOption { key: String, value: String },
    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("operation not defined: {0}")]
pub struct UnknownOperation(pub String);

/// A registered operation.
pub type Operation = dyn Fn(&OptionSet, &mut Pipeline) -> Result<(), OperationError> + Send + Sync;

/// Process-wide table of named operations.
pub struct OperationRegistry {
    operations: RwLock<HashMap<String, Arc<Operation>>>,
}

impl OperationRegistry {
    /// A registry with nothing in it, not even the default.
    pub fn empty() -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
        }
    }

    /// A registry with [`resize_and_crop`] registered as the default.
    pub fn new() -> Self {
        Self::with_max_dimension(MAX_DIMENSION)
    }

    /// A registry whose default operation rejects any requested width or
    /// height above `max_dimension`.
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        let registry = Self::empty();
        registry.register_default(bounded_resize_and_crop(max_dimension));
        registry
    }

    /// Register `operation` under `name`, replacing any previous one.
    pub fn register<F>(&self, name: impl Into<String>, operation: F)
    where
        F: Fn(&OptionSet, &mut Pipeline) -> Result<(), OperationError> + Send + Sync + 'static,
    {
        self.operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(operation));
    }

    /// Replace the operation used when no `op` is given.
    pub fn register_default<F>(&self, operation: F)
    where
        F: Fn(&OptionSet, &mut Pipeline) -> Result<(), OperationError> + Send + Sync + 'static,
    {
        self.register(DEFAULT_OPERATION, operation);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<Operation>, UnknownOperation> {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| UnknownOperation(name.to_string()))
    }

    /// Resolve the operation an option set asks for.
    pub fn resolve_for(&self, options: &OptionSet) -> Result<Arc<Operation>, UnknownOperation> {
        let name = options.get_str("op");
        self.resolve(name.as_deref().unwrap_or(DEFAULT_OPERATION))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a pixel dimension. Absent or empty means unconstrained; zero and
/// anything above `max` are invalid.
fn dimension(options: &OptionSet, key: &str, max: u32) -> Result<Option<u32>, OperationError> {
    let Some(raw) = options.get_str(key) else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<u32>() {
        Ok(n) if (1..=max).contains(&n) => Ok(Some(n)),
        _ => Err(OperationError::InvalidOption {
            key: key.to_string(),
            value: raw.into_owned(),
        }),
    }
}

fn quality(options: &OptionSet) -> Result<Option<Quality>, OperationError> {
    let Some(raw) = options.get_str("quality") else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u32>()
        .map(|q| Some(Quality::new(q)))
        .map_err(|_| OperationError::InvalidOption {
            key: "quality".to_string(),
            value: raw.into_owned(),
        })
}

/// The built-in default: aspect-preserving resize, then optional crop.
///
/// With both `width` and `height`:
///
/// - `width > height`: resize to the requested height, crop `width`×`height`
/// - otherwise (ties included): resize to the requested width, crop
///   `height`×`width` (crop sides swapped)
///
/// The crop only happens when `crop` is the string `true`. With a single
/// dimension the image is scaled to it and never cropped. `quality` is
/// applied whenever present. Widths and heights above [`MAX_DIMENSION`]
/// are rejected.
pub fn resize_and_crop(options: &OptionSet, pipeline: &mut Pipeline) -> Result<(), OperationError> {
    resize_and_crop_within(options, pipeline, MAX_DIMENSION)
}

/// [`resize_and_crop`] with a different dimension cap.
pub fn bounded_resize_and_crop(
    max_dimension: u32,
) -> impl Fn(&OptionSet, &mut Pipeline) -> Result<(), OperationError> + Send + Sync + 'static {
    move |options, pipeline| resize_and_crop_within(options, pipeline, max_dimension)
}

fn resize_and_crop_within(
    options: &OptionSet,
    pipeline: &mut Pipeline,
    max_dimension: u32,
) -> Result<(), OperationError> {
    let width = dimension(options, "width", max_dimension)?;
    let height = dimension(options, "height", max_dimension)?;
    let crop = options.get_str("crop").as_deref() == Some("true");

    match (width, height) {
        (Some(w), Some(h)) => {
            let crop_target = if w > h {
                pipeline.resize(None, Some(h));
                (w, h)
            } else {
                pipeline.resize(Some(w), None);
                (h, w)
            };
            if crop {
                pipeline.center_crop(crop_target.0, crop_target.1);
            }
        }
        (None, None) => {}
        (w, h) => {
            pipeline.resize(w, h);
        }
    }

    if let Some(q) = quality(options)? {
        pipeline.quality(q);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Step;

    fn run(options: &OptionSet) -> Pipeline {
        let mut pipeline = Pipeline::new();
        resize_and_crop(options, &mut pipeline).unwrap();
        pipeline
    }

    fn opts(pairs: &[(&str, &str)]) -> OptionSet {
        pairs.iter().copied().collect()
    }

    #[test]
    fn landscape_request_resizes_by_height_and_crops_requested_box() {
        let p = run(&opts(&[
            ("width", "200"),
            ("height", "100"),
            ("quality", "80"),
            ("crop", "true"),
        ]));
        assert_eq!(
            p.steps(),
            &[
                Step::Resize {
                    width: None,
                    height: Some(100)
                },
                Step::CenterCrop {
                    width: 200,
                    height: 100
                },
            ]
        );
        assert_eq!(p.encode_quality(), Some(Quality::new(80)));
    }

    #[test]
    fn portrait_request_resizes_by_width_and_swaps_crop() {
        let p = run(&opts(&[("width", "100"), ("height", "300"), ("crop", "true")]));
        assert_eq!(
            p.steps(),
            &[
                Step::Resize {
                    width: Some(100),
                    height: None
                },
                Step::CenterCrop {
                    width: 300,
                    height: 100
                },
            ]
        );
    }

    #[test]
    fn square_request_takes_the_width_branch() {
        let p = run(&opts(&[("width", "200"), ("height", "200"), ("crop", "true")]));
        assert_eq!(
            p.steps()[0],
            Step::Resize {
                width: Some(200),
                height: None
            }
        );
        assert_eq!(
            p.steps()[1],
            Step::CenterCrop {
                width: 200,
                height: 200
            }
        );
    }

    #[test]
    fn dimensions_compare_numerically() {
        // "1000" < "200" as strings, but not as numbers.
        let p = run(&opts(&[("width", "1000"), ("height", "200")]));
        assert_eq!(
            p.steps(),
            &[Step::Resize {
                width: None,
                height: Some(200)
            }]
        );
    }

    #[test]
    fn crop_requires_literal_true() {
        for value in ["false", "1", "yes", ""] {
            let p = run(&opts(&[("width", "20"), ("height", "10"), ("crop", value)]));
            assert_eq!(p.steps().len(), 1, "crop={value} must not crop");
        }
    }

    #[test]
    fn typed_boolean_crop_counts_as_true() {
        let options = OptionSet::new()
            .with("width", 20u32)
            .with("height", 10u32)
            .with("crop", true);
        assert_eq!(run(&options).steps().len(), 2);
    }

    #[test]
    fn single_dimension_scales_without_crop() {
        let p = run(&opts(&[("width", "50"), ("crop", "true")]));
        assert_eq!(
            p.steps(),
            &[Step::Resize {
                width: Some(50),
                height: None
            }]
        );
    }

    #[test]
    fn no_dimensions_only_sets_quality() {
        let p = run(&opts(&[("quality", "40")]));
        assert!(p.steps().is_empty());
        assert_eq!(p.encode_quality(), Some(Quality::new(40)));
    }

    #[test]
    fn empty_dimension_is_unconstrained() {
        let p = run(&opts(&[("width", ""), ("height", "40")]));
        assert_eq!(
            p.steps(),
            &[Step::Resize {
                width: None,
                height: Some(40)
            }]
        );
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let mut pipeline = Pipeline::new();
        for bad in [("width", "abc"), ("height", "0"), ("quality", "high")] {
            let result = resize_and_crop(&opts(&[bad]), &mut pipeline);
            assert_eq!(
                result,
                Err(OperationError::InvalidOption {
                    key: bad.0.to_string(),
                    value: bad.1.to_string()
                })
            );
        }
    }

    #[test]
    fn dimensions_above_the_cap_are_rejected() {
        let mut pipeline = Pipeline::new();
        let huge = opts(&[("width", "4000000000"), ("height", "4000000000")]);
        assert_eq!(
            resize_and_crop(&huge, &mut pipeline),
            Err(OperationError::InvalidOption {
                key: "width".into(),
                value: "4000000000".into()
            })
        );
        assert!(pipeline.steps().is_empty());

        let at_cap = MAX_DIMENSION.to_string();
        assert!(resize_and_crop(&opts(&[("height", at_cap.as_str())]), &mut pipeline).is_ok());
    }

    #[test]
    fn registry_cap_applies_to_default_operation() {
        let registry = OperationRegistry::with_max_dimension(100);
        let op = registry.resolve(DEFAULT_OPERATION).unwrap();
        let mut pipeline = Pipeline::new();
        assert!(op(&opts(&[("width", "100")]), &mut pipeline).is_ok());
        assert_eq!(
            op(&opts(&[("height", "101")]), &mut pipeline),
            Err(OperationError::InvalidOption {
                key: "height".into(),
                value: "101".into()
            })
        );
    }

    #[test]
    fn registry_resolves_default_and_custom() {
        let registry = OperationRegistry::new();
        registry.register("grow", |_: &OptionSet, p: &mut Pipeline| {
            p.resize(Some(1000), None);
            Ok(())
        });

        assert!(registry.resolve(DEFAULT_OPERATION).is_ok());
        let grow = registry.resolve("grow").unwrap();
        let mut pipeline = Pipeline::new();
        grow(&OptionSet::new(), &mut pipeline).unwrap();
        assert_eq!(pipeline.steps().len(), 1);
        assert_eq!(registry.names(), vec!["default", "grow"]);
    }

    #[test]
    fn registry_unknown_name() {
        let registry = OperationRegistry::new();
        assert_eq!(
            registry.resolve("unregistered-name").err(),
            Some(UnknownOperation("unregistered-name".into()))
        );
    }

    #[test]
    fn resolve_for_uses_op_option() {
        let registry = OperationRegistry::new();
        assert!(registry.resolve_for(&OptionSet::new()).is_ok());
        assert!(
            registry
                .resolve_for(&OptionSet::new().with("op", "missing"))
                .is_err()
        );
    }

    #[test]
    fn register_default_replaces_builtin() {
        let registry = OperationRegistry::new();
        registry.register_default(|_: &OptionSet, _: &mut Pipeline| {
            Err(OperationError::Failed("replaced".into()))
        });
        let op = registry.resolve(DEFAULT_OPERATION).unwrap();
        assert_eq!(
            op(&OptionSet::new(), &mut Pipeline::new()),
            Err(OperationError::Failed("replaced".into()))
        );
    }

    #[test]
    fn empty_registry_has_no_default() {
        assert!(OperationRegistry::empty().resolve(DEFAULT_OPERATION).is_err());
    }
}
