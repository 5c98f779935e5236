//! Link generation for page templates.
//!
//! A [`LinkGenerator`] produces variant URLs with the same encoding the
//! request decoder reads, so a link it emits resolves to exactly the cache
//! file the handler will look for.
//!
//! ```
//! use imageprinter::link::LinkGenerator;
//! use imageprinter::options::OptionSet;
//!
//! let links = LinkGenerator::new("/ip", OptionSet::new());
//! let url = links
//!     .link("logo.jpg", Some(&OptionSet::new().with("width", 200u32).with("height", 120u32)))
//!     .unwrap();
//! assert_eq!(url, "/ip/logo__width-200,height-120,crop-true,quality-80.jpg");
//! ```

use crate::cache_key::build_cache_key;
use crate::options::{OptionSet, OptionsError, Separators, default_image_options};

#[derive(Debug, Clone)]
pub struct LinkGenerator {
    prefix: String,
    defaults: OptionSet,
    separators: Separators,
}

impl LinkGenerator {
    /// Links under `prefix`. `defaults` take precedence over the stock
    /// image defaults (`width=300, height=200, crop=true, quality=80`).
    pub fn new(prefix: impl Into<String>, defaults: OptionSet) -> Self {
        Self {
            prefix: prefix.into(),
            defaults: defaults.with_defaults(&default_image_options()),
            separators: Separators::default(),
        }
    }

    /// Use the separators the serving side is configured with.
    pub fn with_separators(mut self, separators: Separators) -> Self {
        self.separators = separators;
        self
    }

    pub fn defaults(&self) -> &OptionSet {
        &self.defaults
    }

    /// URL of `source` rendered with `options`, completed from the defaults.
    ///
    /// Caller options keep their order; missing defaults follow in default
    /// order.
    pub fn link(&self, source: &str, options: Option<&OptionSet>) -> Result<String, OptionsError> {
        let options = match options {
            Some(options) => options.with_defaults(&self.defaults),
            None => self.defaults.clone(),
        };
        build_cache_key(source, &options, &self.prefix, &self.separators)
    }
}
