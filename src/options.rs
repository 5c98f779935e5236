//! Image option sets and their URL-safe string encoding.
//!
//! An [`OptionSet`] is an ordered list of `(name, value)` pairs. Order is a
//! structural property: the encoder writes pairs in exactly the order they
//! were inserted, so the same logical set always produces the same cache
//! path. Equality, on the other hand, ignores order and compares values by
//! their string rendering: `width=200` (integer) equals `width="200"`
//! (string), which is what the decoder hands back.
//!
//! ## Wire format
//!
//! ```text
//! width-200,height-100,quality-80,crop-true
//! ^^^^^ ^^^
//! key   value, joined by `Separators::value`; pairs joined by `Separators::param`
//! ```
//!
//! Values are rendered as follows:
//!
//! | Value | Rendering |
//! |---|---|
//! | string | as-is |
//! | boolean | `true` / `false` |
//! | non-negative integer | decimal |
//! | composite (array, table) | empty string (lossy) |
//!
//! Keys and rendered values may not contain either separator, the options
//! marker, a path separator or a dot. The encoder rejects such input rather
//! than escaping it, so every string it emits decodes back to an equal set.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    #[error("malformed option segment '{segment}': expected exactly one key/value separator")]
    Malformed { segment: String },
    #[error("duplicate option '{key}'")]
    DuplicateKey { key: String },
    #[error("option '{key}' with value '{value}' contains a reserved character")]
    ReservedCharacter { key: String, value: String },
    #[error("option names must not be empty")]
    EmptyKey,
}

/// Separator tokens shared by the encoder and the request decoder.
///
/// Both sides must agree; mixing conventions (`-` vs `_` between key and
/// value) produces paths the decoder cannot read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Separators {
    /// Marker between the real base filename and the encoded options.
    pub opts: String,
    /// Between an option name and its value.
    pub value: String,
    /// Between `key<value>value` pairs.
    pub param: String,
}

impl Default for Separators {
    fn default() -> Self {
        Self {
            opts: "__".to_string(),
            value: "-".to_string(),
            param: ",".to_string(),
        }
    }
}

impl Separators {
    /// Check that the three tokens can be told apart in an encoded path.
    pub fn validate(&self) -> Result<(), String> {
        for (name, token) in [
            ("opts", &self.opts),
            ("value", &self.value),
            ("param", &self.param),
        ] {
            if token.is_empty() {
                return Err(format!("separators.{name} must not be empty"));
            }
            if token.contains(['/', '\\', '.']) {
                return Err(format!(
                    "separators.{name} must not contain '/', '\\' or '.'"
                ));
            }
        }
        if self.value == self.param {
            return Err("separators.value and separators.param must differ".into());
        }
        if self.opts == self.value || self.opts == self.param || self.opts.contains(&self.param)
        {
            return Err(
                "separators.opts must differ from, and not contain, the pair separator".into(),
            );
        }
        Ok(())
    }

    fn is_reserved(&self, text: &str) -> bool {
        text.contains(self.value.as_str())
            || text.contains(self.param.as_str())
            || text.contains(self.opts.as_str())
            || text.contains(['/', '\\', '.'])
    }
}

/// A single option value.
///
/// Deserializes untagged, so a TOML table like `{ width = 200, crop = true }`
/// maps onto the obvious variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(u64),
    Str(String),
    /// Arrays and tables. Encoded as an empty string.
    Composite(serde_json::Value),
}

impl OptionValue {
    /// The canonical string form used for both encoding and comparison.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            OptionValue::Bool(true) => Cow::Borrowed("true"),
            OptionValue::Bool(false) => Cow::Borrowed("false"),
            OptionValue::Int(n) => Cow::Owned(n.to_string()),
            OptionValue::Str(s) => Cow::Borrowed(s),
            OptionValue::Composite(_) => Cow::Borrowed(""),
        }
    }
}

impl PartialEq for OptionValue {
    fn eq(&self, other: &Self) -> bool {
        self.render() == other.render()
    }
}

impl Eq for OptionValue {}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Str(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Str(s)
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<u64> for OptionValue {
    fn from(n: u64) -> Self {
        OptionValue::Int(n)
    }
}

impl From<u32> for OptionValue {
    fn from(n: u32) -> Self {
        OptionValue::Int(n.into())
    }
}

/// Ordered association list of image options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionSet {
    entries: Vec<(String, OptionValue)>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Rendered string value of `key`, if present.
    pub fn get_str(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).map(OptionValue::render)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fill in keys missing from `self` with values from `defaults`.
    ///
    /// Existing keys keep their order and value; missing defaults are
    /// appended in the order `defaults` lists them.
    pub fn with_defaults(&self, defaults: &OptionSet) -> OptionSet {
        let mut merged = self.clone();
        for (key, value) in defaults.iter() {
            if !merged.contains_key(key) {
                merged.entries.push((key.to_string(), value.clone()));
            }
        }
        merged
    }
}

impl PartialEq for OptionSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| ov == v))
    }
}

impl Eq for OptionSet {}

impl<K, V> FromIterator<(K, V)> for OptionSet
where
    K: Into<String>,
    V: Into<OptionValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = OptionSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

/// Options applied by link generation when the caller leaves them out.
pub fn default_image_options() -> OptionSet {
    OptionSet::new()
        .with("width", 300u32)
        .with("height", 200u32)
        .with("crop", true)
        .with("quality", 80u32)
}

/// Serialize an option set in its canonical (insertion) order.
pub fn encode(options: &OptionSet, separators: &Separators) -> Result<String, OptionsError> {
    let mut pairs = Vec::with_capacity(options.len());
    for (key, value) in options.iter() {
        if key.is_empty() {
            return Err(OptionsError::EmptyKey);
        }
        let rendered = value.render();
        if separators.is_reserved(key) || separators.is_reserved(&rendered) {
            return Err(OptionsError::ReservedCharacter {
                key: key.to_string(),
                value: rendered.into_owned(),
            });
        }
        pairs.push(format!("{key}{}{rendered}", separators.value));
    }
    Ok(pairs.join(&separators.param))
}

/// Parse an encoded options fragment. Every value comes back as a string.
///
/// The empty fragment decodes to the empty set, mirroring what
/// [`encode`] produces for it.
pub fn decode(fragment: &str, separators: &Separators) -> Result<OptionSet, OptionsError> {
    let mut options = OptionSet::new();
    if fragment.is_empty() {
        return Ok(options);
    }
    for segment in fragment.split(separators.param.as_str()) {
        if segment.matches(separators.value.as_str()).count() != 1 {
            return Err(OptionsError::Malformed {
                segment: segment.to_string(),
            });
        }
        let Some((key, value)) = segment.split_once(separators.value.as_str()) else {
            return Err(OptionsError::Malformed {
                segment: segment.to_string(),
            });
        };
        if key.is_empty() {
            return Err(OptionsError::EmptyKey);
        }
        if options.contains_key(key) {
            return Err(OptionsError::DuplicateKey {
                key: key.to_string(),
            });
        }
        options.entries.push((key.to_string(), OptionValue::from(value)));
    }
    Ok(options)
}
