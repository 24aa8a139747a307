//! Typed representation of a single sparse feature.
//!
//! A [`Feature`] is either index-addressed ([`IndexFeature`]) or
//! name-addressed ([`NamedFeature`]).  Which variant a token or binary record
//! produces is decided by an out-of-band [`FeatureMode`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

/// Selects the feature variant produced by parsing and decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureMode {
    /// Feature identity is a non-negative integer.
    Indexed,
    /// Feature identity is a string, optionally qualified by a field name.
    #[default]
    Named,
}

impl FeatureMode {
    /// Lower-case label used in logs and file summaries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureMode::Indexed => "indexed",
            FeatureMode::Named => "named",
        }
    }

    /// Tag byte stored in row file headers.
    #[must_use]
    pub(crate) fn tag(self) -> u8 {
        match self {
            FeatureMode::Indexed => 0,
            FeatureMode::Named => 1,
        }
    }

    /// Inverse of [`FeatureMode::tag`], returning `None` for unknown tags.
    #[must_use]
    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FeatureMode::Indexed),
            1 => Some(FeatureMode::Named),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature addressed by a dense non-negative index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexFeature {
    pub(crate) index: i32,
    pub(crate) value: f64,
}

impl IndexFeature {
    /// Creates an index feature, rejecting negative indices and non-finite values.
    pub fn new(index: i32, value: f64) -> Result<Self> {
        if index < 0 {
            return Err(FeatureError::MalformedIndex {
                token: format!("{index}:{value}"),
                text: index.to_string(),
            });
        }
        check_finite(value, || format!("{index}:{value}"))?;
        Ok(Self { index, value })
    }

    /// Returns the feature index.
    #[inline]
    #[must_use]
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Returns the feature value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Feature addressed by a string name and an optional field namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedFeature {
    pub(crate) name: String,
    pub(crate) field: Option<String>,
    pub(crate) value: f64,
}

impl NamedFeature {
    /// Creates a named feature without a field.
    pub fn new(name: impl Into<String>, value: f64) -> Result<Self> {
        Self::build(None, name.into(), value)
    }

    /// Creates a named feature qualified by `field`.
    ///
    /// An empty field is stored as absent, matching its binary encoding.
    pub fn with_field(
        field: impl Into<String>,
        name: impl Into<String>,
        value: f64,
    ) -> Result<Self> {
        let field = field.into();
        let field = if field.is_empty() { None } else { Some(field) };
        Self::build(field, name.into(), value)
    }

    fn build(field: Option<String>, name: String, value: f64) -> Result<Self> {
        if name.is_empty() {
            return Err(FeatureError::EmptyName {
                token: format!(":{value}"),
            });
        }
        check_finite(value, || format!("{name}:{value}"))?;
        Ok(Self { name, field, value })
    }

    /// Returns the feature name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field namespace, if any.
    #[inline]
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Returns the feature value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// One sparse feature of a training row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Feature {
    /// Index-addressed feature.
    Index(IndexFeature),
    /// Name-addressed feature.
    Named(NamedFeature),
}

impl Feature {
    /// Returns the feature value shared by both variants.
    #[inline]
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            Feature::Index(f) => f.value,
            Feature::Named(f) => f.value,
        }
    }

    /// Returns the mode that produces this variant.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> FeatureMode {
        match self {
            Feature::Index(_) => FeatureMode::Indexed,
            Feature::Named(_) => FeatureMode::Named,
        }
    }

    /// Returns the index variant, if this is one.
    #[must_use]
    pub fn as_index(&self) -> Option<&IndexFeature> {
        match self {
            Feature::Index(f) => Some(f),
            Feature::Named(_) => None,
        }
    }

    /// Returns the named variant, if this is one.
    #[must_use]
    pub fn as_named(&self) -> Option<&NamedFeature> {
        match self {
            Feature::Named(f) => Some(f),
            Feature::Index(_) => None,
        }
    }

    /// Returns `true` when the [`Display`](fmt::Display) form parses back to this feature.
    ///
    /// Names and fields may hold any text, but a `:` or whitespace inside them
    /// changes how the rendered token splits.
    #[must_use]
    pub fn is_token_safe(&self) -> bool {
        fn plain(text: &str) -> bool {
            !text.chars().any(|c| c == ':' || c.is_whitespace())
        }
        match self {
            Feature::Index(_) => true,
            Feature::Named(f) => plain(&f.name) && f.field.as_deref().map_or(true, plain),
        }
    }

    /// Overwrites the slot with index content, keeping it in place when the variant matches.
    pub(crate) fn overwrite_index(&mut self, index: i32, value: f64) {
        match self {
            Feature::Index(f) => {
                f.index = index;
                f.value = value;
            }
            slot => *slot = Feature::Index(IndexFeature { index, value }),
        }
    }

    /// Overwrites the slot with named content, reusing its string buffers when possible.
    pub(crate) fn overwrite_named(&mut self, field: Option<&str>, name: &str, value: f64) {
        match self {
            Feature::Named(f) => {
                f.name.clear();
                f.name.push_str(name);
                match (field, f.field.as_mut()) {
                    (Some(text), Some(buf)) => {
                        buf.clear();
                        buf.push_str(text);
                    }
                    (Some(text), None) => f.field = Some(text.to_owned()),
                    (None, _) => f.field = None,
                }
                f.value = value;
            }
            slot => {
                *slot = Feature::Named(NamedFeature {
                    name: name.to_owned(),
                    field: field.map(str::to_owned),
                    value,
                })
            }
        }
    }
}

impl From<IndexFeature> for Feature {
    fn from(feature: IndexFeature) -> Self {
        Feature::Index(feature)
    }
}

impl From<NamedFeature> for Feature {
    fn from(feature: NamedFeature) -> Self {
        Feature::Named(feature)
    }
}

/// Renders the feature in token syntax (`index:value`, `name:value` or `field:name:value`).
impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Index(feat) => write!(f, "{}:{}", feat.index, feat.value),
            Feature::Named(feat) => match &feat.field {
                Some(field) => write!(f, "{field}:{}:{}", feat.name, feat.value),
                None => write!(f, "{}:{}", feat.name, feat.value),
            },
        }
    }
}

fn check_finite(value: f64, token: impl FnOnce() -> String) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FeatureError::MalformedValue {
            token: token(),
            text: value.to_string(),
        })
    }
}
