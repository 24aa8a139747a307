//! Grammar for textual feature tokens.
//!
//! ```text
//! <id>                  value defaults to 1.0
//! <id>:<value>          explicit value
//! <field>:<id>:<value>  field-qualified form (named mode only)
//! ```
//!
//! The token is split on the first two `:` delimiters, left to right.  In
//! indexed mode `<id>` must be a non-negative 32-bit integer; in named mode it is
//! any non-empty string.

use crate::error::{FeatureError, Result};
use crate::feature::{Feature, FeatureMode, IndexFeature, NamedFeature};

/// Borrowed parse result; materialised into a new or reused [`Feature`].
#[derive(Debug, Clone, Copy, PartialEq)]
enum Parsed<'a> {
    Index {
        index: i32,
        value: f64,
    },
    Named {
        field: Option<&'a str>,
        name: &'a str,
        value: f64,
    },
}

impl Parsed<'_> {
    fn into_feature(self) -> Feature {
        match self {
            Parsed::Index { index, value } => Feature::Index(IndexFeature { index, value }),
            Parsed::Named { field, name, value } => Feature::Named(NamedFeature {
                name: name.to_owned(),
                field: field.map(str::to_owned),
                value,
            }),
        }
    }
}

/// Parses a single token into a freshly allocated feature.
pub fn parse(token: &str, mode: FeatureMode) -> Result<Feature> {
    scan(token, mode).map(Parsed::into_feature)
}

/// Parses a single token, overwriting `target` in place.
///
/// The whole token is validated before `target` is touched, so on error the
/// target keeps its previous content.  When `target` already holds the variant
/// selected by `mode` its string buffers are reused.
pub fn parse_into(token: &str, target: &mut Feature, mode: FeatureMode) -> Result<()> {
    match scan(token, mode)? {
        Parsed::Index { index, value } => target.overwrite_index(index, value),
        Parsed::Named { field, name, value } => target.overwrite_named(field, name, value),
    }
    Ok(())
}

fn scan(token: &str, mode: FeatureMode) -> Result<Parsed<'_>> {
    let Some((lead, rest)) = token.split_once(':') else {
        return match mode {
            FeatureMode::Indexed => Ok(Parsed::Index {
                index: parse_index(token, token)?,
                value: 1.0,
            }),
            FeatureMode::Named => Ok(Parsed::Named {
                field: None,
                name: parse_name(token, token)?,
                value: 1.0,
            }),
        };
    };

    match (rest.split_once(':'), mode) {
        (None, FeatureMode::Indexed) => Ok(Parsed::Index {
            index: parse_index(token, lead)?,
            value: parse_value(token, rest)?,
        }),
        (None, FeatureMode::Named) => Ok(Parsed::Named {
            field: None,
            name: parse_name(token, lead)?,
            value: parse_value(token, rest)?,
        }),
        (Some(_), FeatureMode::Indexed) => Err(FeatureError::UnsupportedFieldSyntax {
            token: token.to_owned(),
        }),
        (Some((mid, tail)), FeatureMode::Named) => Ok(Parsed::Named {
            field: (!lead.is_empty()).then_some(lead),
            name: parse_name(token, mid)?,
            value: parse_value(token, tail)?,
        }),
    }
}

fn parse_index(token: &str, text: &str) -> Result<i32> {
    match text.parse::<i32>() {
        Ok(index) if index >= 0 => Ok(index),
        _ => Err(FeatureError::MalformedIndex {
            token: token.to_owned(),
            text: text.to_owned(),
        }),
    }
}

fn parse_value(token: &str, text: &str) -> Result<f64> {
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(FeatureError::MalformedValue {
            token: token.to_owned(),
            text: text.to_owned(),
        }),
    }
}

fn parse_name<'a>(token: &str, text: &'a str) -> Result<&'a str> {
    if text.is_empty() {
        return Err(FeatureError::EmptyName {
            token: token.to_owned(),
        });
    }
    Ok(text)
}
