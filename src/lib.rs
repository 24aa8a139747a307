//! Sparse feature parsing and binary row codec for factorization machine training.
//!
//! The crate turns textual feature tokens such as `42:0.5` or
//! `user:alice:1.0` into typed [`Feature`] values, and encodes those values
//! into a compact big-endian wire format.  Rows of tokens are parsed through
//! [`parse_row`] or, when the same buffers should be reused row after row,
//! through a [`FeatureArena`].
//!
//! ```
//! use fmfeature::{codec, parse, FeatureArena, FeatureMode};
//!
//! # fn main() -> fmfeature::Result<()> {
//! let feature = parse("user:alice:1.5", FeatureMode::Named)?;
//! assert_eq!(feature.byte_size(), 4 + 4 + 4 + 5 + 8);
//!
//! let mut arena = FeatureArena::new();
//! let row = vec![Some("1:0.5"), None, Some("7")];
//! let features = arena.parse_row(Some(&row), FeatureMode::Indexed)?.unwrap_or_default();
//! let bytes = codec::encode_features(features)?;
//! assert_eq!(bytes.len(), codec::total_bytes(features));
//! let decoded = codec::decode_features(&bytes, FeatureMode::Indexed)?;
//! assert_eq!(decoded.as_slice(), features);
//! # Ok(())
//! # }
//! ```
//!
//! The `fmfeat` command line interface is enabled by default through the `cli`
//! feature.  Library users can disable default features to avoid the CLI
//! dependencies: `fmfeature = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod codec;
pub mod config;
pub mod error;
pub mod feature;
pub mod metrics;
pub mod parser;
pub mod row;
pub mod serialization;

pub use codec::{total_bytes, ByteReader};
pub use config::{ConvertBuilder, ConvertConfig};
pub use error::{FeatureError, Result};
pub use feature::{Feature, FeatureMode, IndexFeature, NamedFeature};
pub use metrics::{ArenaStats, ConvertSummary};
pub use parser::{parse, parse_into};
pub use row::{parse_row, FeatureArena, TokenRow};
