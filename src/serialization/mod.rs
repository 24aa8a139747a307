//! Helpers for persisting rows of features as binary row files or text.

pub mod rows;
pub mod text;

pub use rows::{RowReader, RowWriter};
pub use text::{decode_to_text, encode_text, format_row, split_tokens};
