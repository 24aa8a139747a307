//! Binary wire format for features.
//!
//! Records are not self-describing: the reader must be told which
//! [`FeatureMode`] the writer used.  All integers and doubles are big-endian.
//!
//! ```text
//! indexed: index i32 | value f64                                  (12 bytes)
//! named:   len i32 | field bytes | len i32 | name bytes | value f64
//! ```
//!
//! An absent field is written with length `0`.

use crate::error::{FeatureError, Result};
use crate::feature::{Feature, FeatureMode, IndexFeature, NamedFeature};

/// Size of an encoded index feature.
pub const INDEX_RECORD_BYTES: usize = 12;

const LEN_BYTES: usize = 4;
const VALUE_BYTES: usize = 8;

/// Forward-only cursor over an encoded buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `buf`.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the buffer.
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes not yet consumed.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns `true` once every byte has been consumed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8]> {
        if needed > self.remaining() {
            return Err(FeatureError::DecodeUnderrun {
                offset: self.pos,
                needed,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(bytes)
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(i32::from_be_bytes(raw))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(f64::from_be_bytes(raw))
    }

    fn read_str(&mut self) -> Result<&'a str> {
        let offset = self.pos;
        let len = self.read_i32()?;
        let len = usize::try_from(len).map_err(|_| FeatureError::CorruptRecord {
            offset,
            reason: format!("negative string length {len}"),
        })?;
        let offset = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|err| FeatureError::CorruptRecord {
            offset,
            reason: format!("invalid UTF-8: {err}"),
        })
    }
}

/// A decoded record still borrowing from the source buffer.
enum Record<'a> {
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

fn read_record<'a>(src: &mut ByteReader<'a>, mode: FeatureMode) -> Result<Record<'a>> {
    match mode {
        FeatureMode::Indexed => {
            let offset = src.position();
            let index = src.read_i32()?;
            if index < 0 {
                return Err(FeatureError::CorruptRecord {
                    offset,
                    reason: format!("negative feature index {index}"),
                });
            }
            let value = read_value(src)?;
            Ok(Record::Index { index, value })
        }
        FeatureMode::Named => {
            let field = src.read_str()?;
            let offset = src.position();
            let name = src.read_str()?;
            if name.is_empty() {
                return Err(FeatureError::CorruptRecord {
                    offset,
                    reason: "empty feature name".into(),
                });
            }
            let value = read_value(src)?;
            Ok(Record::Named {
                field: (!field.is_empty()).then_some(field),
                name,
                value,
            })
        }
    }
}

fn read_value(src: &mut ByteReader<'_>) -> Result<f64> {
    let offset = src.position();
    let value = src.read_f64()?;
    if !value.is_finite() {
        return Err(FeatureError::CorruptRecord {
            offset,
            reason: format!("non-finite feature value {value}"),
        });
    }
    Ok(value)
}

/// Reads one record, restoring the reader position if decoding fails.
fn read_atomic<'a>(src: &mut ByteReader<'a>, mode: FeatureMode) -> Result<Record<'a>> {
    let start = src.pos;
    let record = read_record(src, mode);
    if record.is_err() {
        src.pos = start;
    }
    record
}

fn length_prefix(len: usize) -> Result<[u8; LEN_BYTES]> {
    let len = i32::try_from(len).map_err(|_| FeatureError::RecordTooLarge { len })?;
    Ok(len.to_be_bytes())
}

impl Feature {
    /// Exact number of bytes [`Feature::write_to`] appends.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        match self {
            Feature::Index(_) => INDEX_RECORD_BYTES,
            Feature::Named(f) => {
                let field = f.field.as_deref().map_or(0, str::len);
                LEN_BYTES + field + LEN_BYTES + f.name.len() + VALUE_BYTES
            }
        }
    }

    /// Appends the encoded record to `dst`.
    ///
    /// Nothing is appended when the record cannot be encoded.
    pub fn write_to(&self, dst: &mut Vec<u8>) -> Result<()> {
        match self {
            Feature::Index(f) => {
                dst.extend_from_slice(&f.index.to_be_bytes());
                dst.extend_from_slice(&f.value.to_be_bytes());
            }
            Feature::Named(f) => {
                let field = f.field.as_deref().unwrap_or("");
                let field_len = length_prefix(field.len())?;
                let name_len = length_prefix(f.name.len())?;
                dst.reserve(self.byte_size());
                dst.extend_from_slice(&field_len);
                dst.extend_from_slice(field.as_bytes());
                dst.extend_from_slice(&name_len);
                dst.extend_from_slice(f.name.as_bytes());
                dst.extend_from_slice(&f.value.to_be_bytes());
            }
        }
        Ok(())
    }

    /// Decodes one record of the given mode into a new feature.
    pub fn read_from(src: &mut ByteReader<'_>, mode: FeatureMode) -> Result<Feature> {
        Ok(match read_atomic(src, mode)? {
            Record::Index { index, value } => Feature::Index(IndexFeature { index, value }),
            Record::Named { field, name, value } => Feature::Named(NamedFeature {
                name: name.to_owned(),
                field: field.map(str::to_owned),
                value,
            }),
        })
    }

    /// Decodes one record into `self`, reusing its buffers when the variant matches.
    ///
    /// On error `self` is left unchanged.
    pub fn read_into(&mut self, src: &mut ByteReader<'_>, mode: FeatureMode) -> Result<()> {
        match read_atomic(src, mode)? {
            Record::Index { index, value } => self.overwrite_index(index, value),
            Record::Named { field, name, value } => self.overwrite_named(field, name, value),
        }
        Ok(())
    }
}

/// Sum of [`Feature::byte_size`] over `features`, used to size write buffers.
#[must_use]
pub fn total_bytes(features: &[Feature]) -> usize {
    features.iter().map(Feature::byte_size).sum()
}

/// Encodes `features` back to back into a buffer sized with [`total_bytes`].
pub fn encode_features(features: &[Feature]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(total_bytes(features));
    for feature in features {
        feature.write_to(&mut buf)?;
    }
    Ok(buf)
}

/// Decodes records of `mode` until `bytes` is exhausted.
pub fn decode_features(bytes: &[u8], mode: FeatureMode) -> Result<Vec<Feature>> {
    let mut src = ByteReader::new(bytes);
    let mut features = Vec::new();
    while !src.is_empty() {
        features.push(Feature::read_from(&mut src, mode)?);
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(i: i32, v: f64) -> Feature {
        IndexFeature::new(i, v).expect("valid").into()
    }

    fn named(field: Option<&str>, name: &str, v: f64) -> Feature {
        match field {
            Some(field) => NamedFeature::with_field(field, name, v),
            None => NamedFeature::new(name, v),
        }
        .expect("valid")
        .into()
    }

    #[test]
    fn index_layout_is_big_endian() {
        let mut buf = Vec::new();
        index(258, 1.0).write_to(&mut buf).unwrap();
        assert_eq!(
            buf,
            [0, 0, 1, 2, 0x3F, 0xF0, 0, 0, 0, 0, 0, 0],
            "i32 index followed by f64 value"
        );
        assert_eq!(index(258, 1.0).byte_size(), 12);
    }

    #[test]
    fn named_layout_prefixes_lengths() {
        let feature = named(Some("ab"), "xyz", -2.0);
        let mut buf = Vec::new();
        feature.write_to(&mut buf).unwrap();
        let mut expected = vec![0, 0, 0, 2, b'a', b'b', 0, 0, 0, 3, b'x', b'y', b'z'];
        expected.extend_from_slice(&(-2.0f64).to_be_bytes());
        assert_eq!(buf, expected);
        assert_eq!(feature.byte_size(), 4 + 2 + 4 + 3 + 8);

        let bare = named(None, "é", 1.0);
        assert_eq!(bare.byte_size(), 4 + 4 + 2 + 8);
        let mut buf = Vec::new();
        bare.write_to(&mut buf).unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 0]);
    }

    #[test]
    fn round_trip_consumes_exactly_byte_size() {
        let cases = [
            (index(0, 0.0), FeatureMode::Indexed),
            (index(i32::MAX, -1.5e300), FeatureMode::Indexed),
            (named(None, "word", 3.25), FeatureMode::Named),
            (named(Some("user"), "ユーザー", 1e-9), FeatureMode::Named),
        ];
        for (feature, mode) in cases {
            let mut buf = Vec::new();
            feature.write_to(&mut buf).unwrap();
            buf.extend_from_slice(b"trailer");
            let mut src = ByteReader::new(&buf);
            let decoded = Feature::read_from(&mut src, mode).unwrap();
            assert_eq!(decoded, feature);
            assert_eq!(src.position(), feature.byte_size());
            assert_eq!(src.remaining(), b"trailer".len());
        }
    }

    #[test]
    fn underrun_is_an_error_and_restores_position() {
        let mut buf = Vec::new();
        named(Some("f"), "name", 1.0).write_to(&mut buf).unwrap();
        let truncated = &buf[..buf.len() - 3];
        let mut src = ByteReader::new(truncated);
        let err = Feature::read_from(&mut src, FeatureMode::Named).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::DecodeUnderrun { needed: 8, remaining: 5, .. }
        ));
        assert_eq!(src.position(), 0);

        let mut src = ByteReader::new(&[0, 0, 0]);
        assert!(matches!(
            Feature::read_from(&mut src, FeatureMode::Indexed),
            Err(FeatureError::DecodeUnderrun { offset: 0, needed: 4, remaining: 3 })
        ));
    }

    #[test]
    fn corrupt_records_are_rejected() {
        let mut negative_index = (-5i32).to_be_bytes().to_vec();
        negative_index.extend_from_slice(&1.0f64.to_be_bytes());
        assert!(matches!(
            decode_features(&negative_index, FeatureMode::Indexed),
            Err(FeatureError::CorruptRecord { offset: 0, .. })
        ));

        let mut nan_value = 3i32.to_be_bytes().to_vec();
        nan_value.extend_from_slice(&f64::NAN.to_be_bytes());
        assert!(matches!(
            decode_features(&nan_value, FeatureMode::Indexed),
            Err(FeatureError::CorruptRecord { offset: 4, .. })
        ));

        let bad_utf8 = [0, 0, 0, 0, 0, 0, 0, 1, 0xFF, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            decode_features(&bad_utf8, FeatureMode::Named),
            Err(FeatureError::CorruptRecord { offset: 8, .. })
        ));

        let negative_len = [0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(
            decode_features(&negative_len, FeatureMode::Named),
            Err(FeatureError::CorruptRecord { offset: 0, .. })
        ));
    }

    #[test]
    fn read_into_reuses_slot() {
        let features = vec![named(Some("a"), "b", 1.0), named(None, "c", 2.0)];
        let bytes = encode_features(&features).unwrap();
        let mut src = ByteReader::new(&bytes);
        let mut slot = index(1, 1.0);
        for expected in &features {
            slot.read_into(&mut src, FeatureMode::Named).unwrap();
            assert_eq!(&slot, expected);
        }
        assert!(src.is_empty());
    }

    #[test]
    fn total_bytes_sums_record_sizes() {
        let features = [index(1, 1.0), index(2, 2.0), index(3, 3.0)];
        assert_eq!(total_bytes(&features), 36);
        let named_features = [named(None, "a", 1.0), named(Some("ff"), "bbb", 1.0)];
        assert_eq!(
            total_bytes(&named_features),
            named_features[0].byte_size() + named_features[1].byte_size()
        );
        assert_eq!(total_bytes(&[]), 0);

        let encoded = encode_features(&named_features).unwrap();
        assert_eq!(encoded.len(), total_bytes(&named_features));
        assert_eq!(
            decode_features(&encoded, FeatureMode::Named).unwrap(),
            named_features
        );
    }

    #[test]
    fn oversized_lengths_are_rejected_before_writing() {
        assert_eq!(length_prefix(5).unwrap(), [0, 0, 0, 5]);
        assert_eq!(length_prefix(i32::MAX as usize).unwrap(), i32::MAX.to_be_bytes());
        let too_long = i32::MAX as usize + 1;
        assert!(matches!(
            length_prefix(too_long),
            Err(FeatureError::RecordTooLarge { len }) if len == too_long
        ));
    }

    #[test]
    fn writing_does_not_mutate_source() {
        let feature = named(Some("f"), "n", 0.5);
        let snapshot = feature.clone();
        let mut buf = Vec::new();
        feature.write_to(&mut buf).unwrap();
        feature.write_to(&mut buf).unwrap();
        assert_eq!(feature, snapshot);
        assert_eq!(buf.len(), 2 * feature.byte_size());
    }
}
