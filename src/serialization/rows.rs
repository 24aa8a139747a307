//! Framed binary row files.
//!
//! ```text
//! header: magic "FMFT" | version u8 | mode u8 | reserved u16     (8 bytes)
//! row:    count u32 | payload_len u32 | count feature records    (big-endian)
//! ```
//!
//! Feature records use the layout of [`crate::codec`].  The header records the
//! mode so a file can be opened without out-of-band knowledge; individual
//! records stay untagged.

use std::io::{ErrorKind, Read, Write};

use crate::codec::{total_bytes, ByteReader};
use crate::error::{FeatureError, Result};
use crate::feature::{Feature, FeatureMode};
use crate::row::FeatureArena;

/// Magic bytes identifying a row file.
pub const MAGIC: &[u8; 4] = b"FMFT";

/// Current row file format version.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the file header in bytes.
pub const HEADER_BYTES: usize = 8;

const FRAME_BYTES: usize = 8;

fn encode_header(mode: FeatureMode) -> [u8; HEADER_BYTES] {
    let mut header = [0u8; HEADER_BYTES];
    header[0..4].copy_from_slice(MAGIC);
    header[4] = FORMAT_VERSION;
    header[5] = mode.tag();
    header
}

fn decode_header(header: &[u8; HEADER_BYTES]) -> Result<FeatureMode> {
    if &header[0..4] != MAGIC {
        return Err(FeatureError::InvalidHeader("not a feature row file".into()));
    }
    if header[4] != FORMAT_VERSION {
        return Err(FeatureError::InvalidHeader(format!(
            "unsupported format version {}",
            header[4]
        )));
    }
    FeatureMode::from_tag(header[5])
        .ok_or_else(|| FeatureError::InvalidHeader(format!("unknown mode tag {}", header[5])))
}

/// Streams rows of a single mode into a writer.
#[derive(Debug)]
pub struct RowWriter<W: Write> {
    inner: W,
    mode: FeatureMode,
    buf: Vec<u8>,
    rows: u64,
    bytes_written: u64,
}

impl<W: Write> RowWriter<W> {
    /// Writes the file header and returns a writer for rows of `mode`.
    pub fn new(mut inner: W, mode: FeatureMode) -> Result<Self> {
        inner
            .write_all(&encode_header(mode))
            .map_err(|err| FeatureError::io(err, None))?;
        Ok(Self {
            inner,
            mode,
            buf: Vec::new(),
            rows: 0,
            bytes_written: HEADER_BYTES as u64,
        })
    }

    /// Mode of every row in the file.
    #[must_use]
    pub fn mode(&self) -> FeatureMode {
        self.mode
    }

    /// Number of rows written so far.
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Number of bytes written so far, header included.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Appends one row.  Every feature must match the writer's mode.
    pub fn write_row(&mut self, features: &[Feature]) -> Result<()> {
        if let Some(stray) = features.iter().find(|f| f.mode() != self.mode) {
            return Err(FeatureError::ModeMismatch {
                expected: self.mode,
                found: stray.mode(),
            });
        }
        let payload = total_bytes(features);
        let count = u32::try_from(features.len())
            .map_err(|_| FeatureError::RecordTooLarge { len: features.len() })?;
        let payload_len =
            u32::try_from(payload).map_err(|_| FeatureError::RecordTooLarge { len: payload })?;

        self.buf.clear();
        self.buf.reserve(FRAME_BYTES + payload);
        self.buf.extend_from_slice(&count.to_be_bytes());
        self.buf.extend_from_slice(&payload_len.to_be_bytes());
        for feature in features {
            feature.write_to(&mut self.buf)?;
        }
        self.inner
            .write_all(&self.buf)
            .map_err(|err| FeatureError::io(err, None))?;
        self.rows += 1;
        self.bytes_written += self.buf.len() as u64;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner
            .flush()
            .map_err(|err| FeatureError::io(err, None))?;
        Ok(self.inner)
    }
}

/// Reads rows back from a row file.
#[derive(Debug)]
pub struct RowReader<R: Read> {
    inner: R,
    mode: FeatureMode,
    buf: Vec<u8>,
    rows: u64,
}

impl<R: Read> RowReader<R> {
    /// Reads and validates the file header.
    pub fn new(mut inner: R) -> Result<Self> {
        let mut header = [0u8; HEADER_BYTES];
        inner.read_exact(&mut header).map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                FeatureError::InvalidHeader("file is shorter than the header".into())
            } else {
                FeatureError::io(err, None)
            }
        })?;
        let mode = decode_header(&header)?;
        Ok(Self {
            inner,
            mode,
            buf: Vec::new(),
            rows: 0,
        })
    }

    /// Mode recorded in the file header.
    #[must_use]
    pub fn mode(&self) -> FeatureMode {
        self.mode
    }

    /// Number of rows read so far.
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Decodes the next row into `arena`, returning `None` at the end of the file.
    pub fn next_row<'a>(&mut self, arena: &'a mut FeatureArena) -> Result<Option<&'a [Feature]>> {
        let mut frame = [0u8; FRAME_BYTES];
        if !self.read_frame(&mut frame)? {
            return Ok(None);
        }
        let count = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        let payload_len = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]) as usize;

        self.buf.clear();
        (&mut self.inner)
            .take(payload_len as u64)
            .read_to_end(&mut self.buf)
            .map_err(|err| FeatureError::io(err, None))?;
        if self.buf.len() < payload_len {
            return Err(FeatureError::Truncated { row: self.rows });
        }

        let mut src = ByteReader::new(&self.buf);
        let features = arena.decode_row(&mut src, count, self.mode)?;
        if !src.is_empty() {
            return Err(FeatureError::CorruptRecord {
                offset: src.position(),
                reason: format!(
                    "row {} declares {payload_len} payload bytes but its {count} records use {}",
                    self.rows,
                    src.position()
                ),
            });
        }
        self.rows += 1;
        Ok(Some(features))
    }

    /// Reads every remaining row into owned vectors.
    pub fn read_all(&mut self) -> Result<Vec<Vec<Feature>>> {
        let mut arena = FeatureArena::new();
        let mut rows = Vec::new();
        while let Some(features) = self.next_row(&mut arena)? {
            rows.push(features.to_vec());
        }
        Ok(rows)
    }

    /// Fills `frame`, returning `false` on a clean end of file at a row boundary.
    fn read_frame(&mut self, frame: &mut [u8; FRAME_BYTES]) -> Result<bool> {
        let mut filled = 0;
        while filled < FRAME_BYTES {
            match self.inner.read(&mut frame[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => return Err(FeatureError::Truncated { row: self.rows }),
                Ok(read) => filled += read,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(FeatureError::io(err, None)),
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn row(tokens: &[&str], mode: FeatureMode) -> Vec<Feature> {
        tokens
            .iter()
            .map(|token| parse(token, mode).expect("valid token"))
            .collect()
    }

    fn write_rows(rows: &[Vec<Feature>], mode: FeatureMode) -> Vec<u8> {
        let mut writer = RowWriter::new(Vec::new(), mode).expect("header");
        for features in rows {
            writer.write_row(features).expect("write row");
        }
        writer.finish().expect("finish")
    }

    #[test]
    fn rows_round_trip_through_file_format() {
        let rows = vec![
            row(&["user:alice:1", "item:42:0.5"], FeatureMode::Named),
            Vec::new(),
            row(&["tag"], FeatureMode::Named),
        ];
        let bytes = write_rows(&rows, FeatureMode::Named);
        assert_eq!(&bytes[..4], MAGIC);

        let mut reader = RowReader::new(bytes.as_slice()).expect("header");
        assert_eq!(reader.mode(), FeatureMode::Named);
        assert_eq!(reader.read_all().expect("read rows"), rows);
        assert_eq!(reader.rows(), 3);
    }

    #[test]
    fn writer_counts_bytes() {
        let features = row(&["1:1", "2:2"], FeatureMode::Indexed);
        let mut writer = RowWriter::new(Vec::new(), FeatureMode::Indexed).expect("header");
        writer.write_row(&features).expect("write row");
        assert_eq!(writer.rows(), 1);
        assert_eq!(
            writer.bytes_written(),
            (HEADER_BYTES + FRAME_BYTES + 2 * 12) as u64
        );
        let bytes = writer.finish().expect("finish");
        assert_eq!(bytes.len(), HEADER_BYTES + FRAME_BYTES + 24);
    }

    #[test]
    fn writer_rejects_foreign_variant() {
        let mut writer = RowWriter::new(Vec::new(), FeatureMode::Indexed).expect("header");
        let err = writer
            .write_row(&row(&["name"], FeatureMode::Named))
            .unwrap_err();
        assert!(matches!(
            err,
            FeatureError::ModeMismatch {
                expected: FeatureMode::Indexed,
                found: FeatureMode::Named
            }
        ));
        assert_eq!(writer.rows(), 0);
    }

    #[test]
    fn truncated_files_fail() {
        let rows = vec![row(&["1:1", "2:2"], FeatureMode::Indexed)];
        let bytes = write_rows(&rows, FeatureMode::Indexed);
        let mut arena = FeatureArena::new();

        let cut_payload = &bytes[..bytes.len() - 1];
        let mut reader = RowReader::new(cut_payload).expect("header");
        assert!(matches!(
            reader.next_row(&mut arena),
            Err(FeatureError::Truncated { row: 0 })
        ));

        let cut_frame = &bytes[..HEADER_BYTES + 3];
        let mut reader = RowReader::new(cut_frame).expect("header");
        assert!(matches!(
            reader.next_row(&mut arena),
            Err(FeatureError::Truncated { row: 0 })
        ));

        assert!(matches!(
            RowReader::new(&bytes[..5]),
            Err(FeatureError::InvalidHeader(_))
        ));
    }

    #[test]
    fn header_is_validated() {
        let mut bytes = write_rows(&[], FeatureMode::Indexed);
        bytes[5] = 9;
        assert!(matches!(
            RowReader::new(bytes.as_slice()),
            Err(FeatureError::InvalidHeader(message)) if message.contains("mode")
        ));
        assert!(matches!(
            RowReader::new(&b"JUNKJUNK"[..]),
            Err(FeatureError::InvalidHeader(_))
        ));
    }

    #[test]
    fn payload_length_must_match_records() {
        let rows = vec![row(&["3:1"], FeatureMode::Indexed)];
        let mut bytes = write_rows(&rows, FeatureMode::Indexed);
        // Claim one extra payload byte and append it.
        bytes[HEADER_BYTES + 7] += 1;
        bytes.push(0);
        let mut reader = RowReader::new(bytes.as_slice()).expect("header");
        let mut arena = FeatureArena::new();
        assert!(matches!(
            reader.next_row(&mut arena),
            Err(FeatureError::CorruptRecord { offset: 12, .. })
        ));
    }
}
