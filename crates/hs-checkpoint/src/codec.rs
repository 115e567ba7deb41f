//! Checkpoint header and payload layout. Pure offset math, no I/O.

use std::ops::Range;

use hs_model::GridModel;
use serde::Serialize;

/// "HPMD"
pub const MAGIC: i32 = 0x4850_4D44;

const HEADER_INTS: usize = 6;
pub const HEADER_BYTES: usize = HEADER_INTS * size_of::<i32>();

const F64: usize = size_of::<f64>();

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("file too short for a header ({len} bytes)")]
    Truncated { len: u64 },

    #[error("bad magic {found:#010x}")]
    BadMagic { found: i32 },

    #[error("last invocation index is {found}, expected {expected}")]
    IndexMismatch { found: i32, expected: i32 },

    #[error(
        "grid {}x{}x{} does not match model {}x{}x{}",
        .found.0, .found.1, .found.2, .expected.0, .expected.1, .expected.2
    )]
    DimensionMismatch {
        found: (i32, i32, i32),
        expected: (i32, i32, i32),
    },

    #[error("{found} extra nodes, model has {expected}")]
    ExtraMismatch { found: i32, expected: i32 },

    #[error("file is {found} bytes, layout needs {expected}")]
    SizeMismatch { found: u64, expected: u64 },

    #[error("{what} does not fit the header")]
    Overflow { what: &'static str },

    #[error("payload is not aligned for f64 access")]
    Misaligned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    pub magic: i32,
    pub last_index: i32,
    pub layers: i32,
    pub rows: i32,
    pub cols: i32,
    pub extra: i32,
}

fn to_i32(v: usize, what: &'static str) -> Result<i32, HeaderError> {
    i32::try_from(v).map_err(|_| HeaderError::Overflow { what })
}

impl Header {
    pub fn new(last_index: u32, layout: &Layout) -> Result<Self, HeaderError> {
        Ok(Self {
            magic: MAGIC,
            last_index: i32::try_from(last_index).map_err(|_| HeaderError::Overflow {
                what: "invocation index",
            })?,
            layers: to_i32(layout.layers, "layer count")?,
            rows: to_i32(layout.rows, "row count")?,
            cols: to_i32(layout.cols, "column count")?,
            extra: to_i32(layout.extra, "extra node count")?,
        })
    }

    pub fn to_ints(&self) -> [i32; HEADER_INTS] {
        [
            self.magic,
            self.last_index,
            self.layers,
            self.rows,
            self.cols,
            self.extra,
        ]
    }

    pub fn encode(&self) -> [u8; HEADER_BYTES] {
        let mut out = [0u8; HEADER_BYTES];
        out.copy_from_slice(bytemuck::cast_slice(&self.to_ints()));
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderError> {
        let raw = bytes.get(..HEADER_BYTES).ok_or(HeaderError::Truncated {
            len: bytes.len() as u64,
        })?;
        let [magic, last_index, layers, rows, cols, extra] =
            bytemuck::pod_read_unaligned::<[i32; HEADER_INTS]>(raw);
        Ok(Self {
            magic,
            last_index,
            layers,
            rows,
            cols,
            extra,
        })
    }

    /// Byte range of the last invocation index inside the header.
    pub fn index_range() -> Range<usize> {
        size_of::<i32>()..2 * size_of::<i32>()
    }

    /// Check a decoded header against the consuming model, the file size
    /// and the predecessor invocation index. Magic first, then the index,
    /// then the geometry.
    pub fn validate(&self, layout: &Layout, file_len: u64, expected_index: u32) -> Result<(), HeaderError> {
        if self.magic != MAGIC {
            return Err(HeaderError::BadMagic { found: self.magic });
        }
        let expected = Header::new(expected_index, layout)?;
        if self.last_index != expected.last_index {
            return Err(HeaderError::IndexMismatch {
                found: self.last_index,
                expected: expected.last_index,
            });
        }
        let dims = (self.layers, self.rows, self.cols);
        let want = (expected.layers, expected.rows, expected.cols);
        if dims != want {
            return Err(HeaderError::DimensionMismatch {
                found: dims,
                expected: want,
            });
        }
        if self.extra != expected.extra {
            return Err(HeaderError::ExtraMismatch {
                found: self.extra,
                expected: expected.extra,
            });
        }
        let size = layout.total_size() as u64;
        if file_len != size {
            return Err(HeaderError::SizeMismatch {
                found: file_len,
                expected: size,
            });
        }
        Ok(())
    }
}

/// Section sizes of a checkpoint for one model geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub layers: usize,
    pub rows: usize,
    pub cols: usize,
    pub extra: usize,
    pub total_blocks: usize,
}

impl Layout {
    pub fn for_model(model: &GridModel) -> Self {
        let dims = model.dims();
        Self {
            layers: dims.layers,
            rows: dims.rows,
            cols: dims.cols,
            extra: model.extra_nodes(),
            total_blocks: model.total_blocks(),
        }
    }

    pub fn cuboid_len(&self) -> usize {
        self.layers * self.rows * self.cols
    }

    /// Cell field plus extra nodes, contiguous in the payload.
    pub fn trans_len(&self) -> usize {
        self.cuboid_len() + self.extra
    }

    pub fn temp_len(&self) -> usize {
        self.total_blocks + self.extra
    }

    pub fn payload_len(&self) -> usize {
        self.trans_len() + self.temp_len()
    }

    pub fn cuboid_range(&self) -> Range<usize> {
        HEADER_BYTES..HEADER_BYTES + self.cuboid_len() * F64
    }

    pub fn extra_range(&self) -> Range<usize> {
        let start = self.cuboid_range().end;
        start..start + self.extra * F64
    }

    pub fn temp_range(&self) -> Range<usize> {
        let start = self.extra_range().end;
        start..start + self.temp_len() * F64
    }

    pub fn total_size(&self) -> usize {
        self.temp_range().end
    }

    /// Payload index of cell `(l, r, c)`.
    pub fn cuboid_index(&self, l: usize, r: usize, c: usize) -> Option<usize> {
        (l < self.layers && r < self.rows && c < self.cols).then(|| (l * self.rows + r) * self.cols + c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout {
            layers: 2,
            rows: 4,
            cols: 4,
            extra: 12,
            total_blocks: 3,
        }
    }

    #[test]
    fn sections_follow_each_other() {
        let l = layout();
        assert_eq!(l.cuboid_range(), 24..24 + 32 * 8);
        assert_eq!(l.extra_range().start, l.cuboid_range().end);
        assert_eq!(l.temp_range().len(), 15 * 8);
        assert_eq!(l.total_size(), 24 + (32 + 12 + 15) * 8);
        assert_eq!(l.payload_len() * 8 + HEADER_BYTES, l.total_size());
        assert_eq!(l.cuboid_index(1, 3, 3), Some(31));
        assert_eq!(l.cuboid_index(2, 0, 0), None);
    }

    #[test]
    fn header_bytes_are_native_i32s() {
        let h = Header::new(7, &layout()).unwrap();
        let bytes = h.encode();
        assert_eq!(&bytes[..4], &MAGIC.to_ne_bytes());
        assert_eq!(&bytes[Header::index_range()], &7i32.to_ne_bytes());
        assert_eq!(Header::decode(&bytes).unwrap(), h);
    }

    #[test]
    fn magic_spells_hpmd() {
        assert_eq!(MAGIC.to_be_bytes(), *b"HPMD");
    }

    #[test]
    fn validation_order_and_checks() {
        let l = layout();
        let size = l.total_size() as u64;
        let good = Header::new(1, &l).unwrap();
        good.validate(&l, size, 1).unwrap();

        let bad_magic = Header { magic: 0, ..good };
        assert!(matches!(
            bad_magic.validate(&l, size, 9),
            Err(HeaderError::BadMagic { found: 0 })
        ));
        assert_eq!(
            good.validate(&l, size, 2),
            Err(HeaderError::IndexMismatch {
                found: 1,
                expected: 2
            })
        );

        let wide = Layout { cols: 8, ..l };
        assert!(matches!(
            good.validate(&wide, wide.total_size() as u64, 1),
            Err(HeaderError::DimensionMismatch { .. })
        ));

        let secondary = Layout { extra: 28, ..l };
        assert!(matches!(
            good.validate(&secondary, secondary.total_size() as u64, 1),
            Err(HeaderError::ExtraMismatch { found: 12, expected: 28 })
        ));

        assert!(matches!(
            good.validate(&l, size - 8, 1),
            Err(HeaderError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn short_buffer_has_no_header() {
        assert!(matches!(
            Header::decode(&[0u8; 10]),
            Err(HeaderError::Truncated { len: 10 })
        ));
    }
}
