//! Big-endian framed record reader.
//!
//! Reads never fail hard: an out-of-bounds read returns an empty or zero
//! value and leaves the offset where it was, so callers detect "cannot
//! decode further" by comparing offsets.

use byteorder::{BigEndian, ByteOrder};

/// A decoded value together with the offset of the next unread byte.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub next: usize,
}

impl<T> Decoded<T> {
    fn at(value: T, next: usize) -> Self {
        Self { value, next }
    }
}

pub struct BinaryReader<'a> {
    data: &'a [u8],
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn slice(&self, offset: usize, len: usize) -> Option<&'a [u8]> {
        let end = offset.checked_add(len)?;
        self.data.get(offset..end)
    }

    /// Length-prefixed string: 2-byte big-endian length, then that many
    /// single-byte characters. Only the ASCII subset of modified UTF-8 is
    /// honoured; other bytes map to their Latin-1 code points.
    pub fn read_utf(&self, offset: usize) -> Decoded<String> {
        let len = match self.slice(offset, 2) {
            Some(b) => BigEndian::read_u16(b) as usize,
            None => return Decoded::at(String::new(), offset),
        };
        match self.slice(offset + 2, len) {
            Some(bytes) => Decoded::at(bytes.iter().map(|&b| b as char).collect(), offset + 2 + len),
            None => Decoded::at(String::new(), offset),
        }
    }

    /// 8-byte big-endian signed integer.
    pub fn read_long(&self, offset: usize) -> Decoded<i64> {
        match self.slice(offset, 8) {
            Some(b) => Decoded::at(BigEndian::read_i64(b), offset + 8),
            None => Decoded::at(0, offset),
        }
    }

    pub fn read_f32(&self, offset: usize) -> Option<f32> {
        self.slice(offset, 4).map(BigEndian::read_f32)
    }

    pub fn read_f64(&self, offset: usize) -> Option<f64> {
        self.slice(offset, 8).map(BigEndian::read_f64)
    }

    /// `count` consecutive big-endian `f32`s starting at `offset`.
    pub fn read_f32_run(&self, offset: usize, count: usize) -> Option<Vec<f32>> {
        let bytes = self.slice(offset, count.checked_mul(4)?)?;
        let mut values = vec![0f32; count];
        BigEndian::read_f32_into(bytes, &mut values);
        Some(values)
    }

    /// `count` consecutive big-endian `f64`s narrowed to `f32`.
    pub fn read_f64_run_as_f32(&self, offset: usize, count: usize) -> Option<Vec<f32>> {
        let bytes = self.slice(offset, count.checked_mul(8)?)?;
        Some(bytes.chunks_exact(8).map(|c| BigEndian::read_f64(c) as f32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_utf() {
        let data = [0, 4, b'H', b'E', b'A', b'P', 0xff];
        let reader = BinaryReader::new(&data);

        let s = reader.read_utf(0);

        assert_eq!(s.value, "HEAP");
        assert_eq!(s.next, 6);
    }

    #[test]
    fn test_read_utf_out_of_bounds_leaves_offset() {
        let data = [0, 10, b'A', b'B'];
        let reader = BinaryReader::new(&data);

        assert_eq!(reader.read_utf(0), Decoded { value: String::new(), next: 0 });
        assert_eq!(reader.read_utf(3), Decoded { value: String::new(), next: 3 });
        assert_eq!(reader.read_utf(99).next, 99);
    }

    #[test]
    fn test_read_long() {
        let mut data = vec![0xAA];
        data.extend_from_slice(&300i64.to_be_bytes());
        let reader = BinaryReader::new(&data);

        assert_eq!(reader.read_long(1), Decoded { value: 300, next: 9 });
        assert_eq!(reader.read_long(2), Decoded { value: 0, next: 2 });
    }

    #[test]
    fn test_float_runs() {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_be_bytes());
        data.extend_from_slice(&(-2.25f32).to_be_bytes());
        let reader = BinaryReader::new(&data);

        assert_eq!(reader.read_f32_run(0, 2), Some(vec![1.5, -2.25]));
        assert_eq!(reader.read_f32_run(0, 3), None);
        assert_eq!(reader.read_f32(4), Some(-2.25));

        let doubles = 0.1f64.to_be_bytes();
        let reader = BinaryReader::new(&doubles);
        assert_eq!(reader.read_f64_run_as_f32(0, 1), Some(vec![0.1f32]));
        assert_eq!(reader.read_f64(0), Some(0.1));
    }
}
