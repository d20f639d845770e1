//! Flat parameter blob (`coefficients.bin`).
//!
//! The blob holds two consecutive data buffers, each framed as
//! `{utf allocation mode, i64 length, utf element type}` followed by
//! `length` raw big-endian elements. The first buffer is the array's shape
//! information; the second holds the parameters themselves.

use crate::ir::DataType;
use crate::loader::binary::BinaryReader;
use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};
use tracing::debug;

pub const DEFAULT_ALLOCATION_MODE: &str = "HEAP";

/// Header of one framed data buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBufferHeader {
    pub allocation_mode: String,
    pub length: usize,
    pub data_type_tag: String,
    pub data_type: DataType,
    pub values_offset: usize,
    pub values_byte_len: usize,
}

impl DataBufferHeader {
    pub fn end(&self) -> usize {
        self.values_offset + self.values_byte_len
    }
}

/// Parses one buffer header at `offset` and checks that its payload fits.
pub fn parse_data_buffer(reader: &BinaryReader, offset: usize) -> Option<DataBufferHeader> {
    let alloc = reader.read_utf(offset);
    if alloc.value.is_empty() {
        return None;
    }
    let length = reader.read_long(alloc.next);
    if length.value <= 0 {
        return None;
    }
    let tag = reader.read_utf(length.next);
    if tag.value.is_empty() {
        return None;
    }

    let data_type = DataType::from_tag(&tag.value);
    let element_size = data_type.element_size()?;
    let length = usize::try_from(length.value).ok()?;
    let values_byte_len = length.checked_mul(element_size)?;
    let end = tag.next.checked_add(values_byte_len)?;
    if end > reader.len() {
        return None;
    }

    Some(DataBufferHeader {
        allocation_mode: alloc.value,
        length,
        data_type_tag: tag.value,
        data_type,
        values_offset: tag.next,
        values_byte_len,
    })
}

/// Recovers the flat parameter array, or `None` when the blob does not have
/// the expected two-buffer layout.
pub fn extract_flat_weights(blob: &[u8]) -> Option<Vec<f32>> {
    let reader = BinaryReader::new(blob);

    let shape = parse_data_buffer(&reader, 0)?;
    let data = parse_data_buffer(&reader, shape.end())?;

    let values = match data.data_type {
        DataType::Float => reader.read_f32_run(data.values_offset, data.length),
        DataType::Double => reader.read_f64_run_as_f32(data.values_offset, data.length),
        other => {
            debug!(data_type = ?other, "weight buffer is not floating point");
            None
        }
    }?;

    debug!(
        shape_elements = shape.length,
        values = values.len(),
        data_type = %data.data_type_tag,
        "decoded weight blob"
    );
    Some(values)
}

/// Parameter count guessed from the raw byte length when the blob cannot be
/// decoded: one `f32` per four bytes.
pub fn estimate_float_count(byte_len: usize) -> Option<u64> {
    if byte_len % 4 == 0 {
        Some((byte_len / 4) as u64)
    } else {
        None
    }
}

fn write_utf<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "string too long"))?;
    w.write_u16::<BigEndian>(len)?;
    w.write_all(s.as_bytes())
}

/// Writes `values` in the two-buffer layout: a LONG shape buffer holding
/// `[rank, dims...]` followed by a FLOAT data buffer.
pub fn write_flat_weights<W: Write>(w: &mut W, shape: &[i64], values: &[f32]) -> io::Result<()> {
    let mut shape_info = Vec::with_capacity(shape.len() + 1);
    shape_info.push(shape.len() as i64);
    shape_info.extend_from_slice(shape);

    write_utf(w, DEFAULT_ALLOCATION_MODE)?;
    w.write_i64::<BigEndian>(shape_info.len() as i64)?;
    write_utf(w, "LONG")?;
    for v in &shape_info {
        w.write_i64::<BigEndian>(*v)?;
    }

    write_utf(w, DEFAULT_ALLOCATION_MODE)?;
    w.write_i64::<BigEndian>(values.len() as i64)?;
    write_utf(w, "FLOAT")?;
    for v in values {
        w.write_f32::<BigEndian>(*v)?;
    }
    Ok(())
}

pub fn encode_flat_weights(shape: &[i64], values: &[f32]) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(64 + values.len() * 4);
    write_flat_weights(&mut buf, shape, values)?;
    Ok(buf)
}
