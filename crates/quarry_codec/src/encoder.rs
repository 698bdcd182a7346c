//! Canonical CBOR encoder for records.

use crate::value::Value;

/// Encode a record (a row of values) as a CBOR array.
///
/// Integers use the shortest encoding, floats are always written as
/// 64-bit IEEE 754 (`0xfb`), blobs are byte strings and strings are
/// text strings. No indefinite-length items are produced.
#[must_use]
pub fn to_cbor_record(values: &[Value]) -> Vec<u8> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode_record(values);
    encoder.into_bytes()
}

/// Encode a batch of records as a CBOR array of arrays.
#[must_use]
pub fn to_cbor_records(records: &[Vec<Value>]) -> Vec<u8> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode_array_header(records.len());
    for record in records {
        encoder.encode_record(record);
    }
    encoder.into_bytes()
}

/// A canonical CBOR encoder.
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode one value.
    pub fn encode(&mut self, value: &Value) {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Int(n) => self.encode_integer(*n),
            Value::Float(x) => {
                self.buffer.push(0xfb);
                self.buffer.extend_from_slice(&x.to_bits().to_be_bytes());
            }
            Value::Text(s) => {
                self.encode_unsigned(3, s.len() as u64);
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Blob(b) => {
                self.encode_unsigned(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
        }
    }

    /// Encode a record as an array of values.
    pub fn encode_record(&mut self, values: &[Value]) {
        self.encode_array_header(values.len());
        for value in values {
            self.encode(value);
        }
    }

    /// Write an array header announcing `len` items.
    pub fn encode_array_header(&mut self, len: usize) {
        self.encode_unsigned(4, len as u64);
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_unsigned(0, n as u64);
        } else {
            // CBOR negative integers encode -(n+1)
            let abs_minus_one = (-(n + 1)) as u64;
            self.encode_unsigned(1, abs_minus_one);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}
