//! Canonical CBOR decoder for records.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Maximum allowed element count for arrays.
/// This prevents allocation-based DoS from corrupted input.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed byte/string length.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

/// Decode a record previously written by [`crate::to_cbor_record`].
///
/// # Errors
///
/// Returns an error if the bytes are not a canonical CBOR array of
/// supported values or if bytes remain after the array.
pub fn from_cbor_record(bytes: &[u8]) -> CodecResult<Vec<Value>> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let record = decoder.decode_record()?;
    decoder.finish()?;
    Ok(record)
}

/// Decode a batch previously written by [`crate::to_cbor_records`].
///
/// # Errors
///
/// Returns an error on malformed input or trailing bytes.
pub fn from_cbor_records(bytes: &[u8]) -> CodecResult<Vec<Vec<Value>>> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let len = decoder.decode_array_header()?;
    let mut records = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        records.push(decoder.decode_record()?);
    }
    decoder.finish()?;
    Ok(records)
}

/// A canonical CBOR decoder.
///
/// Rejects non-shortest integer encodings, indefinite-length items and
/// floats narrower than 64 bits.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    #[allow(clippy::cast_possible_wrap)]
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => {
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n)
                    .map(Value::Int)
                    .map_err(|_| CodecError::decoding_failed("integer out of range"))
            }
            1 => {
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n)
                    .map(|n| Value::Int(-n - 1))
                    .map_err(|_| CodecError::decoding_failed("integer out of range"))
            }
            2 => {
                let bytes = self.decode_string(additional_info)?;
                Ok(Value::Blob(bytes.to_vec()))
            }
            3 => {
                let bytes = self.decode_string(additional_info)?;
                let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Value::Text(text.to_string()))
            }
            4 => Err(CodecError::unsupported_type("nested array")),
            5 => Err(CodecError::unsupported_type("map")),
            6 => Err(CodecError::unsupported_type("tag")),
            7 => self.decode_simple(additional_info),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    /// Decode an array of values.
    pub fn decode_record(&mut self) -> CodecResult<Vec<Value>> {
        let len = self.decode_array_header()?;
        let mut values = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            values.push(self.decode()?);
        }
        Ok(values)
    }

    /// Decode an array header and return the announced item count.
    pub fn decode_array_header(&mut self) -> CodecResult<usize> {
        let initial_byte = self.read_byte()?;
        if initial_byte >> 5 != 4 {
            return Err(CodecError::invalid_structure("expected array"));
        }
        let additional_info = initial_byte & 0x1f;
        if additional_info == 31 {
            return Err(CodecError::IndefiniteLengthForbidden);
        }
        let len = self.decode_unsigned(additional_info)?;
        if len > MAX_CONTAINER_ELEMENTS {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len,
                max_allowed: MAX_CONTAINER_ELEMENTS,
            });
        }
        usize::try_from(len).map_err(|_| CodecError::decoding_failed("array too long"))
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Fails if bytes remain.
    pub fn finish(&self) -> CodecResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes {
                count: self.data.len() - self.pos,
            })
        }
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        if self.pos >= self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if self.pos + len > self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => {
                let byte = self.read_byte()?;
                if byte < 24 {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: value could be encoded in fewer bytes",
                    ));
                }
                Ok(u64::from(byte))
            }
            25 => {
                let bytes = self.read_bytes(2)?;
                let value = u16::from_be_bytes([bytes[0], bytes[1]]);
                if u8::try_from(value).is_ok() {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: value could be encoded in fewer bytes",
                    ));
                }
                Ok(u64::from(value))
            }
            26 => {
                let bytes = self.read_bytes(4)?;
                let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                if u16::try_from(value).is_ok() {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: value could be encoded in fewer bytes",
                    ));
                }
                Ok(u64::from(value))
            }
            27 => {
                let bytes = self.read_bytes(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                let value = u64::from_be_bytes(raw);
                if u32::try_from(value).is_ok() {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: value could be encoded in fewer bytes",
                    ));
                }
                Ok(value)
            }
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            _ => Err(CodecError::IndefiniteLengthForbidden),
        }
    }

    fn decode_string(&mut self, additional_info: u8) -> CodecResult<&'a [u8]> {
        if additional_info == 31 {
            return Err(CodecError::IndefiniteLengthForbidden);
        }
        let len = self.decode_unsigned(additional_info)?;
        if len > MAX_BYTES_LENGTH {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len,
                max_allowed: MAX_BYTES_LENGTH,
            });
        }
        let len = usize::try_from(len).map_err(|_| CodecError::decoding_failed("string too long"))?;
        self.read_bytes(len)
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            27 => {
                let bytes = self.read_bytes(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                Ok(Value::Float(f64::from_bits(u64::from_be_bytes(raw))))
            }
            25 | 26 => Err(CodecError::invalid_structure(
                "non-canonical: floats must use 64-bit encoding",
            )),
            _ => Err(CodecError::unsupported_type(format!(
                "simple value {additional_info}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{to_cbor_record, to_cbor_records};
    use proptest::prelude::*;

    #[test]
    fn decode_mixed_record() {
        let record = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-300),
            Value::Float(2.5),
            Value::Text("héllo".into()),
            Value::Blob(vec![0, 255]),
        ];
        let decoded = from_cbor_record(&to_cbor_record(&record)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn decode_batch() {
        let batch = vec![vec![Value::Int(1)], vec![], vec![Value::Text("x".into())]];
        assert_eq!(from_cbor_records(&to_cbor_records(&batch)).unwrap(), batch);
    }

    #[test]
    fn reject_non_canonical_integer() {
        // 5 encoded with a one-byte argument
        let result = from_cbor_record(&[0x81, 0x18, 0x05]);
        assert!(matches!(result, Err(CodecError::InvalidStructure { .. })));
    }

    #[test]
    fn reject_half_float() {
        let result = from_cbor_record(&[0x81, 0xf9, 0x3c, 0x00]);
        assert!(matches!(result, Err(CodecError::InvalidStructure { .. })));
    }

    #[test]
    fn reject_trailing_bytes() {
        let result = from_cbor_record(&[0x80, 0x00]);
        assert_eq!(result, Err(CodecError::TrailingBytes { count: 1 }));
    }

    #[test]
    fn reject_truncated_input() {
        let result = from_cbor_record(&[0x82, 0x01]);
        assert_eq!(result, Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn reject_indefinite_array() {
        let result = from_cbor_record(&[0x9f, 0xff]);
        assert_eq!(result, Err(CodecError::IndefiniteLengthForbidden));
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<f64>()
                .prop_filter("NaN never compares equal", |x| !x.is_nan())
                .prop_map(Value::Float),
            ".{0,16}".prop_map(Value::Text),
            prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Blob),
        ]
    }

    proptest! {
        #[test]
        fn any_record_decodes_to_itself(record in prop::collection::vec(value_strategy(), 0..8)) {
            let bytes = to_cbor_record(&record);
            prop_assert_eq!(from_cbor_record(&bytes).unwrap(), record);
        }
    }
}
