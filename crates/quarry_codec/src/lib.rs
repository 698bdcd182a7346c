//! # Quarry Codec
//!
//! Dynamic values and record encoding for Quarry.
//!
//! This crate provides:
//! - [`Value`], the tagged union every row and expression result is made of,
//!   together with [`Value::collate`], the total order used for sorting,
//!   grouping and de-duplication
//! - [`ColumnType`], the declared type of a table column and its coercion rules
//! - Canonical CBOR encoding of records for durable storage
//!
//! ## Canonical CBOR Rules
//!
//! - A record is a definite-length array of values
//! - Integers use shortest encoding
//! - Floats are always 64-bit
//! - Strings must be UTF-8
//! - No indefinite-length items
//!
//! ## Usage
//!
//! ```
//! use quarry_codec::{from_cbor_record, to_cbor_record, Value};
//!
//! let record = vec![Value::Int(42), Value::Text("answer".into())];
//! let bytes = to_cbor_record(&record);
//! assert_eq!(from_cbor_record(&bytes).unwrap(), record);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod types;
mod value;

pub use decoder::{from_cbor_record, from_cbor_records, CanonicalDecoder};
pub use encoder::{to_cbor_record, to_cbor_records, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use types::ColumnType;
pub use value::Value;
