//! Journal frame format used by [`crate::FileStorage`].
//!
//! Each durable commit appends one frame:
//!
//! ```text
//! | magic "QJNL" (4) | payload length (4, LE) | payload (N) | crc32 of payload (4, LE) |
//! ```
//!
//! The payload is a canonical CBOR array of operations, each an array
//! `[kind, ...]`: `[0, handle, values...]` stores a record, `[1, handle]`
//! deletes one and `[2, id]` sets the row id counter.

use crate::error::{StorageError, StorageResult};
use crate::storage::Handle;
use quarry_codec::{from_cbor_records, to_cbor_records, Value};

/// Frame magic.
pub(crate) const MAGIC: [u8; 4] = *b"QJNL";

/// Magic plus length prefix.
const HEADER_SIZE: usize = 8;

/// Trailing checksum.
const TRAILER_SIZE: usize = 4;

const KIND_PUT: i64 = 0;
const KIND_DELETE: i64 = 1;
const KIND_ID: i64 = 2;

/// A committed change, replayed when the journal is opened.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Redo {
    /// Store `values` under `handle`.
    Put { handle: Handle, values: Vec<Value> },
    /// Remove the record under `handle`.
    Delete { handle: Handle },
    /// Set the row id counter.
    Id(i64),
}

impl Redo {
    fn to_record(&self) -> StorageResult<Vec<Value>> {
        let handle_value = |handle: Handle| {
            i64::try_from(handle)
                .map(Value::Int)
                .map_err(|_| StorageError::Corrupted(format!("handle {handle} out of range")))
        };
        Ok(match self {
            Self::Put { handle, values } => {
                let mut record = Vec::with_capacity(values.len() + 2);
                record.push(Value::Int(KIND_PUT));
                record.push(handle_value(*handle)?);
                record.extend(values.iter().cloned());
                record
            }
            Self::Delete { handle } => vec![Value::Int(KIND_DELETE), handle_value(*handle)?],
            Self::Id(id) => vec![Value::Int(KIND_ID), Value::Int(*id)],
        })
    }

    fn from_record(mut record: Vec<Value>) -> StorageResult<Self> {
        let bad = || StorageError::Corrupted("malformed journal operation".into());
        let handle_at = |record: &[Value], i: usize| {
            record
                .get(i)
                .and_then(Value::as_int)
                .and_then(|n| Handle::try_from(n).ok())
                .ok_or_else(bad)
        };
        match record.first().and_then(Value::as_int) {
            Some(KIND_PUT) if record.len() >= 2 => {
                let handle = handle_at(&record, 1)?;
                let values = record.split_off(2);
                Ok(Self::Put { handle, values })
            }
            Some(KIND_DELETE) if record.len() == 2 => Ok(Self::Delete {
                handle: handle_at(&record, 1)?,
            }),
            Some(KIND_ID) if record.len() == 2 => {
                record.get(1).and_then(Value::as_int).map(Self::Id).ok_or_else(bad)
            }
            _ => Err(bad()),
        }
    }
}

/// Builds the frame persisting one committed transaction.
pub(crate) fn encode_frame(ops: &[Redo]) -> StorageResult<Vec<u8>> {
    let records = ops.iter().map(Redo::to_record).collect::<StorageResult<Vec<_>>>()?;
    let payload = to_cbor_records(&records);
    let len = u32::try_from(payload.len())
        .map_err(|_| StorageError::Corrupted("journal frame too large".into()))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + TRAILER_SIZE);
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&compute_crc32(&payload).to_le_bytes());
    Ok(frame)
}

/// Result of scanning a journal image.
#[derive(Debug, Default)]
pub(crate) struct Scan {
    /// Operations of every complete frame, in commit order.
    pub frames: Vec<Vec<Redo>>,
    /// Length of the prefix made of complete frames.
    pub valid_len: u64,
}

/// Parses every complete frame of `data`.
///
/// An incomplete trailing frame (a commit torn by a crash) ends the scan;
/// the caller decides whether to truncate it. A complete frame with a bad
/// magic or checksum is corruption.
pub(crate) fn scan(data: &[u8]) -> StorageResult<Scan> {
    let mut scan = Scan::default();
    let mut pos = 0usize;

    while pos < data.len() {
        let rest = &data[pos..];
        if rest.len() < HEADER_SIZE {
            break;
        }
        if rest[..4] != MAGIC {
            return Err(StorageError::Corrupted(format!(
                "bad journal frame magic at offset {pos}"
            )));
        }
        let len = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let total = HEADER_SIZE + len + TRAILER_SIZE;
        if rest.len() < total {
            break;
        }

        let payload = &rest[HEADER_SIZE..HEADER_SIZE + len];
        let crc_bytes = &rest[HEADER_SIZE + len..total];
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        if stored != compute_crc32(payload) {
            return Err(StorageError::Corrupted(format!(
                "journal frame checksum mismatch at offset {pos}"
            )));
        }

        let ops = from_cbor_records(payload)?
            .into_iter()
            .map(Redo::from_record)
            .collect::<StorageResult<Vec<_>>>()?;
        scan.frames.push(ops);
        pos += total;
        scan.valid_len = pos as u64;
    }

    Ok(scan)
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub(crate) fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            #[allow(clippy::cast_possible_truncation)]
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 1 == 0 {
                    crc >> 1
                } else {
                    (crc >> 1) ^ 0xEDB8_8320
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
    })
}
