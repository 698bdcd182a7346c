//! # Quarry Storage
//!
//! Storage collaborators for the Quarry engine.
//!
//! The engine keeps rows as records of [`Value`]s addressed by opaque
//! [`Handle`]s. A [`Storage`] implementation owns those records together
//! with physical transactions, a monotonic row id counter and a factory
//! for [`Temp`] scratch stores used by sorting and grouping operators.
//!
//! ## Available Storages
//!
//! - [`MemoryStorage`] - Ephemeral, not durable (`acid() == false`)
//! - [`FileStorage`] - Journaled to a single file, durable (`acid() == true`)
//!
//! ## Example
//!
//! ```rust
//! use quarry_codec::Value;
//! use quarry_storage::{MemoryStorage, Storage};
//!
//! let storage = MemoryStorage::new();
//! storage.begin_transaction().unwrap();
//! let handle = storage.create(&[Value::Int(1)]).unwrap();
//! storage.commit().unwrap();
//! assert_eq!(storage.read(handle).unwrap(), vec![Value::Int(1)]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod journal;
mod memory;
mod records;
mod storage;
mod temp;

pub use error::{StorageError, StorageResult};
pub use file::{FileOptions, FileStorage};
pub use memory::MemoryStorage;
pub use storage::{Handle, Storage};
pub use temp::{MemoryTemp, Temp, TempEntries};

pub use quarry_codec::Value;
