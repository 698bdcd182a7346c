//! Journaled file storage.

use crate::error::{StorageError, StorageResult};
use crate::journal::{encode_frame, scan};
use crate::records::RecordStore;
use crate::storage::{Handle, Storage};
use crate::temp::{MemoryTemp, Temp};
use fs2::FileExt;
use parking_lot::Mutex;
use quarry_codec::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Options for opening a [`FileStorage`].
#[derive(Debug, Clone, Copy)]
pub struct FileOptions {
    /// Create the file if it does not exist.
    pub create_if_missing: bool,
    /// `fsync` the journal on every durable commit.
    pub sync_on_commit: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
        }
    }
}

/// A durable storage backed by an append-only journal file.
///
/// Records live in memory; every outermost commit appends one checksummed
/// frame holding the committed changes. Opening the file replays all
/// complete frames. A frame torn by a crash at the end of the file is cut
/// off, any other damage is reported as corruption.
///
/// The file is locked exclusively for the lifetime of the storage, so a
/// second process opening it fails with [`StorageError::Locked`].
///
/// # Example
///
/// ```no_run
/// use quarry_codec::Value;
/// use quarry_storage::{FileStorage, Storage};
/// use std::path::Path;
///
/// let storage = FileStorage::open(Path::new("data.qdb")).unwrap();
/// storage.begin_transaction().unwrap();
/// storage.create(&[Value::Int(1)]).unwrap();
/// storage.commit().unwrap(); // durable
/// ```
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    name: String,
    options: FileOptions,
    state: Mutex<State>,
    durable_commits: AtomicU64,
}

#[derive(Debug)]
struct State {
    file: Option<File>,
    records: RecordStore,
    /// Length of the journal made of complete frames.
    end: u64,
}

/// What appending a frame needs from the journal file.
trait JournalFile: Write + Seek {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl JournalFile for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Writes `frame` at `end` and cuts off anything after it. Returns the new
/// end. On failure the file is cut back to `end`.
fn append_frame(file: &mut impl JournalFile, end: u64, frame: &[u8], sync: bool) -> io::Result<u64> {
    let new_end = end + frame.len() as u64;
    let mut write = || -> io::Result<()> {
        file.seek(SeekFrom::Start(end))?;
        file.write_all(frame)?;
        file.truncate_to(new_end)?;
        if sync {
            file.sync()
        } else {
            file.flush()
        }
    };
    match write() {
        Ok(()) => Ok(new_end),
        Err(err) => {
            if let Err(undo) = file.truncate_to(end) {
                tracing::warn!(%undo, end, "failed to cut back a partial journal frame");
            }
            Err(err)
        }
    }
}

impl FileStorage {
    /// Opens or creates a journal file with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, is locked, or its
    /// journal is corrupted.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::open_with_options(path, FileOptions::default())
    }

    /// Opens a journal file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing and `create_if_missing` is
    /// off, if it cannot be locked, or if replay finds corruption.
    pub fn open_with_options(path: &Path, options: FileOptions) -> StorageResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(options.create_if_missing)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(path.display().to_string()));
        }

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        let journal = scan(&data)?;

        if journal.valid_len < data.len() as u64 {
            tracing::warn!(
                path = %path.display(),
                discarded = data.len() as u64 - journal.valid_len,
                "truncating torn journal tail"
            );
            file.set_len(journal.valid_len)?;
            file.sync_all()?;
        }

        let mut records = RecordStore::new(true);
        let frames = journal.frames.len();
        for op in journal.frames.into_iter().flatten() {
            records.apply(op)?;
        }
        tracing::debug!(path = %path.display(), frames, "journal replayed");

        Ok(Self {
            path: path.to_path_buf(),
            name: path.display().to_string(),
            options,
            state: Mutex::new(State {
                file: Some(file),
                records,
                end: journal.valid_len,
            }),
            durable_commits: AtomicU64::new(0),
        })
    }

    /// Returns the path to the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames appended since this storage was opened.
    #[must_use]
    pub fn durable_commits(&self) -> u64 {
        self.durable_commits.load(Ordering::Acquire)
    }

    fn with<T>(&self, f: impl FnOnce(&mut RecordStore) -> StorageResult<T>) -> StorageResult<T> {
        let mut state = self.state.lock();
        if state.file.is_none() {
            return Err(StorageError::Closed);
        }
        f(&mut state.records)
    }
}

impl Storage for FileStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn acid(&self) -> bool {
        true
    }

    fn begin_transaction(&self) -> StorageResult<()> {
        self.with(|r| {
            r.begin();
            Ok(())
        })
    }

    fn commit(&self) -> StorageResult<()> {
        let mut state = self.state.lock();
        let State { file, records, end } = &mut *state;
        let Some(handle) = file.as_mut() else {
            return Err(StorageError::Closed);
        };

        let Some(ops) = records.commit()? else {
            return Ok(());
        };
        if ops.is_empty() {
            return Ok(());
        }

        let sync = self.options.sync_on_commit;
        let written = encode_frame(&ops).and_then(|frame| {
            let new_end = append_frame(handle, *end, &frame, sync)?;
            Ok((new_end, frame.len()))
        });
        match written {
            Ok((new_end, bytes)) => {
                *end = new_end;
                self.durable_commits.fetch_add(1, Ordering::AcqRel);
                tracing::trace!(ops = ops.len(), bytes, "journal frame appended");
                Ok(())
            }
            Err(err) => {
                // Memory already holds the commit; refuse further use.
                tracing::error!(%err, path = %self.path.display(), "journal commit failed, closing storage");
                records.abandon();
                if let Some(file) = file.take() {
                    if let Err(unlock) = file.unlock() {
                        tracing::warn!(%unlock, "failed to unlock journal");
                    }
                }
                Err(err)
            }
        }
    }

    fn rollback(&self) -> StorageResult<()> {
        self.with(RecordStore::rollback)
    }

    fn create(&self, data: &[Value]) -> StorageResult<Handle> {
        self.with(|r| r.create(data))
    }

    fn read(&self, handle: Handle) -> StorageResult<Vec<Value>> {
        self.with(|r| r.read(handle))
    }

    fn update(&self, handle: Handle, data: &[Value]) -> StorageResult<()> {
        self.with(|r| r.update(handle, data))
    }

    fn delete(&self, handle: Handle) -> StorageResult<()> {
        self.with(|r| r.delete(handle))
    }

    fn id(&self) -> StorageResult<i64> {
        self.with(RecordStore::next_id)
    }

    fn reset_id(&self) -> StorageResult<()> {
        self.with(RecordStore::reset_id)
    }

    fn create_temp(&self, ascending: bool) -> StorageResult<Box<dyn Temp>> {
        self.with(|_| Ok(Box::new(MemoryTemp::new(ascending)) as Box<dyn Temp>))
    }

    fn verify(&self) -> StorageResult<()> {
        let mut state = self.state.lock();
        let State { file, records, .. } = &mut *state;
        let file = file.as_mut().ok_or(StorageError::Closed)?;

        let mut data = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut data)?;
        let journal = scan(&data)?;
        if journal.valid_len != data.len() as u64 {
            return Err(StorageError::Corrupted(format!(
                "{} bytes after the last complete journal frame",
                data.len() as u64 - journal.valid_len
            )));
        }

        let mut replayed = RecordStore::new(false);
        for op in journal.frames.into_iter().flatten() {
            replayed.apply(op)?;
        }
        if records.depth() == 0 && replayed.live_records() != records.live_records() {
            return Err(StorageError::Corrupted(format!(
                "journal holds {} records, memory holds {}",
                replayed.live_records(),
                records.live_records()
            )));
        }
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        let mut state = self.state.lock();
        state.records.abandon();
        if let Some(file) = state.file.take() {
            file.unlock()?;
            tracing::debug!(path = %self.path.display(), "journal closed");
        }
        Ok(())
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        if let Some(file) = self.state.get_mut().file.take() {
            let _ = file.unlock();
        }
    }
}
