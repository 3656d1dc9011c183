//! File-backed ordered store
//!
//! The store keeps its index in memory and persists every committed batch as
//! one checksummed record appended to a log file:
//!
//! ```text
//! header : magic u64 | format version u32 | reserved u32 | created unix secs i64
//! record : body length u32 | xxh3 checksum of body u64 | body
//! body   : (tag u8 | key length u32 | key | [value length u32 | value])*
//! ```
//!
//! All integers are little-endian. On open the log is memory-mapped and
//! replayed. A record is only applied when it is complete and its checksum
//! matches. A damaged final record is a batch torn by a crash: it is dropped
//! as a whole and the file is truncated back to the last good record. A
//! damaged record followed by more data fails the open with
//! [`StorageError::CorruptRecord`] and leaves the file untouched.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use memmap2::MmapOptions;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};
use xxhash_rust::xxh3::xxh3_64;

use super::{apply_batch, commit_batch, BatchOp, IterOptions, KvCursor, MapCursor, OrderedMap, OrderedStore, Snapshot};
use crate::config::FileStoreConfig;
use crate::error::StorageError;

/// Magic number for RangeDB log files
pub const LOG_MAGIC: u64 = 0x5241_4E47_4544_4201; // "RANGEDB\x01"

/// Version of the log format
pub const LOG_FORMAT_VERSION: u32 = 1;

/// Size of the file header
pub const HEADER_SIZE: usize = 24;

/// Size of the per-record header
pub const RECORD_HEADER_SIZE: usize = 12;

const TAG_PUT: u8 = 1;
const TAG_DEL: u8 = 2;

/// Log file handle positioned at the end of the last good record
struct LogWriter {
    file: File,
    len: u64,
    records: u64,
}

impl LogWriter {
    /// Append one record. On failure the file is cut back to its previous length
    /// so a partial record never precedes later ones.
    fn append(&mut self, body: &[u8], sync: bool) -> Result<(), StorageError> {
        let record = encode_record(body);
        let result = self.file.write_all(&record).and_then(|_| {
            if sync {
                self.file.sync_data()
            } else {
                Ok(())
            }
        });

        match result {
            Ok(()) => {
                self.len += record.len() as u64;
                self.records += 1;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "log append failed, rolling back to {} bytes", self.len);
                // Best effort: the original error is what the caller needs to see
                let _ = self.file.set_len(self.len);
                let _ = self.file.seek(SeekFrom::Start(self.len));
                Err(err.into())
            }
        }
    }
}

/// Persistent ordered store backed by an append-only batch log
pub struct FileStore {
    /// Live entries
    index: RwLock<Snapshot>,
    /// Log writer; held across append and apply so the log order is the apply order
    log: Mutex<LogWriter>,
    /// Creation time recorded in the header
    created_at: DateTime<Utc>,
    /// Configuration
    config: FileStoreConfig,
}

impl FileStore {
    /// Open or create the log at `config.path` and replay it
    pub fn open(config: FileStoreConfig) -> Result<Self, StorageError> {
        let path = config.path.as_path();
        if !path.exists() && !config.create_if_missing {
            return Err(StorageError::Missing(path.to_path_buf()));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(config.create_if_missing)
            .truncate(false)
            .open(path)?;
        let file_len = file.metadata()?.len();

        let mut index = OrderedMap::new();
        // A file shorter than the header was cut off before its first record
        let (valid_len, records, created) = if file_len < HEADER_SIZE as u64 {
            if file_len > 0 {
                warn!(path = %path.display(), len = file_len, "rewriting incomplete log header");
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
            }
            let created = Utc::now().timestamp();
            file.write_all(&encode_header(created))?;
            file.sync_all()?;
            (HEADER_SIZE as u64, 0, created)
        } else {
            replay(&file, &mut index)?
        };

        if valid_len < file_len {
            warn!(
                path = %path.display(),
                discarded = file_len - valid_len,
                "discarding incomplete tail of log"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(valid_len))?;

        debug!(path = %path.display(), records, keys = index.len(), "opened file store");

        Ok(Self {
            index: RwLock::new(Snapshot::new(index)),
            log: Mutex::new(LogWriter {
                file,
                len: valid_len,
                records,
            }),
            created_at: DateTime::from_timestamp(created, 0).unwrap_or_default(),
            config,
        })
    }

    /// Open the log at `path` with default settings
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::open(FileStoreConfig::with_path(path.as_ref()))
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Number of records in the log
    pub fn record_count(&self) -> u64 {
        self.log.lock().records
    }

    /// Size of the log in bytes
    pub fn log_size(&self) -> u64 {
        self.log.lock().len
    }

    /// When the log was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Flush all changes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.log.lock().file.sync_data()?;
        Ok(())
    }

    /// Rewrite the log as a single record holding the live entries.
    ///
    /// The new log is written beside the old one and renamed over it. On any
    /// failure the old log stays in place and the temporary file is removed.
    pub fn compact(&self) -> Result<(), StorageError> {
        let mut log = self.log.lock();
        let snapshot = Snapshot::clone(&self.index.read());

        let ops: Vec<BatchOp> = snapshot
            .iter()
            .map(|(k, v)| BatchOp::put(k.clone(), v.clone()))
            .collect();
        let created = self.created_at.timestamp();

        let tmp_path = self.config.path.with_extension("compact");
        let written = write_compacted(&tmp_path, created, &ops)
            .and_then(|written| {
                fs::rename(&tmp_path, &self.config.path)?;
                Ok(written)
            });
        let (file, len, records) = match written {
            Ok(written) => written,
            Err(err) => {
                warn!(error = %err, path = %tmp_path.display(), "compaction failed, keeping old log");
                // The old log is intact; a leftover temp file is only clutter
                let _ = fs::remove_file(&tmp_path);
                return Err(err);
            }
        };

        debug!(before = log.len, after = len, keys = snapshot.len(), "compacted log");
        *log = LogWriter { file, len, records };
        Ok(())
    }
}

impl OrderedStore for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.index.read().get(key).cloned())
    }

    fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        if ops.is_empty() {
            return Ok(());
        }
        let body = encode_batch(&ops);
        let count = ops.len();

        let mut log = self.log.lock();
        log.append(&body, self.config.sync_writes)?;
        commit_batch(&mut self.index.write(), ops);
        trace!(record = log.records, ops = count, bytes = body.len(), "batch committed");
        Ok(())
    }

    fn iter(&self, options: IterOptions) -> Box<dyn KvCursor + '_> {
        Box::new(MapCursor::new(Snapshot::clone(&self.index.read()), options))
    }
}

/// Write a fresh log holding `ops` as one record. Returns the open handle
/// positioned at its end, the log length and the record count.
fn write_compacted(path: &Path, created: i64, ops: &[BatchOp]) -> Result<(File, u64, u64), StorageError> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(&encode_header(created))?;
    let mut len = HEADER_SIZE as u64;
    let mut records = 0;
    if !ops.is_empty() {
        let record = encode_record(&encode_batch(ops));
        file.write_all(&record)?;
        len += record.len() as u64;
        records = 1;
    }
    file.sync_all()?;
    Ok((file, len, records))
}

fn encode_header(created: i64) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0..8].copy_from_slice(&LOG_MAGIC.to_le_bytes());
    header[8..12].copy_from_slice(&LOG_FORMAT_VERSION.to_le_bytes());
    header[16..24].copy_from_slice(&created.to_le_bytes());
    header
}

fn encode_record(body: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + body.len());
    record.extend_from_slice(&(body.len() as u32).to_le_bytes());
    record.extend_from_slice(&xxh3_64(body).to_le_bytes());
    record.extend_from_slice(body);
    record
}

fn encode_batch(ops: &[BatchOp]) -> Vec<u8> {
    let mut body = Vec::new();
    for op in ops {
        match op {
            BatchOp::Put { key, value } => {
                body.push(TAG_PUT);
                body.extend_from_slice(&(key.len() as u32).to_le_bytes());
                body.extend_from_slice(key);
                body.extend_from_slice(&(value.len() as u32).to_le_bytes());
                body.extend_from_slice(value);
            }
            BatchOp::Del { key } => {
                body.push(TAG_DEL);
                body.extend_from_slice(&(key.len() as u32).to_le_bytes());
                body.extend_from_slice(key);
            }
        }
    }
    body
}

/// Reads a little-endian length-prefixed byte string
fn read_chunk<'a>(body: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    let len_bytes = body.get(*pos..*pos + 4)?;
    let len = u32::from_le_bytes(len_bytes.try_into().ok()?) as usize;
    let chunk = body.get(*pos + 4..*pos + 4 + len)?;
    *pos += 4 + len;
    Some(chunk)
}

fn decode_batch(body: &[u8]) -> Option<Vec<BatchOp>> {
    let mut ops = Vec::new();
    let mut pos = 0;
    while pos < body.len() {
        let tag = body[pos];
        pos += 1;
        let key = read_chunk(body, &mut pos)?.to_vec();
        match tag {
            TAG_PUT => {
                let value = read_chunk(body, &mut pos)?.to_vec();
                ops.push(BatchOp::Put { key, value });
            }
            TAG_DEL => ops.push(BatchOp::Del { key }),
            _ => return None,
        }
    }
    Some(ops)
}

/// Replay the log into `index`. Returns the length of the valid prefix of the
/// file, the number of records applied and the creation timestamp.
fn replay(file: &File, index: &mut OrderedMap) -> Result<(u64, u64, i64), StorageError> {
    // Safety: the file is opened by this process only and not resized while mapped
    let mmap = unsafe { MmapOptions::new().map(file)? };
    let data = &mmap[..];

    if data.len() < HEADER_SIZE {
        return Err(StorageError::BadHeader("file shorter than header"));
    }
    let magic = u64::from_le_bytes(data[0..8].try_into().unwrap_or_default());
    if magic != LOG_MAGIC {
        return Err(StorageError::BadHeader("magic mismatch"));
    }
    let version = u32::from_le_bytes(data[8..12].try_into().unwrap_or_default());
    if version != LOG_FORMAT_VERSION {
        return Err(StorageError::BadHeader("unsupported format version"));
    }
    let created = i64::from_le_bytes(data[16..24].try_into().unwrap_or_default());

    let mut offset = HEADER_SIZE;
    let mut records = 0u64;
    while offset < data.len() {
        // A record header or body running past the end is a torn final append
        let Some(header) = data.get(offset..offset + RECORD_HEADER_SIZE) else {
            break;
        };
        let len = u32::from_le_bytes(header[0..4].try_into().unwrap_or_default()) as usize;
        let checksum = u64::from_le_bytes(header[4..12].try_into().unwrap_or_default());
        let body_start = offset + RECORD_HEADER_SIZE;
        let body_end = body_start + len;
        let Some(body) = data.get(body_start..body_end) else {
            break;
        };

        let ops = if xxh3_64(body) == checksum { decode_batch(body) } else { None };
        let Some(ops) = ops else {
            // Only the last record may be discarded; anything after it was committed
            if body_end == data.len() {
                break;
            }
            return Err(StorageError::CorruptRecord(offset as u64));
        };
        apply_batch(index, ops);
        records += 1;
        offset = body_end;
    }

    Ok((offset as u64, records, created))
}
