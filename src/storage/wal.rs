//! Write-Ahead Log (WAL) for durability guarantees
//!
//! Every mutation is persisted here before it is applied to the in-memory
//! table, so a crash never loses an acknowledged write. On recovery the
//! log is replayed on top of the last checkpoint.
//!
//! Format per entry:
//! - length: u32 (4 bytes)
//! - data: [u8; length] (serialized WalRecord)
//! - crc: u32 (4 bytes, CRC32 of length + data)
//!
//! A frame whose CRC does not match is skipped and counted rather than
//! aborting recovery; a frame cut short by a crash ends the replay.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::SystemSnapshot;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Maximum accepted frame payload (guards against a garbage length field)
const MAX_ENTRY_BYTES: usize = 4 * 1024 * 1024;

/// One logged mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum WalRecord {
    /// A snapshot was appended
    Append(SystemSnapshot),
    /// All records with `timestamp < cutoff` were deleted
    DeleteBefore { cutoff: i64 },
}

/// Sync strategy for WAL writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WalSyncMode {
    /// Fsync after every write (safest, slowest)
    EveryWrite,
    /// Fsync in batches (balanced)
    #[default]
    Batched,
    /// No fsync, rely on OS (fastest, risk of loss)
    None,
}

/// Outcome of a WAL replay
#[derive(Debug, Default)]
pub struct WalReplay {
    /// Records recovered in log order
    pub records: Vec<WalRecord>,
    /// Frames dropped due to checksum mismatch
    pub corrupt_frames: u64,
}

/// Write-Ahead Log for durability
pub struct WriteAheadLog {
    writer: BufWriter<File>,
    path: PathBuf,
    entry_count: u64,
    /// Bytes written since last sync
    bytes_since_sync: usize,
    sync_mode: WalSyncMode,
    /// Batch sync threshold (bytes)
    sync_threshold: usize,
}

impl WriteAheadLog {
    /// Open or create a WAL file
    pub fn open(path: impl AsRef<Path>, sync_mode: WalSyncMode) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let entry_count = Self::count_entries(&path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            entry_count,
            bytes_since_sync: 0,
            sync_mode,
            sync_threshold: 64 * 1024,
        })
    }

    fn count_entries(path: &Path) -> StorageResult<u64> {
        if !path.exists() {
            return Ok(0);
        }

        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut count = 0u64;

        loop {
            match Self::read_entry_from(&mut reader) {
                Ok(Some(_)) => count += 1,
                Ok(None) => break, // EOF
                Err(StorageError::Corruption(_)) => count += 1,
                Err(_) => break, // truncated tail
            }
        }

        Ok(count)
    }

    /// Append a record to the WAL
    pub fn append(&mut self, record: &WalRecord) -> StorageResult<()> {
        let data = bincode::serialize(record)?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&(data.len() as u32).to_le_bytes());
        hasher.update(&data);
        let crc = hasher.finalize();

        // Write: length (4) + data (N) + crc (4)
        self.writer.write_all(&(data.len() as u32).to_le_bytes())?;
        self.writer.write_all(&data)?;
        self.writer.write_all(&crc.to_le_bytes())?;

        self.entry_count += 1;
        self.bytes_since_sync += 8 + data.len();

        self.maybe_sync()
    }

    fn maybe_sync(&mut self) -> StorageResult<()> {
        match self.sync_mode {
            WalSyncMode::EveryWrite => self.sync()?,
            WalSyncMode::Batched => {
                if self.bytes_since_sync >= self.sync_threshold {
                    self.sync()?;
                }
            }
            WalSyncMode::None => {
                // Just flush the buffer, no fsync
                self.writer.flush()?;
            }
        }
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> StorageResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.bytes_since_sync = 0;
        Ok(())
    }

    /// Replay all entries for recovery
    pub fn replay(&self) -> StorageResult<WalReplay> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let mut replay = WalReplay::default();

        loop {
            match Self::read_entry_from(&mut reader) {
                Ok(Some(record)) => replay.records.push(record),
                Ok(None) => break, // EOF
                Err(StorageError::Corruption(msg)) => {
                    replay.corrupt_frames += 1;
                    tracing::warn!(
                        "Skipping corrupt WAL frame after entry {}: {}",
                        replay.records.len(),
                        msg
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "WAL replay stopped at entry {}: {}",
                        replay.records.len(),
                        e
                    );
                    break;
                }
            }
        }

        Ok(replay)
    }

    /// Read a single entry from a reader
    ///
    /// `Ok(None)` on clean EOF, `Err(Corruption)` when the frame is intact
    /// but its checksum fails (the stream position is past the frame, so
    /// the caller may continue), any other error when the tail is cut off.
    fn read_entry_from<R: Read>(reader: &mut R) -> StorageResult<Option<WalRecord>> {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes(len_buf) as usize;

        if len > MAX_ENTRY_BYTES {
            return Err(StorageError::Wal(format!("Entry length too large: {}", len)));
        }

        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;

        let mut crc_buf = [0u8; 4];
        reader.read_exact(&mut crc_buf)?;
        let stored_crc = u32::from_le_bytes(crc_buf);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&len_buf);
        hasher.update(&data);
        let computed_crc = hasher.finalize();

        if stored_crc != computed_crc {
            return Err(StorageError::Corruption(format!(
                "CRC mismatch: stored={}, computed={}",
                stored_crc, computed_crc
            )));
        }

        let record: WalRecord = bincode::deserialize(&data)?;
        Ok(Some(record))
    }

    /// Truncate the WAL (after a successful checkpoint)
    pub fn truncate(&mut self) -> StorageResult<()> {
        self.sync()?;

        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        drop(file);

        self.writer = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?,
        );

        self.entry_count = 0;
        self.bytes_since_sync = 0;

        Ok(())
    }

    /// Get the number of entries in the WAL
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the file size
    pub fn file_size(&self) -> StorageResult<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::SnapshotInput;
    use std::io::{Seek, SeekFrom};
    use tempfile::tempdir;

    fn snapshot(id: u64, timestamp: i64) -> SystemSnapshot {
        SnapshotInput::new(50.0, 40.0, 1024, 1.0)
            .timestamp(timestamp)
            .into_snapshot(id)
    }

    #[test]
    fn test_wal_basic_operations() {
        let dir = tempdir().unwrap();
        let wal_path = dir.path().join("test.wal");

        // Create and write
        {
            let mut wal = WriteAheadLog::open(&wal_path, WalSyncMode::EveryWrite).unwrap();

            wal.append(&WalRecord::Append(snapshot(1, 1000))).unwrap();
            wal.append(&WalRecord::Append(snapshot(2, 2000))).unwrap();
            wal.append(&WalRecord::DeleteBefore { cutoff: 1500 }).unwrap();

            assert_eq!(wal.entry_count(), 3);
        }

        // Replay
        {
            let wal = WriteAheadLog::open(&wal_path, WalSyncMode::EveryWrite).unwrap();
            let replay = wal.replay().unwrap();

            assert_eq!(replay.records.len(), 3);
            assert_eq!(replay.corrupt_frames, 0);
            match &replay.records[0] {
                WalRecord::Append(s) => assert_eq!(s.timestamp, 1000),
                other => panic!("unexpected record: {:?}", other),
            }
            assert_eq!(replay.records[2], WalRecord::DeleteBefore { cutoff: 1500 });
        }
    }

    #[test]
    fn test_wal_truncate() {
        let dir = tempdir().unwrap();
        let wal_path = dir.path().join("test.wal");

        let mut wal = WriteAheadLog::open(&wal_path, WalSyncMode::EveryWrite).unwrap();

        for i in 0..10 {
            wal.append(&WalRecord::Append(snapshot(i, i as i64 * 1000)))
                .unwrap();
        }
        assert_eq!(wal.entry_count(), 10);

        wal.truncate().unwrap();
        assert_eq!(wal.entry_count(), 0);

        let replay = wal.replay().unwrap();
        assert!(replay.records.is_empty());
    }

    #[test]
    fn test_wal_crc_corruption_skipped() {
        let dir = tempdir().unwrap();
        let wal_path = dir.path().join("test.wal");

        // Two valid entries
        {
            let mut wal = WriteAheadLog::open(&wal_path, WalSyncMode::EveryWrite).unwrap();
            wal.append(&WalRecord::Append(snapshot(1, 1000))).unwrap();
            wal.append(&WalRecord::Append(snapshot(2, 2000))).unwrap();
        }

        // Flip payload bytes inside the first frame, leaving its length intact
        {
            let mut file = OpenOptions::new().write(true).open(&wal_path).unwrap();
            file.seek(SeekFrom::Start(10)).unwrap();
            file.write_all(&[0xFF, 0xFF]).unwrap();
        }

        // Replay skips the damaged frame and still returns the second
        {
            let wal = WriteAheadLog::open(&wal_path, WalSyncMode::EveryWrite).unwrap();
            let replay = wal.replay().unwrap();
            assert_eq!(replay.corrupt_frames, 1);
            assert_eq!(replay.records.len(), 1);
            match &replay.records[0] {
                WalRecord::Append(s) => assert_eq!(s.id, 2),
                other => panic!("unexpected record: {:?}", other),
            }
        }
    }

    #[test]
    fn test_wal_truncated_tail_stops_replay() {
        let dir = tempdir().unwrap();
        let wal_path = dir.path().join("test.wal");

        {
            let mut wal = WriteAheadLog::open(&wal_path, WalSyncMode::EveryWrite).unwrap();
            wal.append(&WalRecord::Append(snapshot(1, 1000))).unwrap();
            wal.append(&WalRecord::Append(snapshot(2, 2000))).unwrap();
        }

        // Chop the last few bytes off, simulating a crash mid-write
        {
            let len = std::fs::metadata(&wal_path).unwrap().len();
            let file = OpenOptions::new().write(true).open(&wal_path).unwrap();
            file.set_len(len - 3).unwrap();
        }

        {
            let wal = WriteAheadLog::open(&wal_path, WalSyncMode::EveryWrite).unwrap();
            let replay = wal.replay().unwrap();
            assert_eq!(replay.records.len(), 1);
        }
    }

    #[test]
    fn test_wal_persistence_across_opens() {
        let dir = tempdir().unwrap();
        let wal_path = dir.path().join("test.wal");

        {
            let mut wal = WriteAheadLog::open(&wal_path, WalSyncMode::EveryWrite).unwrap();
            for i in 0..5 {
                wal.append(&WalRecord::Append(snapshot(i, i as i64 * 1000)))
                    .unwrap();
            }
        }

        {
            let mut wal = WriteAheadLog::open(&wal_path, WalSyncMode::EveryWrite).unwrap();
            assert_eq!(wal.entry_count(), 5);
            for i in 5..10 {
                wal.append(&WalRecord::Append(snapshot(i, i as i64 * 1000)))
                    .unwrap();
            }
        }

        {
            let wal = WriteAheadLog::open(&wal_path, WalSyncMode::EveryWrite).unwrap();
            assert_eq!(wal.entry_count(), 10);
            assert_eq!(wal.replay().unwrap().records.len(), 10);
        }
    }

    #[test]
    fn test_wal_batched_sync() {
        let dir = tempdir().unwrap();
        let wal_path = dir.path().join("test.wal");

        let mut wal = WriteAheadLog::open(&wal_path, WalSyncMode::Batched).unwrap();
        for i in 0..100 {
            wal.append(&WalRecord::Append(snapshot(i, i as i64 * 1000)))
                .unwrap();
        }
        wal.sync().unwrap();

        assert_eq!(wal.replay().unwrap().records.len(), 100);
    }
}
