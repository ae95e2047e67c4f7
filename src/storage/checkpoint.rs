//! Checkpoint files: a durable image of the full store
//!
//! A checkpoint is written when the WAL grows past its threshold and on
//! close; afterwards the WAL is truncated. Recovery loads the latest
//! checkpoint and replays the WAL on top of it.
//!
//! Layout:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (64 bytes)                       │
//! │   magic: [u8; 4] = "VGIL"               │
//! │   version: u16                          │
//! │   record_count: u64                     │
//! │   min_timestamp: i64                    │
//! │   max_timestamp: i64                    │
//! │   next_id: u64                          │
//! │   reserved                              │
//! │   checksum: u32                         │
//! ├─────────────────────────────────────────┤
//! │ FRAMES (one per snapshot)               │
//! │   frame_size: u32                       │
//! │   payload: LZ4(bincode(SystemSnapshot)) │
//! │   frame_checksum: u32                   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The file is written to `<name>.tmp` and renamed into place, so readers
//! only ever see a complete checkpoint. A frame with a bad checksum is
//! skipped and counted on load; the rest of the file remains readable.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::SystemSnapshot;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for checkpoint file identification
const CHECKPOINT_MAGIC: [u8; 4] = *b"VGIL";

/// Current checkpoint format version
const CHECKPOINT_VERSION: u16 = 1;

/// Header size in bytes
const HEADER_SIZE: usize = 64;

/// Maximum accepted frame payload
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Checkpoint file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointHeader {
    pub version: u16,
    pub record_count: u64,
    pub min_timestamp: i64,
    pub max_timestamp: i64,
    /// Next snapshot id to assign after this checkpoint
    pub next_id: u64,
}

impl CheckpointHeader {
    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(&CHECKPOINT_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..14].copy_from_slice(&self.record_count.to_le_bytes());
        buf[14..22].copy_from_slice(&self.min_timestamp.to_le_bytes());
        buf[22..30].copy_from_slice(&self.max_timestamp.to_le_bytes());
        buf[30..38].copy_from_slice(&self.next_id.to_le_bytes());
        // bytes 38-59 reserved

        let checksum = crc32fast::hash(&buf[0..60]);
        buf[60..64].copy_from_slice(&checksum.to_le_bytes());

        buf
    }

    fn from_bytes(buf: &[u8; HEADER_SIZE]) -> StorageResult<Self> {
        let stored_checksum = u32::from_le_bytes([buf[60], buf[61], buf[62], buf[63]]);
        let computed_checksum = crc32fast::hash(&buf[0..60]);

        if stored_checksum != computed_checksum {
            return Err(StorageError::Corruption(format!(
                "Checkpoint header checksum mismatch: stored={}, computed={}",
                stored_checksum, computed_checksum
            )));
        }

        if buf[0..4] != CHECKPOINT_MAGIC {
            return Err(StorageError::InvalidCheckpoint(format!(
                "Invalid magic: {:?}",
                &buf[0..4]
            )));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version > CHECKPOINT_VERSION {
            return Err(StorageError::InvalidCheckpoint(format!(
                "Unsupported version: {}",
                version
            )));
        }

        let mut u64_buf = [0u8; 8];

        u64_buf.copy_from_slice(&buf[6..14]);
        let record_count = u64::from_le_bytes(u64_buf);

        u64_buf.copy_from_slice(&buf[14..22]);
        let min_timestamp = i64::from_le_bytes(u64_buf);

        u64_buf.copy_from_slice(&buf[22..30]);
        let max_timestamp = i64::from_le_bytes(u64_buf);

        u64_buf.copy_from_slice(&buf[30..38]);
        let next_id = u64::from_le_bytes(u64_buf);

        Ok(Self {
            version,
            record_count,
            min_timestamp,
            max_timestamp,
            next_id,
        })
    }
}

/// Result of loading a checkpoint
#[derive(Debug, Default)]
pub struct CheckpointData {
    /// Recovered snapshots, in file order
    pub snapshots: Vec<SystemSnapshot>,
    /// Next id recorded at write time
    pub next_id: u64,
    /// Frames dropped due to checksum or decode failures
    pub corrupt_frames: u64,
}

/// Write a checkpoint atomically (temp file, then rename)
pub fn write_checkpoint<'a, I>(
    path: &Path,
    snapshots: I,
    record_count: u64,
    next_id: u64,
) -> StorageResult<()>
where
    I: Iterator<Item = &'a SystemSnapshot>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path);
    let result = write_checkpoint_inner(&tmp_path, snapshots, record_count, next_id);

    match result {
        Ok(()) => {
            std::fs::rename(&tmp_path, path)?;
            Ok(())
        }
        Err(e) => {
            // Never leave a partial checkpoint behind
            let _ = std::fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

fn write_checkpoint_inner<'a, I>(
    tmp_path: &Path,
    snapshots: I,
    record_count: u64,
    next_id: u64,
) -> StorageResult<()>
where
    I: Iterator<Item = &'a SystemSnapshot>,
{
    let file = File::create(tmp_path)?;
    let mut writer = BufWriter::new(file);

    let mut min_timestamp = i64::MAX;
    let mut max_timestamp = i64::MIN;
    let mut written = 0u64;

    // Header goes first; bounds are rewritten after the frames
    writer.write_all(&[0u8; HEADER_SIZE])?;

    for snapshot in snapshots {
        min_timestamp = min_timestamp.min(snapshot.timestamp);
        max_timestamp = max_timestamp.max(snapshot.timestamp);

        let serialized = bincode::serialize(snapshot)?;
        let payload = lz4_flex::compress_prepend_size(&serialized);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&(payload.len() as u32).to_le_bytes());
        hasher.update(&payload);
        let crc = hasher.finalize();

        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(&payload)?;
        writer.write_all(&crc.to_le_bytes())?;

        written += 1;
    }

    if written != record_count {
        return Err(StorageError::InvalidCheckpoint(format!(
            "record count mismatch: expected {}, wrote {}",
            record_count, written
        )));
    }

    let header = CheckpointHeader {
        version: CHECKPOINT_VERSION,
        record_count,
        min_timestamp,
        max_timestamp,
        next_id,
    };

    writer.flush()?;

    // Rewrite the header now that bounds are known
    let mut file = writer.into_inner().map_err(|e| {
        StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    })?;
    use std::io::Seek;
    file.seek(std::io::SeekFrom::Start(0))?;
    file.write_all(&header.to_bytes())?;
    file.sync_all()?;

    Ok(())
}

/// Load a checkpoint, skipping corrupt frames
pub fn load_checkpoint(path: &Path) -> StorageResult<CheckpointData> {
    if !path.exists() {
        return Ok(CheckpointData::default());
    }

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut header_buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_buf)?;
    let header = CheckpointHeader::from_bytes(&header_buf)?;

    let mut data = CheckpointData {
        snapshots: Vec::with_capacity(header.record_count as usize),
        next_id: header.next_id,
        corrupt_frames: 0,
    };

    for _ in 0..header.record_count {
        match read_frame(&mut reader) {
            Ok(Some(snapshot)) => data.snapshots.push(snapshot),
            Ok(None) => break, // file shorter than the header claims
            Err(StorageError::Corruption(msg)) | Err(StorageError::Serialization(msg)) => {
                data.corrupt_frames += 1;
                tracing::warn!("Skipping corrupt checkpoint frame: {}", msg);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(data)
}

fn read_frame<R: Read>(reader: &mut R) -> StorageResult<Option<SystemSnapshot>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(len_buf) as usize;

    if len > MAX_FRAME_BYTES {
        return Err(StorageError::InvalidCheckpoint(format!(
            "Frame length too large: {}",
            len
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;

    let mut crc_buf = [0u8; 4];
    reader.read_exact(&mut crc_buf)?;
    let stored_crc = u32::from_le_bytes(crc_buf);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&len_buf);
    hasher.update(&payload);
    let computed_crc = hasher.finalize();

    if stored_crc != computed_crc {
        return Err(StorageError::Corruption(format!(
            "Frame CRC mismatch: stored={}, computed={}",
            stored_crc, computed_crc
        )));
    }

    let serialized = lz4_flex::decompress_size_prepended(&payload)
        .map_err(|e| StorageError::Corruption(format!("LZ4 decompression failed: {}", e)))?;

    let snapshot: SystemSnapshot = bincode::deserialize(&serialized)?;
    Ok(Some(snapshot))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
