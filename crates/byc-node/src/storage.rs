//! Persistent layout.
//!
//! One data directory holds:
//! - `blocks/NNNNNN.dat` — one canonical block serialization per file,
//!   named by main-chain height;
//! - `utxo.snap` — the UTXO snapshot: `"BYCU" || version (1) ||
//!   count (u32 LE) || entries sorted by outpoint || trailer_hash (32)`
//!   where the trailer is double-SHA-256 over everything before it;
//! - `utxo.snap.bak` — the previous snapshot, used as a fallback when the
//!   primary fails its hash check.
//!
//! Snapshot writes go to a temp file and rename into place, rotating the
//! old primary into the backup slot. Write operations retry a bounded
//! number of times before surfacing an error.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use byc_core::block::Block;
use byc_core::constants::{MAX_IO_RETRIES, SNAPSHOT_MAGIC};
use byc_core::error::StorageError;
use byc_core::hash::hash256;

/// Flat-file block and snapshot store rooted at a data directory.
pub struct FileStore {
    blocks_dir: PathBuf,
    snapshot_path: PathBuf,
}

impl FileStore {
    /// Open (creating directories as needed) a store under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        let blocks_dir = data_dir.join("blocks");
        fs::create_dir_all(&blocks_dir).map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(Self { blocks_dir, snapshot_path: data_dir.join("utxo.snap") })
    }

    fn block_path(&self, height: u64) -> PathBuf {
        self.blocks_dir.join(format!("{height:06}.dat"))
    }

    fn backup_path(&self) -> PathBuf {
        self.snapshot_path.with_extension("snap.bak")
    }

    /// Retry a fallible write a bounded number of times with backoff.
    fn with_retries<T>(
        mut op: impl FnMut() -> std::io::Result<T>,
    ) -> Result<T, StorageError> {
        let mut last_err = None;
        for attempt in 0..MAX_IO_RETRIES {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(attempt, %err, "storage write failed; retrying");
                    last_err = Some(err);
                    std::thread::sleep(std::time::Duration::from_millis(
                        10 * (attempt as u64 + 1),
                    ));
                }
            }
        }
        Err(StorageError::Io(last_err.expect("at least one attempt ran").to_string()))
    }

    /// Persist a block at its main-chain height.
    pub fn write_block(&self, block: &Block) -> Result<(), StorageError> {
        let path = self.block_path(block.header.height);
        let bytes = block.encode();
        Self::with_retries(|| {
            let tmp = path.with_extension("dat.tmp");
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        })?;
        debug!(height = block.header.height, "block persisted");
        Ok(())
    }

    /// Read the block stored at a main-chain height.
    pub fn read_block(&self, height: u64) -> Result<Option<Block>, StorageError> {
        let path = self.block_path(height);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::Io(err.to_string())),
        };
        Block::decode(&bytes).map(Some).map_err(|_| StorageError::BlockFileMissing(height))
    }

    /// Delete the block file at a height (after a reorg shortens the
    /// chain). Missing files are fine.
    pub fn remove_block(&self, height: u64) -> Result<(), StorageError> {
        match fs::remove_file(self.block_path(height)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err.to_string())),
        }
    }

    /// Heights with a stored block file, ascending.
    pub fn stored_heights(&self) -> Result<Vec<u64>, StorageError> {
        let mut heights = Vec::new();
        let entries =
            fs::read_dir(&self.blocks_dir).map_err(|e| StorageError::Io(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::Io(e.to_string()))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".dat") {
                if let Ok(height) = stem.parse::<u64>() {
                    heights.push(height);
                }
            }
        }
        heights.sort_unstable();
        Ok(heights)
    }

    /// Write the snapshot file: magic, payload, trailer hash. The previous
    /// primary rotates into the backup slot.
    pub fn write_snapshot(&self, payload: &[u8]) -> Result<(), StorageError> {
        let mut bytes = Vec::with_capacity(4 + payload.len() + 32);
        bytes.extend_from_slice(&SNAPSHOT_MAGIC);
        bytes.extend_from_slice(payload);
        let trailer = hash256(&bytes);
        bytes.extend_from_slice(trailer.as_bytes());

        let path = self.snapshot_path.clone();
        let backup = self.backup_path();
        Self::with_retries(|| {
            let tmp = path.with_extension("snap.tmp");
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            if path.exists() {
                fs::rename(&path, &backup)?;
            }
            fs::rename(&tmp, &path)
        })?;
        debug!(bytes = bytes.len(), "snapshot persisted");
        Ok(())
    }

    /// Read and verify the snapshot, falling back to the backup when the
    /// primary fails its hash check. Returns the inner payload.
    pub fn read_snapshot(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match Self::verify_snapshot_file(&self.snapshot_path)? {
            Some(payload) => Ok(Some(payload)),
            None => {
                if !self.snapshot_path.exists() && !self.backup_path().exists() {
                    return Ok(None);
                }
                warn!("primary snapshot unusable; trying backup");
                match Self::verify_snapshot_file(&self.backup_path())? {
                    Some(payload) => Ok(Some(payload)),
                    None => Err(StorageError::SnapshotCorrupt),
                }
            }
        }
    }

    /// Verify one snapshot file; `Ok(None)` when absent or corrupt.
    fn verify_snapshot_file(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::Io(err.to_string())),
        };
        if bytes.len() < 4 + 32 || bytes[..4] != SNAPSHOT_MAGIC {
            return Ok(None);
        }
        let (body, trailer) = bytes.split_at(bytes.len() - 32);
        if hash256(body).as_bytes() != trailer {
            return Ok(None);
        }
        Ok(Some(body[4..].to_vec()))
    }
}
