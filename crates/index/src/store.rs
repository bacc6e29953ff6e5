//! Checksummed, atomically replaced index files.
//!
//! Layout: a header line `paperchat-index v1 <sha256-hex>` followed by the
//! JSON body. The checksum covers the body bytes. Writes go to a uniquely
//! named temp file in the same directory, are fsynced, then renamed over the
//! target, so readers see either the old file or the new one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, SystemTime};

use paperchat_core::StorageError;
use sha2::{Digest, Sha256};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use crate::index::VectorIndex;

const MAGIC: &str = "paperchat-index";
const VERSION: &str = "v1";

/// Identity of an index file on disk, used to validate cached copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub modified: SystemTime,
    pub len: u64,
}

impl FileStamp {
    fn of(meta: &fs::Metadata) -> Self {
        Self {
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            len: meta.len(),
        }
    }
}

/// Serialize an index with its checksum header.
pub fn encode(index: &VectorIndex) -> Result<Vec<u8>, serde_json::Error> {
    let body = serde_json::to_vec(index)?;
    let digest = hex::encode(Sha256::digest(&body));
    let mut out = Vec::with_capacity(body.len() + MAGIC.len() + digest.len() + 8);
    out.extend_from_slice(format!("{MAGIC} {VERSION} {digest}\n").as_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse and verify a persisted index.
pub fn decode(path: &Path, bytes: &[u8]) -> Result<VectorIndex, StorageError> {
    let corrupt = |reason: String| StorageError::Corrupt {
        path: path.display().to_string(),
        reason,
    };

    let newline = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| corrupt("missing header".into()))?;
    let header = std::str::from_utf8(&bytes[..newline])
        .map_err(|_| corrupt("header is not UTF-8".into()))?;
    let body = &bytes[newline + 1..];

    let mut parts = header.split(' ');
    let (Some(magic), Some(version), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(corrupt(format!("malformed header '{header}'")));
    };
    if magic != MAGIC {
        return Err(corrupt(format!("not an index file (found '{magic}')")));
    }
    if version != VERSION {
        return Err(corrupt(format!("unsupported index version '{version}'")));
    }

    let actual = hex::encode(Sha256::digest(body));
    if actual != expected {
        return Err(corrupt("checksum mismatch".into()));
    }

    let index: VectorIndex =
        serde_json::from_slice(body).map_err(|e| corrupt(format!("invalid body: {e}")))?;
    index.check_consistency().map_err(corrupt)?;
    Ok(index)
}

/// Stat an index file. `None` when it does not exist.
pub async fn stat(path: &Path, timeout: Duration) -> Result<Option<FileStamp>, StorageError> {
    let fut = tokio::fs::metadata(path);
    match tokio::time::timeout(timeout, fut).await {
        Err(_) => Err(timed_out("index stat", timeout)),
        Ok(Ok(meta)) => Ok(Some(FileStamp::of(&meta))),
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
        Ok(Err(e)) => Err(io_error(path, &e)),
    }
}

/// Read and verify an index file. `None` when it does not exist.
pub async fn read(
    path: PathBuf,
    timeout: Duration,
) -> Result<Option<(VectorIndex, FileStamp)>, StorageError> {
    run_blocking("index load", timeout, move || {
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, &e)),
        };
        let meta = fs::metadata(&path).map_err(|e| io_error(&path, &e))?;
        let index = decode(&path, &bytes)?;
        debug!(path = %path.display(), entries = index.len(), "Loaded index file");
        Ok(Some((index, FileStamp::of(&meta))))
    })
    .await
}

/// Persist an index atomically, returning the new file's stamp.
///
/// `guard` is the collection's write lock. It moves into the blocking task
/// and comes back with the result, so the caller can publish the new index
/// before releasing it. A write that outlives its time budget keeps the
/// lock until the task ends and is abandoned before its rename; if the
/// rename already started, its real outcome is reported instead of a
/// timeout.
pub async fn write(
    path: PathBuf,
    index: Arc<VectorIndex>,
    timeout: Duration,
    guard: OwnedMutexGuard<()>,
) -> Result<(FileStamp, OwnedMutexGuard<()>), StorageError> {
    run_gated("index persist", timeout, guard, move |gate| {
        let bytes = encode(&index).map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            reason: format!("serialize: {e}"),
        })?;
        write_atomic(&path, &bytes, gate)?;
        let meta = fs::metadata(&path).map_err(|e| io_error(&path, &e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "Persisted index file");
        Ok(FileStamp::of(&meta))
    })
    .await
}

/// Remove a collection directory. Returns whether it existed, with the
/// write lock handed back as in [`write`].
pub async fn remove_dir(
    dir: PathBuf,
    timeout: Duration,
    guard: OwnedMutexGuard<()>,
) -> Result<(bool, OwnedMutexGuard<()>), StorageError> {
    run_gated("index delete", timeout, guard, move |gate| {
        if !gate.enter() {
            return Err(abandoned(&dir));
        }
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&dir, &e)),
        }
    })
    .await
}

const PENDING: u8 = 0;
const COMMITTING: u8 = 1;
const ABANDONED: u8 = 2;

/// Decides, exactly once, whether a blocking change becomes visible or is
/// dropped because the caller stopped waiting.
struct CommitGate(Arc<AtomicU8>);

impl CommitGate {
    /// Claim the right to make the change visible. `false` once abandoned.
    fn enter(&self) -> bool {
        self.0
            .compare_exchange(PENDING, COMMITTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn abandon(&self) -> bool {
        self.0
            .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

fn write_atomic(path: &Path, bytes: &[u8], gate: &CommitGate) -> Result<(), StorageError> {
    let dir = path.parent().ok_or_else(|| StorageError::Io {
        path: path.display().to_string(),
        reason: "index path has no parent directory".into(),
    })?;
    fs::create_dir_all(dir).map_err(|e| io_error(dir, &e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".into());
    let tmp = dir.join(format!("{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        if !gate.enter() {
            return Err(std::io::Error::other("write abandoned after timeout"));
        }
        fs::rename(&tmp, path)?;
        // Make the rename itself durable where the platform allows it.
        if let Ok(d) = File::open(dir) {
            let _ = d.sync_all();
        }
        Ok::<(), std::io::Error>(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(io_error(path, &e));
    }
    Ok(())
}

async fn run_blocking<T, F>(
    operation: &'static str,
    timeout: Duration,
    f: F,
) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Err(_) => Err(timed_out(operation, timeout)),
        Ok(joined) => flatten(operation, joined),
    }
}

async fn run_gated<T, F>(
    operation: &'static str,
    timeout: Duration,
    guard: OwnedMutexGuard<()>,
    f: F,
) -> Result<(T, OwnedMutexGuard<()>), StorageError>
where
    T: Send + 'static,
    F: FnOnce(&CommitGate) -> Result<T, StorageError> + Send + 'static,
{
    let state = Arc::new(AtomicU8::new(PENDING));
    let gate = CommitGate(state.clone());
    // On failure the guard drops with the task, never before it.
    let mut task = tokio::task::spawn_blocking(move || f(&gate).map(|value| (value, guard)));

    match tokio::time::timeout(timeout, &mut task).await {
        Ok(joined) => flatten(operation, joined),
        Err(_) if CommitGate(state).abandon() => {
            warn!(operation, "Storage write abandoned after timeout");
            Err(timed_out(operation, timeout))
        }
        // Already committing: the change lands, so report how it went.
        Err(_) => flatten(operation, task.await),
    }
}

fn flatten<T>(
    operation: &str,
    joined: Result<Result<T, StorageError>, tokio::task::JoinError>,
) -> Result<T, StorageError> {
    match joined {
        Ok(result) => result,
        Err(join) => Err(StorageError::Io {
            path: String::new(),
            reason: format!("{operation} task failed: {join}"),
        }),
    }
}

fn abandoned(path: &Path) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        reason: "abandoned after timeout".into(),
    }
}

fn timed_out(operation: &str, timeout: Duration) -> StorageError {
    StorageError::Timeout {
        operation: operation.into(),
        secs: timeout.as_secs(),
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
