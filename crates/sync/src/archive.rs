//! Component and model archives.
//!
//! Archives are zip containers whose entry names are paths relative to the
//! model root, so extraction restores the original cache layout. Integrity
//! is a SHA-256 over the full archive byte stream, carried alongside the
//! archive, never inside it. Verification always happens before extraction;
//! a failed verification leaves the filesystem untouched.

use crate::cache::ModelCache;
use crate::error::{SyncError, SyncResult};
use modelvault_core::ContentHash;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use tokio::sync::Mutex as AsyncMutex;
use zip::ZipWriter;
use zip::read::ZipArchive;
use zip::write::FileOptions;

/// Per-model-root archive mutex.
///
/// Serializes in-process access to a model's shared staging files; exclusion
/// across processes and hosts comes from the distributed sync lock at the
/// orchestration layer.
fn archive_mutex(model_path: &Path) -> Arc<AsyncMutex<()>> {
    static LOCKS: OnceLock<StdMutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>> = OnceLock::new();
    let locks = LOCKS.get_or_init(|| StdMutex::new(HashMap::new()));
    let mut map = locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    map.entry(model_path.to_path_buf()).or_default().clone()
}

/// Pack a component's variables/data and checkpoint subtrees.
///
/// Returns the staged archive path and the SHA-256 of the archive bytes.
pub async fn pack_component(
    cache: &ModelCache,
    component_name: &str,
) -> SyncResult<(PathBuf, ContentHash)> {
    let mutex = archive_mutex(cache.model_path());
    let _guard = mutex.lock().await;

    let archive_path = cache.component_archive_path(component_name);
    let model_root = cache.model_path().to_path_buf();
    let subtrees = vec![
        cache.variables_data_path().join(component_name),
        cache.checkpoint_path().join(component_name),
    ];

    let path = archive_path.clone();
    let hash = spawn_archive_task(move || pack_blocking(&path, &model_root, &subtrees)).await?;

    tracing::debug!(
        component = component_name,
        archive = %archive_path.display(),
        hash = %hash,
        "packed component archive"
    );
    Ok((archive_path, hash))
}

/// Unpack a component's staged archive into the model root.
///
/// When `expected` is given, the archive's SHA-256 is recomputed first and a
/// mismatch aborts without extracting anything. Extraction may overwrite
/// existing files.
pub async fn unpack_component(
    cache: &ModelCache,
    component_name: &str,
    expected: Option<&ContentHash>,
) -> SyncResult<()> {
    let mutex = archive_mutex(cache.model_path());
    let _guard = mutex.lock().await;

    let archive_path = cache.component_archive_path(component_name);
    unpack_locked(&archive_path, cache.model_path(), expected).await
}

/// Pack the whole model tree (define, variables, run_parameters,
/// checkpoint).
pub(crate) async fn pack_model(cache: &ModelCache) -> SyncResult<(PathBuf, ContentHash)> {
    let mutex = archive_mutex(cache.model_path());
    let _guard = mutex.lock().await;

    let archive_path = cache.model_archive_path();
    let model_root = cache.model_path().to_path_buf();
    let subtrees = vec![model_root.clone()];

    let path = archive_path.clone();
    let hash = spawn_archive_task(move || pack_blocking(&path, &model_root, &subtrees)).await?;
    Ok((archive_path, hash))
}

/// Unpack the staged whole-model archive into the model root.
pub(crate) async fn unpack_model(
    cache: &ModelCache,
    expected: Option<&ContentHash>,
) -> SyncResult<()> {
    let mutex = archive_mutex(cache.model_path());
    let _guard = mutex.lock().await;

    let archive_path = cache.model_archive_path();
    unpack_locked(&archive_path, cache.model_path(), expected).await
}

async fn unpack_locked(
    archive_path: &Path,
    model_root: &Path,
    expected: Option<&ContentHash>,
) -> SyncResult<()> {
    if let Some(expected) = expected {
        let actual = hash_archive(archive_path).await?;
        if actual != *expected {
            return Err(SyncError::IntegrityMismatch {
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            });
        }
    }

    let archive_path = archive_path.to_path_buf();
    let model_root = model_root.to_path_buf();
    spawn_archive_task(move || unpack_blocking(&archive_path, &model_root)).await
}

/// Recompute the SHA-256 of a staged archive.
pub async fn hash_archive(archive_path: &Path) -> SyncResult<ContentHash> {
    let path = archive_path.to_path_buf();
    spawn_archive_task(move || {
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SyncError::NotFound(format!("archive at {}", path.display()))
            } else {
                SyncError::Io(e)
            }
        })?;
        Ok(ContentHash::compute(&bytes))
    })
    .await
}

async fn spawn_archive_task<T, F>(task: F) -> SyncResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> SyncResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| SyncError::Internal(format!("archive task failed: {e}")))?
}

fn pack_blocking(
    archive_path: &Path,
    model_root: &Path,
    subtrees: &[PathBuf],
) -> SyncResult<ContentHash> {
    if let Some(parent) = archive_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(archive_path)?;
    let mut writer = ZipWriter::new(std::io::BufWriter::new(file));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for subtree in subtrees {
        add_tree(&mut writer, model_root, subtree, options)?;
    }

    let mut inner = writer.finish()?;
    inner.flush()?;
    drop(inner);

    let bytes = std::fs::read(archive_path)?;
    Ok(ContentHash::compute(&bytes))
}

fn add_tree(
    writer: &mut ZipWriter<std::io::BufWriter<std::fs::File>>,
    model_root: &Path,
    dir: &Path,
    options: FileOptions,
) -> SyncResult<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        // A component without checkpoints simply has no checkpoint subtree.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(SyncError::Io(e)),
    };

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            add_tree(writer, model_root, &path, options)?;
        } else {
            let name = entry_name(model_root, &path)?;
            writer.start_file(name, options)?;
            let mut file = std::fs::File::open(&path)?;
            std::io::copy(&mut file, writer)?;
        }
    }
    Ok(())
}

/// Entry name relative to the model root, with forward slashes.
fn entry_name(model_root: &Path, path: &Path) -> SyncResult<String> {
    let relative = path.strip_prefix(model_root).map_err(|_| {
        SyncError::Internal(format!(
            "path {} is outside model root {}",
            path.display(),
            model_root.display()
        ))
    })?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

fn unpack_blocking(archive_path: &Path, model_root: &Path) -> SyncResult<()> {
    let file = std::fs::File::open(archive_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SyncError::NotFound(format!("archive at {}", archive_path.display()))
        } else {
            SyncError::Io(e)
        }
    })?;

    let mut archive = ZipArchive::new(file)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(SyncError::Internal(format!(
                "archive entry escapes model root: {}",
                entry.name()
            )));
        };
        let dest = model_root.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&dest)?;
        std::io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}
