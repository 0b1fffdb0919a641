use crate::core::walk::{walk_tree, EntryKind};
use crate::utils::error::{Result, UpdateError};
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

/// 備份檔名前綴。以此開頭的路徑不會被納入備份。
pub const BACKUP_PREFIX: &str = "backup_";

pub fn backup_file_name(now: DateTime<Local>) -> String {
    format!("{}{}.zip", BACKUP_PREFIX, now.format("%Y%m%d_%H%M%S"))
}

/// 將目標目錄目前的內容打包成 `backup_YYYYmmdd_HHMMSS.zip`，放在目標目錄內。
///
/// 目標目錄不存在時回傳 `Ok(None)`。
pub fn create_backup(target_directory: &Path) -> Result<Option<PathBuf>> {
    if !target_directory.is_dir() {
        tracing::debug!(
            "No backup: {} is not an existing directory",
            target_directory.display()
        );
        return Ok(None);
    }

    let backup_path = unique_backup_path(target_directory, Local::now());
    tracing::info!("💾 Creating backup {}", backup_path.display());

    match write_backup(target_directory, &backup_path) {
        Ok(entries) => {
            tracing::info!("💾 Backup contains {} entries", entries);
            Ok(Some(backup_path))
        }
        Err(e) => {
            // 不留下寫到一半的備份檔
            if let Err(remove_err) = fs::remove_file(&backup_path) {
                if remove_err.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        "⚠️ Could not remove incomplete backup {}: {}",
                        backup_path.display(),
                        remove_err
                    );
                }
            }
            Err(e)
        }
    }
}

fn unique_backup_path(target_directory: &Path, now: DateTime<Local>) -> PathBuf {
    let name = backup_file_name(now);
    let candidate = target_directory.join(&name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = name.trim_end_matches(".zip");
    (1..)
        .map(|n| target_directory.join(format!("{}_{}.zip", stem, n)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

fn write_backup(target_directory: &Path, backup_path: &Path) -> Result<usize> {
    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(backup_path)
        .map_err(|e| {
            UpdateError::backup(format!(
                "could not create {}: {}",
                backup_path.display(),
                e
            ))
        })?;

    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);
    let mut entries = 0;

    walk_tree(target_directory, &mut |entry| {
        if entry.key.is_empty() || entry.key.starts_with(BACKUP_PREFIX) {
            return Ok(());
        }

        match entry.kind {
            EntryKind::Directory => {
                zip.add_directory(entry.key.as_str(), options)
                    .map_err(|e| UpdateError::backup(format!("{}: {}", entry.key, e)))?;
            }
            EntryKind::File => {
                let mut source = fs::File::open(&entry.path).map_err(|e| {
                    UpdateError::backup(format!("could not read {}: {}", entry.path.display(), e))
                })?;
                zip.start_file(entry.key.as_str(), options)
                    .map_err(|e| UpdateError::backup(format!("{}: {}", entry.key, e)))?;
                io::copy(&mut source, &mut zip).map_err(|e| {
                    UpdateError::backup(format!("could not archive {}: {}", entry.path.display(), e))
                })?;
            }
        }

        entries += 1;
        Ok(())
    })
    .map_err(|e| match e {
        UpdateError::BackupError { .. } => e,
        other => UpdateError::backup(other.to_string()),
    })?;

    zip.finish()
        .map_err(|e| UpdateError::backup(format!("could not finalize archive: {}", e)))?;

    Ok(entries)
}
