use crate::core::walk::relative_key;
use crate::utils::error::{Result, UpdateError};
use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::ZipArchive;

/// 暫存目錄名稱前綴
pub const STAGING_PREFIX: &str = ".update_tmp_";

/// 解壓後的暫存區，由單一更新作業獨佔。
///
/// 離開作用域時一定會刪除整個暫存目錄。
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    roots: Vec<PathBuf>,
    files_extracted: usize,
}

impl StagingArea {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// 暫存根目錄下的頂層目錄，例如 GitHub 封存檔中的 `{repository}-{branch}`
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn files_extracted(&self) -> usize {
        self.files_extracted
    }

    /// 刪除暫存目錄。失敗只記錄警告，不會讓整個作業失敗。
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => tracing::debug!("Removed staging directory {}", path.display()),
            Err(e) => tracing::warn!(
                "⚠️ Could not remove staging directory {}: {}",
                path.display(),
                e
            ),
        }
    }
}

/// 在 `work_dir` 下建立暫存目錄並完整解壓 ZIP 封存檔。
///
/// 任何解壓失敗都會丟棄暫存目錄，工作目錄以外的內容不受影響。
pub fn stage<R: Read + Seek>(reader: R, work_dir: &Path) -> Result<StagingArea> {
    let mut archive = ZipArchive::new(reader)
        .map_err(|e| UpdateError::archive(format!("could not open archive: {}", e)))?;

    let dir = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(work_dir)
        .map_err(|e| UpdateError::io_at("could not create staging directory in", work_dir, e))?;

    tracing::debug!(
        "Extracting {} archive entries into {}",
        archive.len(),
        dir.path().display()
    );

    let files_extracted = extract_all(&mut archive, dir.path())?;
    let roots = top_level_roots(dir.path())?;

    tracing::info!(
        "📦 Staged {} files under {} root(s)",
        files_extracted,
        roots.len()
    );

    Ok(StagingArea {
        dir,
        roots,
        files_extracted,
    })
}

/// 直接從記憶體中的封存檔內容建立暫存區
pub fn stage_bytes(bytes: &[u8], work_dir: &Path) -> Result<StagingArea> {
    stage(std::io::Cursor::new(bytes), work_dir)
}

fn extract_all<R: Read + Seek>(archive: &mut ZipArchive<R>, dest: &Path) -> Result<usize> {
    let mut files = 0;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| UpdateError::archive(format!("could not read entry #{}: {}", index, e)))?;

        // enclosed_name 會拒絕絕對路徑與 `..`
        let relative = match entry.enclosed_name() {
            Some(path) if relative_key(&path).is_some() => path,
            _ => {
                return Err(UpdateError::archive(format!(
                    "entry escapes the extraction directory: {}",
                    entry.name()
                )))
            }
        };
        let out_path = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| UpdateError::io_at("could not create directory", &out_path, e))?;
            continue;
        }

        if entry.is_symlink() {
            tracing::warn!("⚠️ Skipping symlink entry in archive: {}", entry.name());
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| UpdateError::io_at("could not create directory", parent, e))?;
        }

        let mut out = fs::File::create(&out_path)
            .map_err(|e| UpdateError::io_at("could not create file", &out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| {
            UpdateError::archive(format!("extraction of {} failed: {}", entry.name(), e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                // 只保留權限位元，並確保擁有者可讀寫
                let permissions = fs::Permissions::from_mode((mode & 0o777) | 0o600);
                fs::set_permissions(&out_path, permissions).map_err(|e| {
                    UpdateError::io_at("could not set permissions on", &out_path, e)
                })?;
            }
        }

        files += 1;
    }

    Ok(files)
}

fn top_level_roots(staging: &Path) -> Result<Vec<PathBuf>> {
    let mut roots = Vec::new();
    let entries = fs::read_dir(staging)
        .map_err(|e| UpdateError::io_at("could not read staging directory", staging, e))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| UpdateError::io_at("could not read staging directory", staging, e))?;
        let path = entry.path();
        if path.is_dir() {
            roots.push(path);
        } else {
            tracing::warn!(
                "⚠️ Ignoring top-level file outside of a repository folder: {}",
                entry.file_name().to_string_lossy()
            );
        }
    }

    roots.sort();
    Ok(roots)
}
