use crate::utils::error::{Result, UpdateError};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// 走訪時的單一項目
#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub path: PathBuf,
    /// 相對於走訪根目錄，只包含一般段落
    pub relative: PathBuf,
    /// 以 `/` 連接的相對路徑，用於排除比對與 ZIP 項目名稱
    pub key: String,
    pub kind: EntryKind,
}

/// 將相對路徑轉成 `/` 分隔的字串。遇到 `..`、根目錄或前綴時回傳 `None`。
pub fn relative_key(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.join("/"))
}

/// 前序走訪：目錄先於其內容，同層項目依名稱排序。
///
/// 不會跟隨符號連結進入目錄；指向檔案的符號連結視為檔案。
pub fn walk_tree<F>(root: &Path, visit: &mut F) -> Result<()>
where
    F: FnMut(&TreeEntry) -> Result<()>,
{
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for dirent in walker {
        let dirent = dirent.map_err(|e| walk_error(root, e))?;
        let path = dirent.path();

        let kind = if dirent.path_is_symlink() {
            match fs::metadata(path) {
                Ok(target) if target.is_file() => EntryKind::File,
                _ => {
                    tracing::debug!("Skipping symlink {}", path.display());
                    continue;
                }
            }
        } else if dirent.file_type().is_dir() {
            EntryKind::Directory
        } else if dirent.file_type().is_file() {
            EntryKind::File
        } else {
            tracing::debug!("Skipping special file {}", path.display());
            continue;
        };

        let relative = path
            .strip_prefix(root)
            .map_err(|_| {
                UpdateError::io_at(
                    "entry outside of walk root",
                    path,
                    io::Error::from(io::ErrorKind::InvalidInput),
                )
            })?
            .to_path_buf();
        let key = relative_key(&relative).unwrap_or_default();

        visit(&TreeEntry {
            path: path.to_path_buf(),
            relative,
            key,
            kind,
        })?;
    }

    Ok(())
}

fn walk_error(root: &Path, err: walkdir::Error) -> UpdateError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    UpdateError::io_at("could not read directory", &path, io::Error::from(err))
}
