use crate::core::exclusion::ExclusionSet;
use crate::core::stager::StagingArea;
use crate::core::walk::{walk_tree, EntryKind};
use crate::domain::model::MergeResult;
use crate::utils::error::{Result, UpdateError};
use std::fs;
use std::io;
use std::path::Path;

/// 將暫存區內容覆蓋到目標目錄，略過符合排除規則的路徑。
///
/// 不論成功或失敗，暫存區都會被刪除。中途失敗不會回滾已經複製的檔案。
pub fn apply(
    staging: StagingArea,
    target_directory: &Path,
    excludes: &ExclusionSet,
) -> Result<MergeResult> {
    let outcome = apply_roots(&staging, target_directory, excludes);
    staging.cleanup();
    outcome
}

fn apply_roots(
    staging: &StagingArea,
    target_directory: &Path,
    excludes: &ExclusionSet,
) -> Result<MergeResult> {
    let mut result = MergeResult::default();

    for root in staging.roots() {
        tracing::debug!(
            "Merging {} into {}",
            root.display(),
            target_directory.display()
        );
        copy_tree(root, target_directory, excludes, &mut result)?;
    }

    tracing::info!(
        "🔀 Merge finished: {} files copied, {} directories created, {} exclusion(s) applied",
        result.files_copied,
        result.directories_created,
        result.excluded.len()
    );
    Ok(result)
}

/// 以前序走訪複製單一來源樹，目錄一定在其內容之前建立。
///
/// 目標中已存在的符號連結不會被覆寫或穿越；遇到時以 `IoError` 失敗。
/// 要保留這類連結，請把它列入排除規則。
pub fn copy_tree(
    source: &Path,
    destination: &Path,
    excludes: &ExclusionSet,
    result: &mut MergeResult,
) -> Result<()> {
    let root = destination
        .canonicalize()
        .map_err(|e| UpdateError::io_at("could not resolve target directory", destination, e))?;

    walk_tree(source, &mut |entry| {
        if entry.key.is_empty() {
            return Ok(());
        }

        if let Some(rule) = excludes.matches(&entry.key) {
            tracing::debug!("Excluded {} (rule: {})", entry.key, rule);
            result.excluded.insert(rule.clone());
            return Ok(());
        }

        let target_path = destination.join(&entry.relative);
        ensure_inside(&root, &target_path)?;

        match entry.kind {
            EntryKind::Directory => {
                if !target_path.is_dir() {
                    fs::create_dir_all(&target_path).map_err(|e| {
                        UpdateError::io_at("could not create directory", &target_path, e)
                    })?;
                    result.directories_created += 1;
                }
            }
            EntryKind::File => {
                if let Some(parent) = target_path.parent() {
                    if !parent.is_dir() {
                        fs::create_dir_all(parent).map_err(|e| {
                            UpdateError::io_at("could not create directory", parent, e)
                        })?;
                        result.directories_created += 1;
                    }
                }
                fs::copy(&entry.path, &target_path)
                    .map_err(|e| UpdateError::io_at("could not copy file", &target_path, e))?;
                result.files_copied += 1;
            }
        }

        Ok(())
    })
}

/// `target_path` 本身不可是符號連結，且最近一個已存在的上層目錄必須解析到 `root` 之內
fn ensure_inside(root: &Path, target_path: &Path) -> Result<()> {
    if let Ok(metadata) = fs::symlink_metadata(target_path) {
        if metadata.file_type().is_symlink() {
            return Err(UpdateError::io_at(
                "refusing to write through symlink",
                target_path,
                io::Error::new(io::ErrorKind::InvalidInput, "target path is a symlink"),
            ));
        }
    }

    let mut ancestor = target_path.parent();
    while let Some(dir) = ancestor {
        if fs::symlink_metadata(dir).is_ok() {
            let resolved = dir
                .canonicalize()
                .map_err(|e| UpdateError::io_at("could not resolve", dir, e))?;
            if !resolved.starts_with(root) {
                return Err(UpdateError::io_at(
                    "refusing to write outside the target directory",
                    target_path,
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("parent resolves to {}", resolved.display()),
                    ),
                ));
            }
            return Ok(());
        }
        ancestor = dir.parent();
    }

    Ok(())
}
