use crate::core::exclusion::{ExclusionRule, ExclusionSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub repository: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            owner: owner.into().trim().to_string(),
            repository: repository.into().trim().to_string(),
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repository)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub commit_summary: Option<String>,
    pub commit_sha: Option<String>,
}

impl BranchInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_commit_at: None,
            commit_summary: None,
            commit_sha: None,
        }
    }
}

/// 最近更新的分支在前，沒有時間的排最後，同時間依名稱排序
pub fn sort_branches(branches: &mut [BranchInfo]) {
    branches.sort_by(|a, b| {
        b.last_commit_at
            .cmp(&a.last_commit_at)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// 合併結果：實際發揮作用的排除規則 (已排序、去重) 與統計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub excluded: BTreeSet<ExclusionRule>,
    pub files_copied: usize,
    pub directories_created: usize,
}

impl MergeResult {
    pub fn excluded_paths(&self) -> Vec<String> {
        self.excluded.iter().map(|rule| rule.to_string()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub repository: RepositoryRef,
    pub branch: String,
    pub target_directory: PathBuf,
    pub excludes: ExclusionSet,
    pub create_backup: bool,
    /// 暫存目錄的父目錄，預設為目標目錄本身
    pub staging_parent: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub archive_bytes: u64,
    pub backup_path: Option<PathBuf>,
    pub merge: MergeResult,
}

impl UpdateOutcome {
    /// 給操作人員看的報告
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(path) = &self.backup_path {
            lines.push(format!("Backup created: {}", path.display()));
        }
        let excluded = self.merge.excluded_paths();
        if !excluded.is_empty() {
            lines.push(format!(
                "The following paths were excluded from the update: {}",
                excluded.join(", ")
            ));
        }
        lines.push("Update finished. Files were overwritten.".to_string());
        lines
    }
}
