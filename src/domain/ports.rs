use crate::domain::model::{BranchInfo, RepositoryRef};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fs::File;

/// 取得分支封存檔 (ZIP) 的外部來源
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// 回傳已完整下載的暫存檔，讀取位置在檔案開頭
    async fn fetch_archive(&self, repository: &RepositoryRef, branch: &str) -> Result<File>;
}

/// 列出遠端儲存庫分支，依 [`crate::domain::model::sort_branches`] 排序
#[async_trait]
pub trait BranchLister: Send + Sync {
    async fn list_branches(&self, repository: &RepositoryRef) -> Result<Vec<BranchInfo>>;
}
