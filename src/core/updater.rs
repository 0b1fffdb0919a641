use crate::core::{backup, merge, stager};
use crate::domain::model::{UpdateOutcome, UpdateRequest};
use crate::domain::ports::ArchiveSource;
use crate::utils::error::{Result, UpdateError};
use crate::utils::monitor::SystemMonitor;
use crate::utils::validation::{validate_non_empty_string, validate_target_directory};

/// 更新流程：驗證 → 下載 → 備份 → 暫存 → 合併。
///
/// 引擎不做任何鎖定，同一個目標目錄的更新必須由呼叫端排隊執行。
pub struct UpdateEngine<S: ArchiveSource> {
    source: S,
    monitor_enabled: bool,
}

impl<S: ArchiveSource> UpdateEngine<S> {
    pub fn new(source: S) -> Self {
        Self::new_with_monitoring(source, false)
    }

    pub fn new_with_monitoring(source: S, monitor_enabled: bool) -> Self {
        Self {
            source,
            monitor_enabled,
        }
    }

    pub async fn run(&self, request: &UpdateRequest) -> Result<UpdateOutcome> {
        let mut monitor = SystemMonitor::new(self.monitor_enabled);

        // 驗證：失敗時不產生任何副作用
        validate_non_empty_string("owner", &request.repository.owner)?;
        validate_non_empty_string("repository", &request.repository.repository)?;
        validate_non_empty_string("branch", &request.branch)?;
        validate_target_directory(&request.target_directory)?;
        if let Some(parent) = &request.staging_parent {
            validate_target_directory(parent)?;
        }

        tracing::info!(
            "🚀 Updating {} from {}@{}",
            request.target_directory.display(),
            request.repository,
            request.branch
        );

        // 下載：失敗時目標目錄完全未被修改
        let archive = self
            .source
            .fetch_archive(&request.repository, &request.branch)
            .await?;
        let archive_bytes = archive
            .metadata()
            .map_err(|e| UpdateError::io("could not inspect downloaded archive", e))?
            .len();
        tracing::info!("⬇️ Downloaded archive ({} bytes)", archive_bytes);
        monitor.log_phase("download");

        let backup_path = if request.create_backup {
            let path = backup::create_backup(&request.target_directory)?;
            monitor.log_phase("backup");
            path
        } else {
            None
        };

        let work_dir = request
            .staging_parent
            .as_deref()
            .unwrap_or(&request.target_directory);
        let staging = stager::stage(archive, work_dir)?;
        monitor.log_phase("staging");

        let merge = merge::apply(staging, &request.target_directory, &request.excludes)?;
        monitor.log_phase("merge");
        monitor.log_final_stats();

        Ok(UpdateOutcome {
            archive_bytes,
            backup_path,
            merge,
        })
    }
}
