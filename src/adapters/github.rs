use crate::config::toml_config::GitHubSettings;
use crate::domain::model::{sort_branches, BranchInfo, RepositoryRef};
use crate::domain::ports::{ArchiveSource, BranchLister};
use crate::utils::error::{Result, UpdateError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// GitHub 單頁回傳的最大分支數
const BRANCHES_PER_PAGE: usize = 100;
/// 同時進行的提交細節請求數
const COMMIT_DETAIL_CONCURRENCY: usize = 8;

#[derive(Debug, Deserialize)]
struct BranchResponse {
    name: String,
    commit: Option<CommitRef>,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: Option<String>,
    committer: Option<Signature>,
    author: Option<Signature>,
}

#[derive(Debug, Deserialize)]
struct Signature {
    date: Option<DateTime<Utc>>,
}

/// GitHub REST API 與 codeload 的客戶端
pub struct GitHubClient {
    settings: GitHubSettings,
    api: Client,
    download: Client,
}

impl GitHubClient {
    pub fn new(settings: GitHubSettings) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );

        let api = Client::builder()
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.api_timeout_seconds))
            .build()?;
        let download = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.download_timeout_seconds))
            .build()?;

        Ok(Self {
            settings,
            api,
            download,
        })
    }

    /// 在 base URL 後加上逐段編碼的路徑
    fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(base)
            .map_err(|e| UpdateError::config(format!("invalid base URL {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| UpdateError::config(format!("base URL cannot have a path: {}", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn branches_url(&self, repository: &RepositoryRef) -> Result<Url> {
        let mut url = Self::endpoint(
            &self.settings.api_base,
            &[
                "repos",
                repository.owner.as_str(),
                repository.repository.as_str(),
                "branches",
            ],
        )?;
        url.query_pairs_mut()
            .append_pair("per_page", &BRANCHES_PER_PAGE.to_string());
        Ok(url)
    }

    pub fn commit_url(&self, repository: &RepositoryRef, sha: &str) -> Result<Url> {
        Self::endpoint(
            &self.settings.api_base,
            &[
                "repos",
                repository.owner.as_str(),
                repository.repository.as_str(),
                "commits",
                sha,
            ],
        )
    }

    pub fn archive_url(&self, repository: &RepositoryRef, branch: &str) -> Result<Url> {
        Self::endpoint(
            &self.settings.download_base,
            &[
                repository.owner.as_str(),
                repository.repository.as_str(),
                "zip",
                "refs",
                "heads",
                branch,
            ],
        )
    }

    fn check_status(status: StatusCode, what: &str) -> Result<()> {
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(UpdateError::retrieval(format!("{} not found", what))),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Err(UpdateError::retrieval(
                format!("rate limited while requesting {}", what),
            )),
            s => Err(UpdateError::retrieval(format!(
                "unexpected status {} for {}",
                s, what
            ))),
        }
    }

    async fn commit_details(&self, repository: &RepositoryRef, sha: &str) -> Result<CommitResponse> {
        let url = self.commit_url(repository, sha)?;
        tracing::debug!("Fetching commit details: {}", url);
        let response = self.api.get(url).send().await?;
        Self::check_status(response.status(), &format!("commit {}", sha))?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn branch_info(&self, repository: &RepositoryRef, branch: BranchResponse) -> BranchInfo {
        let mut info = BranchInfo::named(branch.name);
        let Some(commit) = branch.commit else {
            return info;
        };
        info.commit_sha = Some(commit.sha.clone());

        // 取不到提交細節時仍列出分支
        match self.commit_details(repository, &commit.sha).await {
            Ok(details) => {
                let signature = details.commit.committer.or(details.commit.author);
                info.last_commit_at = signature.and_then(|s| s.date);
                info.commit_summary = details
                    .commit
                    .message
                    .as_deref()
                    .and_then(|m| m.lines().next())
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty());
                info.commit_sha = Some(details.sha);
            }
            Err(e) => tracing::warn!(
                "⚠️ Could not load commit details for branch {}: {}",
                info.name,
                e
            ),
        }
        info
    }
}

#[async_trait]
impl BranchLister for GitHubClient {
    async fn list_branches(&self, repository: &RepositoryRef) -> Result<Vec<BranchInfo>> {
        let url = self.branches_url(repository)?;
        tracing::debug!("Making API request to: {}", url);

        let response = self.api.get(url).send().await?;
        tracing::debug!("API response status: {}", response.status());
        Self::check_status(response.status(), &format!("repository {}", repository))?;

        let body = response.bytes().await?;
        let raw: Vec<BranchResponse> = serde_json::from_slice(&body)?;
        if raw.len() >= BRANCHES_PER_PAGE {
            tracing::warn!(
                "⚠️ {} returned a full page of {} branches; additional branches are not listed",
                repository,
                raw.len()
            );
        }

        let mut branches: Vec<BranchInfo> = stream::iter(raw)
            .map(|branch| self.branch_info(repository, branch))
            .buffer_unordered(COMMIT_DETAIL_CONCURRENCY)
            .collect()
            .await;

        sort_branches(&mut branches);
        tracing::info!("🌿 Found {} branches in {}", branches.len(), repository);
        Ok(branches)
    }
}

#[async_trait]
impl ArchiveSource for GitHubClient {
    async fn fetch_archive(&self, repository: &RepositoryRef, branch: &str) -> Result<File> {
        let url = self.archive_url(repository, branch)?;
        tracing::debug!("Downloading archive from: {}", url);

        let mut response = self.download.get(url).send().await?;
        Self::check_status(
            response.status(),
            &format!("branch {} of {}", branch, repository),
        )?;

        // 直接寫入匿名暫存檔，關閉後由作業系統回收
        let file = tempfile::tempfile()
            .map_err(|e| UpdateError::io("could not create download file", e))?;
        let mut file = tokio::fs::File::from_std(file);
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| UpdateError::io("could not write downloaded archive", e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| UpdateError::io("could not write downloaded archive", e))?;

        let mut file = file.into_std().await;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| UpdateError::io("could not rewind downloaded archive", e))?;
        tracing::debug!("Streamed {} bytes to a temporary file", written);
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> GitHubClient {
        GitHubClient::new(GitHubSettings {
            api_base: server.base_url(),
            download_base: server.url("/codeload"),
            ..GitHubSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn test_urls_are_percent_encoded() {
        let client = GitHubClient::new(GitHubSettings::default()).unwrap();
        let repo = RepositoryRef::new("acme", "site");

        assert_eq!(
            client.archive_url(&repo, "feature/login").unwrap().as_str(),
            "https://codeload.github.com/acme/site/zip/refs/heads/feature%2Flogin"
        );
        assert_eq!(
            client.branches_url(&repo).unwrap().as_str(),
            "https://api.github.com/repos/acme/site/branches?per_page=100"
        );
    }

    #[tokio::test]
    async fn test_list_branches_sorted_newest_first() {
        let server = MockServer::start();
        let branches_mock = server.mock(|when, then| {
            when.method(GET).path("/repos/acme/site/branches");
            then.status(200).json_body(serde_json::json!([
                {"name": "main", "commit": {"sha": "aaa"}},
                {"name": "develop", "commit": {"sha": "bbb"}},
                {"name": "legacy", "commit": {"sha": "ccc"}}
            ]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/site/commits/aaa");
            then.status(200).json_body(serde_json::json!({
                "sha": "aaa",
                "commit": {
                    "message": "Release 1.2\n\nlong description",
                    "committer": {"date": "2024-05-01T10:00:00Z"}
                }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/site/commits/bbb");
            then.status(200).json_body(serde_json::json!({
                "sha": "bbb",
                "commit": {
                    "message": "WIP",
                    "committer": {"date": "2024-06-01T10:00:00Z"}
                }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/site/commits/ccc");
            then.status(500);
        });

        let client = client_for(&server);
        let branches = client
            .list_branches(&RepositoryRef::new("acme", "site"))
            .await
            .unwrap();

        branches_mock.assert();
        let names: Vec<_> = branches.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["develop", "main", "legacy"]);
        assert_eq!(branches[1].commit_summary.as_deref(), Some("Release 1.2"));
        assert_eq!(branches[2].commit_sha.as_deref(), Some("ccc"));
        assert!(branches[2].last_commit_at.is_none());
    }

    #[tokio::test]
    async fn test_unknown_repository_is_retrieval_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/missing/branches");
            then.status(404);
        });

        let client = client_for(&server);
        let err = client
            .list_branches(&RepositoryRef::new("acme", "missing"))
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::RetrievalError { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_fetch_archive_returns_body() {
        let server = MockServer::start();
        let archive_mock = server.mock(|when, then| {
            when.method(GET).path("/codeload/acme/site/zip/refs/heads/main");
            then.status(200).body(b"PK-bytes".to_vec());
        });

        let client = client_for(&server);
        let mut file = client
            .fetch_archive(&RepositoryRef::new("acme", "site"), "main")
            .await
            .unwrap();

        archive_mock.assert();
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut bytes).unwrap();
        assert_eq!(bytes, b"PK-bytes".to_vec());
    }

    #[tokio::test]
    async fn test_large_download_is_written_completely() {
        let body: Vec<u8> = (0..3 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/codeload/acme/site/zip/refs/heads/main");
            then.status(200).body(body.clone());
        });

        let client = client_for(&server);
        let mut file = client
            .fetch_archive(&RepositoryRef::new("acme", "site"), "main")
            .await
            .unwrap();

        assert_eq!(file.metadata().unwrap().len(), body.len() as u64);
        let mut read_back = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut read_back).unwrap();
        assert_eq!(read_back, body);
    }

    #[tokio::test]
    async fn test_commit_details_are_fetched_concurrently() {
        let server = MockServer::start();
        let listing: Vec<_> = (0..20)
            .map(|i| serde_json::json!({"name": format!("b{:02}", i), "commit": {"sha": format!("s{:02}", i)}}))
            .collect();
        server.mock(|when, then| {
            when.method(GET).path("/repos/acme/site/branches");
            then.status(200).json_body(serde_json::Value::Array(listing));
        });
        let commits_mock = server.mock(|when, then| {
            when.method(GET).path_contains("/repos/acme/site/commits/");
            then.status(500).delay(Duration::from_millis(250));
        });

        let client = client_for(&server);
        let started = std::time::Instant::now();
        let branches = client
            .list_branches(&RepositoryRef::new("acme", "site"))
            .await
            .unwrap();

        // 逐一請求至少需要 5 秒
        assert!(started.elapsed() < Duration::from_secs(3));
        commits_mock.assert_hits(20);
        let names: Vec<_> = branches.iter().map(|b| b.name.clone()).collect();
        let expected: Vec<_> = (0..20).map(|i| format!("b{:02}", i)).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_full_page_of_branches_is_still_listed() {
        let server = MockServer::start();
        let listing: Vec<_> = (0..BRANCHES_PER_PAGE)
            .map(|i| serde_json::json!({"name": format!("branch-{:03}", i)}))
            .collect();
        server.mock(|when, then| {
            when.method(GET)
                .path("/repos/acme/site/branches")
                .query_param("per_page", "100");
            then.status(200).json_body(serde_json::Value::Array(listing));
        });

        let client = client_for(&server);
        let branches = client
            .list_branches(&RepositoryRef::new("acme", "site"))
            .await
            .unwrap();

        assert_eq!(branches.len(), BRANCHES_PER_PAGE);
        assert_eq!(branches[0].name, "branch-000");
        assert!(branches.iter().all(|b| b.commit_sha.is_none()));
    }

    #[tokio::test]
    async fn test_rate_limited_download() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/codeload/acme/site/zip/refs/heads/main");
            then.status(429);
        });

        let client = client_for(&server);
        let err = client
            .fetch_archive(&RepositoryRef::new("acme", "site"), "main")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("rate limited"));
    }
}
