use httpmock::prelude::*;
use repo_updater::{
    ExclusionSet, GitHubClient, GitHubSettings, RepositoryRef, UpdateEngine, UpdateError,
    UpdateRequest,
};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::TempDir;
use zip::write::{SimpleFileOptions, ZipWriter};

fn github_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.add_directory("site-main/", SimpleFileOptions::default())
        .unwrap();
    for (name, content) in entries {
        zip.start_file(format!("site-main/{}", name), SimpleFileOptions::default())
            .unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn engine_for(server: &MockServer) -> UpdateEngine<GitHubClient> {
    let client = GitHubClient::new(GitHubSettings {
        api_base: server.base_url(),
        download_base: server.base_url(),
        ..GitHubSettings::default()
    })
    .unwrap();
    UpdateEngine::new(client)
}

fn request(target: &Path, excludes: &str, create_backup: bool) -> UpdateRequest {
    UpdateRequest {
        repository: RepositoryRef::new("acme", "site"),
        branch: "main".to_string(),
        target_directory: target.to_path_buf(),
        excludes: ExclusionSet::parse(excludes),
        create_backup,
        staging_parent: None,
    }
}

fn top_level_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_update_into_empty_directory_with_excludes() {
    let target = TempDir::new().unwrap();
    let server = MockServer::start();
    let archive_mock = server.mock(|when, then| {
        when.method(GET).path("/acme/site/zip/refs/heads/main");
        then.status(200)
            .header("Content-Type", "application/zip")
            .body(github_zip(&[
                ("index.php", "<?php echo 'hi';"),
                ("config.php", "<?php return [];"),
                ("storage/cache.tmp", "cache"),
            ]));
    });

    let outcome = engine_for(&server)
        .run(&request(target.path(), "config.php\nstorage/", false))
        .await
        .unwrap();

    archive_mock.assert();
    assert_eq!(top_level_names(target.path()), vec!["index.php"]);
    assert_eq!(
        outcome.merge.excluded_paths(),
        vec!["config.php".to_string(), "storage".to_string()]
    );
    assert_eq!(outcome.merge.files_copied, 1);
    assert!(outcome.backup_path.is_none());
}

#[tokio::test]
async fn test_missing_target_fails_before_download() {
    let parent = TempDir::new().unwrap();
    let server = MockServer::start();
    let archive_mock = server.mock(|when, then| {
        when.method(GET).path("/acme/site/zip/refs/heads/main");
        then.status(200).body(github_zip(&[("index.php", "x")]));
    });

    let err = engine_for(&server)
        .run(&request(&parent.path().join("does-not-exist"), "", true))
        .await
        .unwrap_err();

    assert!(matches!(err, UpdateError::ValidationError { .. }));
    archive_mock.assert_hits(0);
    assert!(top_level_names(parent.path()).is_empty());
}

#[tokio::test]
async fn test_download_failure_leaves_target_untouched() {
    let target = TempDir::new().unwrap();
    fs::write(target.path().join("index.php"), "old").unwrap();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/acme/site/zip/refs/heads/main");
        then.status(404);
    });

    let err = engine_for(&server)
        .run(&request(target.path(), "", true))
        .await
        .unwrap_err();

    assert!(matches!(err, UpdateError::RetrievalError { .. }));
    assert_eq!(top_level_names(target.path()), vec!["index.php"]);
    assert_eq!(fs::read_to_string(target.path().join("index.php")).unwrap(), "old");
}

#[tokio::test]
async fn test_corrupt_archive_leaves_target_untouched() {
    let target = TempDir::new().unwrap();
    fs::write(target.path().join("index.php"), "old").unwrap();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/acme/site/zip/refs/heads/main");
        then.status(200).body("<html>not an archive</html>");
    });

    let err = engine_for(&server)
        .run(&request(target.path(), "", false))
        .await
        .unwrap_err();

    assert!(matches!(err, UpdateError::ArchiveError { .. }));
    assert_eq!(top_level_names(target.path()), vec!["index.php"]);
}

#[tokio::test]
async fn test_update_with_backup_preserves_previous_state() {
    let target = TempDir::new().unwrap();
    fs::write(target.path().join("x.txt"), "old x").unwrap();
    fs::create_dir_all(target.path().join("sub")).unwrap();
    fs::write(target.path().join("sub/y.txt"), "old y").unwrap();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/acme/site/zip/refs/heads/main");
        then.status(200)
            .body(github_zip(&[("x.txt", "new x"), ("sub/y.txt", "new y")]));
    });

    let outcome = engine_for(&server)
        .run(&request(target.path(), "", true))
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(target.path().join("x.txt")).unwrap(), "new x");
    assert_eq!(fs::read_to_string(target.path().join("sub/y.txt")).unwrap(), "new y");

    let backup_path = outcome.backup_path.clone().unwrap();
    assert_eq!(backup_path.parent().unwrap(), target.path());
    let mut archive = zip::ZipArchive::new(fs::File::open(&backup_path).unwrap()).unwrap();
    let mut content = String::new();
    archive
        .by_name("sub/y.txt")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "old y");

    let lines = outcome.report_lines();
    assert!(lines[0].starts_with("Backup created: "));
    assert_eq!(lines.last().unwrap(), "Update finished. Files were overwritten.");

    // 暫存目錄已清除
    let leftovers: Vec<_> = top_level_names(target.path())
        .into_iter()
        .filter(|name| name.starts_with(".update_tmp_"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_custom_staging_parent_is_used_and_cleaned() {
    let target = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/acme/site/zip/refs/heads/main");
        then.status(200).body(github_zip(&[("a.txt", "a")]));
    });

    let mut req = request(target.path(), "", false);
    req.staging_parent = Some(scratch.path().to_path_buf());

    engine_for(&server).run(&req).await.unwrap();

    assert_eq!(top_level_names(target.path()), vec!["a.txt"]);
    assert!(top_level_names(scratch.path()).is_empty());
}

#[tokio::test]
async fn test_large_archive_is_staged_from_downloaded_file() {
    let target = TempDir::new().unwrap();
    let files: Vec<(String, String)> = (0..200)
        .map(|i| (format!("assets/chunk_{:03}.txt", i), format!("{:08}", i).repeat(2048)))
        .collect();
    let pairs: Vec<(&str, &str)> = files
        .iter()
        .map(|(name, content)| (name.as_str(), content.as_str()))
        .collect();
    let archive = github_zip(&pairs);
    let archive_len = archive.len() as u64;

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/acme/site/zip/refs/heads/main");
        then.status(200).body(archive);
    });

    let outcome = engine_for(&server)
        .run(&request(target.path(), "", false))
        .await
        .unwrap();

    assert_eq!(outcome.archive_bytes, archive_len);
    assert_eq!(outcome.merge.files_copied, 200);
    assert_eq!(
        fs::read_to_string(target.path().join("assets/chunk_123.txt")).unwrap(),
        "00000123".repeat(2048)
    );
}
