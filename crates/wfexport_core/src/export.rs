use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{load_site_config, render_snapshot};
use crate::error::ExportError;
use crate::reconcile::reconcile;
use crate::runtime::{ResolvedPaths, ensure_output_layout};
use crate::slug::SlugAllocator;
use crate::source::{Category, load_row_set};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    ConfigSnapshot,
    Content { category: Category, id: i64 },
    Assets,
}

impl OutputTarget {
    pub fn label(&self) -> String {
        match self {
            Self::ConfigSnapshot => "config".to_string(),
            Self::Content { category, id } => format!("{}#{id}", category.as_str()),
            Self::Assets => "assets".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutput {
    pub target: OutputTarget,
    pub path: PathBuf,
    /// Bytes for written files, file count for the asset copy.
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFailure {
    pub target: Option<OutputTarget>,
    pub path: Option<PathBuf>,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub created_dirs: Vec<PathBuf>,
    pub rows_read: usize,
    pub written: Vec<WrittenOutput>,
    pub failures: Vec<ExportFailure>,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn written_for(&self, category: Category) -> usize {
        self.written
            .iter()
            .filter(|output| {
                matches!(output.target, OutputTarget::Content { category: written, .. } if written == category)
            })
            .count()
    }

    pub fn assets_copied(&self) -> Option<u64> {
        self.written
            .iter()
            .find(|output| output.target == OutputTarget::Assets)
            .map(|output| output.size)
    }
}

struct TaskOutcome {
    target: OutputTarget,
    path: PathBuf,
    result: std::result::Result<u64, ExportError>,
}

/// Export every page, post and draft under `paths.content_dir`.
///
/// Configuration and database errors abort before anything is written. Once
/// writing starts, each output succeeds or fails on its own and the failures
/// are returned in the report after every task has finished.
pub async fn run_export(paths: &ResolvedPaths) -> Result<ExportReport> {
    let snapshot = render_snapshot(&load_site_config(&paths.config_path)?)?;
    let rows = load_row_set(&paths.db_path)?;
    info!(
        pages = rows.pages.len(),
        posts = rows.posts.len(),
        drafts = rows.drafts.len(),
        "loaded rows from {}",
        paths.db_path.display()
    );

    let mut report = ExportReport {
        created_dirs: ensure_output_layout(paths)?,
        rows_read: rows.total(),
        ..ExportReport::default()
    };

    let mut tasks = JoinSet::new();

    let (from, to) = (paths.image_source_dir.clone(), paths.image_output_dir());
    tasks.spawn_blocking(move || TaskOutcome {
        target: OutputTarget::Assets,
        result: copy_tree(&from, &to),
        path: to,
    });

    spawn_write(
        &mut tasks,
        OutputTarget::ConfigSnapshot,
        paths.snapshot_path(),
        snapshot,
    );

    let mut allocator = SlugAllocator::new();
    for category in Category::ALL {
        for row in rows.rows(category) {
            let target = OutputTarget::Content {
                category,
                id: row.id,
            };
            match reconcile(category, row, &mut allocator) {
                Ok(item) => {
                    let path = paths.content_dir.join(item.relative_path());
                    spawn_write(&mut tasks, target, path, item.render());
                }
                Err(error) => {
                    warn!("skipping {}: {error:#}", target.label());
                    report.failures.push(failure_from(target, error));
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(TaskOutcome {
                target,
                path,
                result: Ok(size),
            }) => {
                debug!("wrote {} ({})", path.display(), target.label());
                report.written.push(WrittenOutput { target, path, size });
            }
            Ok(TaskOutcome {
                target,
                path,
                result: Err(error),
            }) => {
                warn!("{} failed: {error}", target.label());
                report.failures.push(ExportFailure {
                    target: Some(target),
                    path: Some(path),
                    kind: error.kind(),
                    message: error.to_string(),
                });
            }
            Err(join_error) => {
                warn!("export task did not complete: {join_error}");
                report.failures.push(ExportFailure {
                    target: None,
                    path: None,
                    kind: "task_aborted",
                    message: join_error.to_string(),
                });
            }
        }
    }

    report.written.sort_by(|left, right| left.path.cmp(&right.path));
    info!(
        written = report.written.len(),
        failed = report.failures.len(),
        "export finished"
    );
    Ok(report)
}

fn spawn_write(
    tasks: &mut JoinSet<TaskOutcome>,
    target: OutputTarget,
    path: PathBuf,
    contents: String,
) {
    tasks.spawn(async move {
        let result = write_output(&path, contents).await;
        TaskOutcome {
            target,
            path,
            result,
        }
    });
}

async fn write_output(path: &Path, contents: String) -> std::result::Result<u64, ExportError> {
    let write_failure = |error: std::io::Error| ExportError::WriteFailure {
        path: path.to_path_buf(),
        detail: error.to_string(),
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_failure)?;
    }
    let size = contents.len() as u64;
    tokio::fs::write(path, contents)
        .await
        .map_err(write_failure)?;
    Ok(size)
}

/// Recursively copy the contents of `from` into `to`, returning the number of
/// files copied.
pub fn copy_tree(from: &Path, to: &Path) -> std::result::Result<u64, ExportError> {
    let copy_failure = |detail: String| ExportError::AssetCopyFailure {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        detail,
    };

    let mut copied = 0u64;
    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry.map_err(|error| copy_failure(error.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|error| copy_failure(error.to_string()))?;
        let destination = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).map_err(|error| {
                copy_failure(format!("{}: {error}", destination.display()))
            })?;
        } else {
            fs::copy(entry.path(), &destination).map_err(|error| {
                copy_failure(format!("{}: {error}", entry.path().display()))
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn failure_from(target: OutputTarget, error: anyhow::Error) -> ExportFailure {
    let kind = error
        .downcast_ref::<ExportError>()
        .map(ExportError::kind)
        .unwrap_or("unexpected");
    ExportFailure {
        target: Some(target),
        path: None,
        kind,
        message: format!("{error:#}"),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use super::{OutputTarget, copy_tree, run_export};
    use crate::config::CONFIG_FILENAME;
    use crate::error::ExportError;
    use crate::runtime::ResolvedPaths;
    use crate::source::Category;
    use crate::source::tests::{FixturePost, create_fixture_db};

    const CONFIG: &str = "[app]\nsite_name = Notes\nsite_description = Short notes\nhost = https://notes.example\n";

    fn post<'a>(
        id: i64,
        slug: Option<&'a str>,
        title: Option<&'a str>,
        created: &'a str,
        pinned_position: Option<i64>,
        content: &'a str,
    ) -> FixturePost<'a> {
        FixturePost {
            id,
            slug,
            title,
            created,
            pinned_position,
            content,
        }
    }

    fn source_fixture(root: &Path, posts: &[FixturePost<'_>]) -> ResolvedPaths {
        let source_root = root.join("writefreely");
        fs::create_dir_all(source_root.join("static/img/sub")).expect("create img dir");
        fs::write(source_root.join("static/img/cover.png"), b"png").expect("write image");
        fs::write(source_root.join("static/img/sub/nested.jpg"), b"jpg").expect("write image");
        fs::write(source_root.join(CONFIG_FILENAME), CONFIG).expect("write config");
        create_fixture_db(&source_root, posts);
        ResolvedPaths::from_roots(&source_root, &root.join("content"))
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap_or_else(|error| panic!("read {}: {error}", path.display()))
    }

    #[tokio::test]
    async fn exports_every_category_with_snapshot_and_images() {
        let temp = tempdir().expect("tempdir");
        let paths = source_fixture(
            temp.path(),
            &[
                post(1, Some("hello"), Some("Hello page"), "2019-01-01", Some(1), "Page body"),
                post(5, Some(""), None, "2020-01-01", None, "---\nref: http://e.com\n---\nBody text"),
                post(6, Some("hello"), None, "2021-01-01", None, "Second hello"),
                post(7, None, Some("Draft"), "2022-01-01", None, "---\ndate: ignored\n---\nwip"),
            ],
        );
        let report = run_export(&paths).await.expect("export");
        assert!(report.is_success(), "failures: {:?}", report.failures);
        assert_eq!(report.rows_read, 4);
        assert_eq!(report.written_for(Category::Page), 1);
        assert_eq!(report.written_for(Category::Post), 2);
        assert_eq!(report.written_for(Category::Draft), 1);
        assert_eq!(report.assets_copied(), Some(2));

        let content = &paths.content_dir;
        assert_eq!(
            read(&content.join("posts/5.md")),
            "---\nslug: 5\ntitle: Post\ncreated: 2020-01-01\nref: http://e.com\n---\n[Reference](http://e.com)\n\nBody text"
        );
        assert_eq!(
            read(&content.join("pages/hello.md")),
            "---\nslug: hello\ntitle: Hello page\n---\nPage body"
        );
        assert_eq!(
            read(&content.join("posts/hello_.md")),
            "---\nslug: hello_\ntitle: hello\ncreated: 2021-01-01\n---\nSecond hello"
        );
        assert_eq!(
            read(&content.join("drafts/7.md")),
            "---\nslug: 7\ntitle: Draft\ncreated: 2022-01-01\n---\nwip"
        );
        assert_eq!(
            read(&content.join("config.json")),
            "{\n  \"siteName\": \"Notes\",\n  \"siteDescription\": \"Short notes\",\n  \"host\": \"https://notes.example\"\n}"
        );
        assert_eq!(read(&content.join("img/cover.png")), "png");
        assert_eq!(read(&content.join("img/sub/nested.jpg")), "jpg");
    }

    #[tokio::test]
    async fn embedded_path_slug_cannot_overwrite_another_file() {
        let temp = tempdir().expect("tempdir");
        let paths = source_fixture(
            temp.path(),
            &[
                post(1, None, None, "2019-01-01", Some(1), "---\nslug: ../posts/hello\n---\nPAGE"),
                post(2, Some("hello"), Some("Hello"), "2019-01-02", None, "POST"),
            ],
        );

        let report = run_export(&paths).await.expect("export");
        assert!(report.is_success(), "failures: {:?}", report.failures);
        let content = &paths.content_dir;
        assert_eq!(
            read(&content.join("pages/___posts___hello.md")),
            "---\nslug: ___posts___hello\ntitle: Post\n---\nPAGE"
        );
        assert_eq!(
            read(&content.join("posts/hello.md")),
            "---\nslug: hello\ntitle: Hello\ncreated: 2019-01-02\n---\nPOST"
        );
        assert_eq!(fs::read_dir(content.join("pages")).expect("list pages").count(), 1);
    }

    #[tokio::test]
    async fn malformed_row_is_reported_and_others_still_written() {
        let temp = tempdir().expect("tempdir");
        let paths = source_fixture(
            temp.path(),
            &[
                post(1, Some("broken"), None, "2020-01-01", None, "---\ntitle: never closed"),
                post(2, Some("fine"), Some("Fine"), "2019-01-01", None, "ok"),
            ],
        );

        let report = run_export(&paths).await.expect("export");
        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.kind, "malformed_front_matter");
        assert_eq!(
            failure.target,
            Some(OutputTarget::Content {
                category: Category::Post,
                id: 1
            })
        );
        assert!(paths.content_dir.join("posts/fine.md").is_file());
        assert!(!paths.content_dir.join("posts/broken.md").exists());
    }

    #[tokio::test]
    async fn failed_write_does_not_stop_other_writes() {
        let temp = tempdir().expect("tempdir");
        let paths = source_fixture(
            temp.path(),
            &[
                post(1, Some("about"), Some("About"), "2019-01-01", Some(1), "about"),
                post(2, Some("entry"), Some("Entry"), "2019-01-02", None, "entry"),
            ],
        );
        fs::create_dir_all(paths.content_dir.join("pages/about.md")).expect("block path");

        let report = run_export(&paths).await.expect("export");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, "write_failure");
        assert!(paths.content_dir.join("posts/entry.md").is_file());
        assert!(paths.content_dir.join("config.json").is_file());
    }

    #[tokio::test]
    async fn missing_image_dir_is_reported_independently() {
        let temp = tempdir().expect("tempdir");
        let paths = source_fixture(
            temp.path(),
            &[post(1, Some("only"), None, "2019-01-01", None, "body")],
        );
        fs::remove_dir_all(&paths.image_source_dir).expect("remove images");

        let report = run_export(&paths).await.expect("export");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, "asset_copy_failure");
        assert_eq!(report.failures[0].target, Some(OutputTarget::Assets));
        assert!(paths.content_dir.join("posts/only.md").is_file());
    }

    #[tokio::test]
    async fn missing_configuration_aborts_before_writing() {
        let temp = tempdir().expect("tempdir");
        let paths = source_fixture(
            temp.path(),
            &[post(1, Some("only"), None, "2019-01-01", None, "body")],
        );
        fs::write(&paths.config_path, "[app]\nsite_name = Notes\n").expect("rewrite config");

        let error = run_export(&paths).await.expect_err("must fail");
        assert!(matches!(
            error.downcast_ref::<ExportError>(),
            Some(ExportError::ConfigurationMissing { .. })
        ));
        assert!(!paths.content_dir.exists());
    }

    #[tokio::test]
    async fn missing_database_aborts_before_writing() {
        let temp = tempdir().expect("tempdir");
        let paths = source_fixture(temp.path(), &[]);
        fs::remove_file(&paths.db_path).expect("remove db");

        let error = run_export(&paths).await.expect_err("must fail");
        assert!(matches!(
            error.downcast_ref::<ExportError>(),
            Some(ExportError::RowSourceUnavailable { .. })
        ));
        assert!(!paths.content_dir.exists());
    }

    #[test]
    fn copy_tree_counts_files() {
        let temp = tempdir().expect("tempdir");
        let from = temp.path().join("from");
        fs::create_dir_all(from.join("a/b")).expect("create tree");
        fs::write(from.join("one.txt"), "1").expect("write");
        fs::write(from.join("a/b/two.txt"), "2").expect("write");

        let to = temp.path().join("to");
        let copied = copy_tree(&from, &to).expect("copy");
        assert_eq!(copied, 2);
        assert_eq!(fs::read_to_string(to.join("a/b/two.txt")).expect("read"), "2");
    }
}
