use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::{CONFIG_FILENAME, SNAPSHOT_FILENAME};
use crate::source::{Category, DATABASE_FILENAME};

pub const DEFAULT_CONTENT_DIR: &str = "content";
pub const IMAGE_DIR: &str = "img";
const SOURCE_IMAGE_DIR: &str = "static/img";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Heuristic,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub source_root: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        Ok(Self { cwd })
    }
}

/// Input and output locations for one export run.
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub source_root: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub image_source_dir: PathBuf,
    pub content_dir: PathBuf,
    pub source_origin: ValueSource,
    pub output_origin: ValueSource,
}

impl ResolvedPaths {
    pub fn from_roots(source_root: &Path, content_dir: &Path) -> Self {
        Self {
            db_path: source_root.join(DATABASE_FILENAME),
            config_path: source_root.join(CONFIG_FILENAME),
            image_source_dir: source_root.join(SOURCE_IMAGE_DIR),
            source_root: source_root.to_path_buf(),
            content_dir: content_dir.to_path_buf(),
            source_origin: ValueSource::Flag,
            output_origin: ValueSource::Flag,
        }
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.content_dir.join(category.folder())
    }

    pub fn image_output_dir(&self) -> PathBuf {
        self.content_dir.join(IMAGE_DIR)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.content_dir.join(SNAPSHOT_FILENAME)
    }

    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.content_dir.clone()];
        dirs.extend(Category::ALL.iter().map(|category| self.category_dir(*category)));
        dirs.push(self.image_output_dir());
        dirs
    }

    pub fn diagnostics(&self) -> String {
        format!(
            "source_root={} ({})\ndb_path={}\nconfig_path={}\nimage_source_dir={}\ncontent_dir={} ({})",
            normalize_for_display(&self.source_root),
            self.source_origin.as_str(),
            normalize_for_display(&self.db_path),
            normalize_for_display(&self.config_path),
            normalize_for_display(&self.image_source_dir),
            normalize_for_display(&self.content_dir),
            self.output_origin.as_str(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct SourceStatus {
    pub db_exists: bool,
    pub db_size_bytes: Option<u64>,
    pub config_exists: bool,
    pub image_source_exists: bool,
    pub content_dir_exists: bool,
    pub warnings: Vec<String>,
}

pub fn inspect_source(paths: &ResolvedPaths) -> Result<SourceStatus> {
    let db_exists = paths.db_path.is_file();
    let db_size_bytes = if db_exists {
        let metadata = fs::metadata(&paths.db_path)
            .with_context(|| format!("failed to inspect {}", paths.db_path.display()))?;
        Some(metadata.len())
    } else {
        None
    };
    let config_exists = paths.config_path.is_file();
    let image_source_exists = paths.image_source_dir.is_dir();
    let content_dir_exists = paths.content_dir.exists();

    let mut warnings = Vec::new();
    if !db_exists {
        warnings.push(format!(
            "{DATABASE_FILENAME} not found under {}; pass --source-root",
            normalize_for_display(&paths.source_root)
        ));
    }
    if !config_exists {
        warnings.push(format!("{CONFIG_FILENAME} is missing; export will abort"));
    }
    if !image_source_exists {
        warnings.push(format!(
            "{SOURCE_IMAGE_DIR}/ is missing; the image copy will be reported as failed"
        ));
    }
    if content_dir_exists {
        warnings.push(format!(
            "{} already exists; files with matching names will be overwritten",
            normalize_for_display(&paths.content_dir)
        ));
    }

    Ok(SourceStatus {
        db_exists,
        db_size_bytes,
        config_exists,
        image_source_exists,
        content_dir_exists,
        warnings,
    })
}

pub fn resolve_paths(
    context: &ResolutionContext,
    overrides: &PathOverrides,
) -> Result<ResolvedPaths> {
    resolve_paths_with_lookup(context, overrides, |key| env::var(key).ok())
}

fn resolve_paths_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> Result<ResolvedPaths>
where
    F: Fn(&str) -> Option<String>,
{
    let (source_root, source_origin) = if let Some(path) = overrides.source_root.as_deref() {
        (absolutize(path, &context.cwd), ValueSource::Flag)
    } else if let Some(value) = non_empty(lookup_env("WFEXPORT_SOURCE_ROOT")) {
        (absolutize(Path::new(&value), &context.cwd), ValueSource::Env)
    } else {
        (detect_source_root(&context.cwd), ValueSource::Heuristic)
    };

    let (content_dir, output_origin) = if let Some(path) = overrides.output_dir.as_deref() {
        (absolutize(path, &context.cwd), ValueSource::Flag)
    } else if let Some(value) = non_empty(lookup_env("WFEXPORT_OUTPUT_DIR")) {
        (absolutize(Path::new(&value), &context.cwd), ValueSource::Env)
    } else {
        (context.cwd.join(DEFAULT_CONTENT_DIR), ValueSource::Default)
    };

    Ok(ResolvedPaths {
        source_origin,
        output_origin,
        ..ResolvedPaths::from_roots(&source_root, &content_dir)
    })
}

/// Create the content directory tree. Directories that already exist are
/// left alone; the returned list holds only the ones created here.
pub fn ensure_output_layout(paths: &ResolvedPaths) -> Result<Vec<PathBuf>> {
    let mut created_dirs = Vec::new();
    for dir in paths.output_dirs() {
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            created_dirs.push(dir);
        }
    }
    Ok(created_dirs)
}

fn detect_source_root(cwd: &Path) -> PathBuf {
    cwd.ancestors()
        .find(|candidate| candidate.join(DATABASE_FILENAME).is_file())
        .unwrap_or(cwd)
        .to_path_buf()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
