use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{ReelError, ReelResult};

/// The two clip pools a reel alternates between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    Wall,
    Tv,
}

impl CategoryKind {
    pub fn label(self) -> &'static str {
        match self {
            CategoryKind::Wall => "wall",
            CategoryKind::Tv => "TV",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One clip directory and the file names it contains
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub path: PathBuf,
    pub kind: CategoryKind,
    pub files: Vec<String>,
}

impl Category {
    pub fn new(path: impl Into<PathBuf>, kind: CategoryKind, files: Vec<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            files,
        }
    }

    /// Full path of one of this category's files
    pub fn clip_path(&self, file: &str) -> PathBuf {
        self.path.join(file)
    }
}

/// Directory names recognised under the asset root
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogLayout {
    /// Exact name of the TV directory
    pub tv_dir: String,
    /// Any directory whose name contains this is a Wall category
    pub wall_marker: String,
}

impl Default for CatalogLayout {
    fn default() -> Self {
        Self {
            tv_dir: "TV".to_string(),
            wall_marker: "Wall".to_string(),
        }
    }
}

/// Immutable snapshot of the asset directories, built once per run
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    root: PathBuf,
    categories: Vec<Category>,
}

impl Catalog {
    /// Scan `root` using the default `TV` / `Wall` layout
    pub fn scan(root: &Path) -> ReelResult<Self> {
        Self::scan_with_layout(root, &CatalogLayout::default())
    }

    /// Scan `root` for Wall directories and the required TV directory.
    ///
    /// Only immediate children of `root` are considered, and only regular
    /// files directly inside each category are listed. Directory listings are
    /// read in parallel.
    pub fn scan_with_layout(root: &Path, layout: &CatalogLayout) -> ReelResult<Self> {
        ensure_dir(root)?;

        let mut dirs: Vec<(PathBuf, CategoryKind)> = vec![(root.join(&layout.tv_dir), CategoryKind::Tv)];
        for entry in fs::read_dir(root).map_err(|e| ReelError::io(root, e))? {
            let entry = entry.map_err(|e| ReelError::io(root, e))?;
            let path = entry.path();
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name == layout.tv_dir || !name.contains(&layout.wall_marker) {
                continue;
            }
            let metadata = fs::metadata(&path).map_err(|e| ReelError::io(&path, e))?;
            if metadata.is_dir() {
                dirs.push((path, CategoryKind::Wall));
            }
        }

        let mut categories = dirs
            .into_par_iter()
            .map(|(path, kind)| -> ReelResult<Category> {
                let files = list_clip_files(&path)?;
                debug!(path = %path.display(), %kind, files = files.len(), "scanned category");
                Ok(Category::new(path, kind, files))
            })
            .collect::<ReelResult<Vec<_>>>()?;
        categories.sort_by(|a, b| a.path.cmp(&b.path));

        let catalog = Self::from_categories(root, categories);
        info!(
            root = %root.display(),
            wall_categories = catalog.wall().count(),
            files = catalog.file_count(),
            "asset catalog ready"
        );
        Ok(catalog)
    }

    /// Build a catalog from categories assembled elsewhere
    pub fn from_categories(root: impl Into<PathBuf>, categories: Vec<Category>) -> Self {
        Self {
            root: root.into(),
            categories,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Categories of one kind
    pub fn of_kind(&self, kind: CategoryKind) -> impl Iterator<Item = &Category> {
        self.categories.iter().filter(move |c| c.kind == kind)
    }

    pub fn wall(&self) -> impl Iterator<Item = &Category> {
        self.of_kind(CategoryKind::Wall)
    }

    pub fn tv(&self) -> Option<&Category> {
        self.of_kind(CategoryKind::Tv).next()
    }

    /// Total number of files across all categories
    pub fn file_count(&self) -> usize {
        self.categories.iter().map(|c| c.files.len()).sum()
    }
}

fn ensure_dir(path: &Path) -> ReelResult<()> {
    let metadata = fs::metadata(path).map_err(|e| ReelError::io(path, e))?;
    if !metadata.is_dir() {
        return Err(ReelError::io(path, io::Error::other("not a directory")));
    }
    Ok(())
}

fn list_clip_files(dir: &Path) -> ReelResult<Vec<String>> {
    ensure_dir(dir)?;
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| ReelError::io(dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        // hidden files (.DS_Store and friends) are never clips
        if let Some(name) = entry.file_name().to_str().filter(|n| !n.starts_with('.')) {
            files.push(name.to_string());
        }
    }
    files.sort();
    Ok(files)
}
