use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Strategy a context uses to enumerate the files under a scanned directory.
///
/// Walkers are owned by the context, which readers may share across threads.
pub trait DirectoryWalker: Send + Sync {
    fn walk(&self, root: &Path) -> Result<Vec<PathBuf>>;
}

/// Walks every regular file below the root, hidden ones included, in file
/// name order. Ignore files are not honoured.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreWalker;

impl DirectoryWalker for IgnoreWalker {
    fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .ignore(false)
            .parents(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
            if entry.file_type().is_some_and(|t| t.is_file()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }
}

/// Resource key of a file found under `root`: its relative path with `/`
/// separators.
pub fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
