//! Resolves glob patterns against the filesystem.
//!
//! A [`Matcher`] walks a root directory and returns every file whose path, relative to that
//! root, matches a [`Pattern`]. Results are absolute paths sorted by their full path string, so
//! the same tree always produces the same list no matter what order the OS enumerates it in.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

mod pattern;

pub use pattern::{Depth, Pattern};

/// Errors from matching files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid root directory {root:?}: {reason}")]
    InvalidRoot { root: PathBuf, reason: String },
    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern { pattern: String, reason: String },
    #[error("failed to read directory {path:?}")]
    Walk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Finds files underneath a root directory.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    /// Files and directories that are never returned or descended into.
    ignore: Option<Pattern>,
    /// Whether to descend into symlinked directories.
    follow_symlinks: bool,
}

impl Matcher {
    /// Create a new [`Matcher`] that ignores nothing and does not follow symlinked directories.
    pub fn new() -> Self {
        Matcher::default()
    }

    /// Skip anything matching `ignore`, e.g. `**/build`.
    pub fn with_ignore(mut self, ignore: Pattern) -> Self {
        self.ignore = Some(ignore);
        self
    }

    /// Descend into symlinked directories. A directory reachable through several paths is
    /// matched under each of them, links back to an ancestor are skipped.
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Returns every file underneath `root` that matches `pattern`.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidRoot`] if `root` does not exist or is not a directory.
    /// * [`Error::Walk`] if a directory underneath `root` cannot be read.
    pub fn match_files<P: AsRef<Path>>(
        &self,
        root: P,
        pattern: &Pattern,
    ) -> Result<Vec<PathBuf>, Error> {
        let root = absolute_root(root.as_ref())?;

        let mut walker = WalkDir::new(&root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name();
        if let Depth::Bounded(max) = pattern.depth() {
            walker = walker.max_depth(max);
        }
        let entries = walker
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.ignored(&root, entry));

        let mut found = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    skip_or_fail(&root, err)?;
                    continue;
                }
            };
            if !is_file(&entry) {
                continue;
            }
            if pattern.is_match(relative_to(&root, entry.path())) {
                found.push(entry.into_path());
            }
        }

        sort_paths(&mut found);
        tracing::debug!(?root, %pattern, count = found.len(), "matched files");

        Ok(found)
    }

    /// Compile `pattern` and match it against `root`, see [`Matcher::match_files`].
    pub fn glob<P: AsRef<Path>>(&self, root: P, pattern: &str) -> Result<Vec<PathBuf>, Error> {
        let pattern = Pattern::new(pattern)?;
        self.match_files(root, &pattern)
    }

    fn ignored(&self, root: &Path, entry: &DirEntry) -> bool {
        let Some(ignore) = &self.ignore else {
            return false;
        };
        let relative = relative_to(root, entry.path());
        let ignored = ignore.is_match(relative);
        if ignored {
            tracing::trace!(?relative, "ignored");
        }
        ignored
    }
}

/// Sort by full path string and drop duplicates.
///
/// Note: this is _not_ the same order as [`Path`]'s `Ord`, which compares component-wise.
pub fn sort_paths(paths: &mut Vec<PathBuf>) {
    paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    paths.dedup();
}

/// Lexically resolve `.` and `..` components, without touching the filesystem.
///
/// `..` at the root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => (),
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => (),
                Some(Component::CurDir | Component::ParentDir) | None => {
                    normalized.push(component)
                }
            },
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component)
            }
        }
    }
    normalized
}

fn absolute_root(root: &Path) -> Result<PathBuf, Error> {
    let invalid = |reason: String| Error::InvalidRoot {
        root: root.to_path_buf(),
        reason,
    };

    let metadata = fs::metadata(root).map_err(|err| invalid(err.to_string()))?;
    if !metadata.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }

    if root.is_absolute() {
        Ok(normalize(root))
    } else {
        let cwd = std::env::current_dir().map_err(|err| invalid(err.to_string()))?;
        Ok(normalize(&cwd.join(root)))
    }
}

fn relative_to<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

/// Regular files, and symlinks to regular files when symlinks aren't followed.
fn is_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if !file_type.is_symlink() {
        return file_type.is_file();
    }
    match fs::metadata(entry.path()) {
        Ok(target) => target.is_file(),
        Err(err) => {
            tracing::debug!(path = ?entry.path(), %err, "skipping dangling symlink");
            false
        }
    }
}

/// Symlink cycles and dangling symlinks are skipped, anything else fails the walk.
fn skip_or_fail(root: &Path, err: walkdir::Error) -> Result<(), Error> {
    if let Some(ancestor) = err.loop_ancestor() {
        tracing::debug!(path = ?err.path(), ?ancestor, "skipping symlink cycle");
        return Ok(());
    }

    let path = err.path().unwrap_or(root).to_path_buf();
    let is_symlink = fs::symlink_metadata(&path)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false);
    if is_symlink && fs::metadata(&path).is_err() {
        tracing::debug!(?path, "skipping dangling symlink");
        return Ok(());
    }

    Err(Error::Walk {
        path,
        source: io::Error::from(err),
    })
}
