//! `file://` URIs for ledger sources.
//!
//! A [`Uri`] always wraps a lexically normalized absolute path. Include
//! cycle detection compares URIs by value, so two spellings of the same
//! file (`./a.bean`, `sub/../a.bean`) collapse to one identity.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// An absolute, normalized path to a ledger source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uri {
    path: PathBuf,
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

impl Uri {
    /// Wrap an absolute path.
    pub fn from_absolute(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug_assert!(path.is_absolute(), "Uri requires an absolute path");
        Uri { path: normalize(&path) }
    }

    /// Resolve a path against the current working directory.
    pub fn from_relative_to_cwd(path: impl AsRef<Path>) -> io::Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Uri::from_absolute(cwd.join(path.as_ref())))
    }

    /// The absolute path.
    pub fn absolute(&self) -> &Path {
        &self.path
    }

    /// Path relative to `cwd` when the URI lives under it, the absolute
    /// path otherwise. Used for compact diagnostic headers.
    pub fn relative(&self, cwd: &Path) -> String {
        self.path
            .strip_prefix(cwd)
            .unwrap_or(&self.path)
            .display()
            .to_string()
    }

    /// Read the whole file and append the NUL sentinel the lexer expects.
    pub fn load_nullterminated(&self) -> io::Result<Vec<u8>> {
        let mut bytes = fs::read(&self.path)?;
        bytes.push(0);
        Ok(bytes)
    }

    /// Resolve `path` against this URI's directory.
    pub fn move_relative(&self, path: impl AsRef<Path>) -> Self {
        let base = self.path.parent().unwrap_or(Path::new("/"));
        Uri::from_absolute(base.join(path.as_ref()))
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file://{}", self.path.display())
    }
}
