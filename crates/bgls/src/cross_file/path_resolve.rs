//
// cross_file/path_resolve.rs
//
// File identity and include path resolution
//
// Include paths are resolved against the directory of the including file,
// never against a process working directory. Resolution is purely lexical:
// `.` and `..` are removed without touching the filesystem, so a FileId can be
// computed for files that do not exist (missing includes still need a name).
//

use std::fmt;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Canonical identity of a script file: an absolute, lexically normalized path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(PathBuf);

impl FileId {
    /// Build an id from an absolute path. Relative paths are rejected.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return None;
        }
        normalize_path(path).map(Self)
    }

    pub fn from_url(uri: &Url) -> Option<Self> {
        if uri.scheme() != "file" {
            return None;
        }
        Self::new(uri.to_file_path().ok()?)
    }

    pub fn to_url(&self) -> Option<Url> {
        Url::from_file_path(&self.0).ok()
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Directory that relative includes in this file resolve against.
    pub fn directory(&self) -> &Path {
        self.0.parent().unwrap_or(&self.0)
    }

    pub fn file_name(&self) -> &str {
        self.0
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// Resolve an include path written in a script against `base_dir`.
    ///
    /// Absolute references are used as written; relative ones are joined to
    /// `base_dir`. Backslash separators are accepted on every platform since
    /// scripts are routinely shared between Windows and other hosts.
    pub fn resolve(base_dir: &Path, reference: &str) -> Option<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        let reference = normalize_separators(reference);
        let candidate = Path::new(reference.as_ref());
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            base_dir.join(candidate)
        };

        let resolved = Self::new(&joined);
        log::trace!(
            "Resolved include '{}' against {} -> {:?}",
            reference,
            base_dir.display(),
            resolved.as_ref().map(|id| id.0.display().to_string())
        );
        resolved
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(windows)]
fn normalize_separators(reference: &str) -> std::borrow::Cow<'_, str> {
    std::borrow::Cow::Borrowed(reference)
}

#[cfg(not(windows))]
fn normalize_separators(reference: &str) -> std::borrow::Cow<'_, str> {
    if reference.contains('\\') {
        std::borrow::Cow::Owned(reference.replace('\\', "/"))
    } else {
        std::borrow::Cow::Borrowed(reference)
    }
}

/// Remove `.` and `..` components without touching the filesystem.
///
/// `..` never climbs above the root; `/a/../../b` normalizes to `/b`.
fn normalize_path(path: &Path) -> Option<PathBuf> {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
            Component::CurDir => {}
            c => components.push(c),
        }
    }

    if components.is_empty() {
        return None;
    }

    Some(components.iter().collect())
}
