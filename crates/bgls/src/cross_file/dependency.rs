//
// cross_file/dependency.rs
//
// Include closure discovery for cross-file resolution
//
// A DependencySet is built fresh for every request and never cached. Files are
// discovered breadth-first: every file of one level is read concurrently, and
// each newly discovered target is marked visited before the next level's reads
// are issued. The visited set is the only cycle guard.
//

use futures::future::join_all;
use indexmap::IndexSet;
use tokio_util::sync::CancellationToken;

use super::content_provider::FileReader;
use super::path_resolve::FileId;
use crate::scanner::include_references;

/// Transitive include closure of a root file, in BFS discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySet {
    files: IndexSet<FileId>,
}

impl DependencySet {
    fn with_root(root: FileId) -> Self {
        let mut files = IndexSet::new();
        files.insert(root);
        Self { files }
    }

    /// Returns true when the file was not yet part of the set.
    fn insert(&mut self, file: FileId) -> bool {
        self.files.insert(file)
    }

    pub fn root(&self) -> &FileId {
        // The root is inserted on construction and never removed.
        &self.files[0]
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, file: &FileId) -> bool {
        self.files.contains(file)
    }

    /// Never zero: the root is always a member.
    pub(crate) fn len(&self) -> usize {
        self.files.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileId> {
        self.files.iter()
    }

    pub fn into_vec(self) -> Vec<FileId> {
        self.files.into_iter().collect()
    }
}

/// One-hop include targets of `file`, resolved against its directory.
///
/// Document order, duplicates removed, self-includes dropped. Includes inside
/// comments are ignored.
pub fn direct_includes(file: &FileId, text: &str) -> Vec<FileId> {
    let mut seen = IndexSet::new();
    for include in include_references(text) {
        match FileId::resolve(file.directory(), include.path) {
            Some(target) if target != *file => {
                seen.insert(target);
            }
            Some(_) => log::trace!("Ignoring self-include in {}", file),
            None => log::trace!("Unresolvable include '{}' in {}", include.path, file),
        }
    }
    seen.into_iter().collect()
}

/// Discover every file reachable from `root` through include references.
///
/// Returns `None` if `cancel` fires. Unreadable files end their branch
/// silently. At most `max_files` files are collected; hitting the cap logs a
/// warning and returns what was found so far.
pub async fn resolve_dependencies<R>(
    root: &FileId,
    reader: &R,
    cancel: &CancellationToken,
    max_files: usize,
) -> Option<DependencySet>
where
    R: FileReader + ?Sized,
{
    let mut visited = DependencySet::with_root(root.clone());
    let mut frontier = vec![root.clone()];
    let mut depth = 0usize;

    while !frontier.is_empty() {
        if cancel.is_cancelled() {
            log::trace!("Dependency resolution for {} cancelled at depth {}", root, depth);
            return None;
        }

        log::trace!("Reading {} file(s) at include depth {}", frontier.len(), depth);
        let reads = join_all(frontier.iter().map(|file| reader.read_text(file))).await;

        if cancel.is_cancelled() {
            log::trace!("Dependency resolution for {} cancelled after reads", root);
            return None;
        }

        let mut next = Vec::new();
        for (file, result) in frontier.iter().zip(reads) {
            let text = match result {
                Ok(text) => text,
                Err(err) => {
                    log::debug!("Skipping include branch: {}", err);
                    continue;
                }
            };

            for target in direct_includes(file, &text) {
                if visited.len() >= max_files {
                    log::warn!(
                        "Include closure of {} exceeds {} files; remaining includes are ignored",
                        root,
                        max_files
                    );
                    return Some(visited);
                }
                if visited.insert(target.clone()) {
                    next.push(target);
                }
            }
        }

        frontier = next;
        depth += 1;
    }

    log::trace!("Include closure of {} has {} file(s)", root, visited.len());
    Some(visited)
}
