//
// build_tool.rs
//
// Helpers for driving the external build tool: composing its command line and
// scraping its `-ListOnly` output. Nothing here starts a process.
//

use serde::Serialize;
use std::path::{Component, Path, PathBuf};

use crate::cross_file::content_provider::FileReader;
use crate::cross_file::path_resolve::FileId;
use crate::scanner::open_tags;
use crate::span::line_span_at;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("No <Node> or <Aggregate> 'Name' attribute found on this line.")]
    NoTarget,
    #[error("Could not find {0} in any parent directory.")]
    LauncherNotFound(String),
}

/// Name of the `<Node>` or `<Aggregate>` on the line containing `offset`.
///
/// Tags that start on the line win over a multi-line tag that merely contains
/// the cursor.
pub fn target_name_at(text: &str, offset: usize) -> Option<String> {
    let line = line_span_at(text, offset);
    let candidates: Vec<_> = open_tags(text)
        .into_iter()
        .filter(|tag| tag.is("Node") || tag.is("Aggregate"))
        .filter(|tag| tag.attribute("Name").is_some_and(|a| !a.value.is_empty()))
        .collect();

    candidates
        .iter()
        .find(|tag| line.contains_offset(tag.span.start))
        .or_else(|| candidates.iter().find(|tag| tag.span.contains_offset(offset)))
        .and_then(|tag| tag.attribute("Name"))
        .map(|name| name.value.to_string())
}

/// Search `start_dir` and each of its ancestors for `file_name`.
pub async fn find_launcher<R: FileReader + ?Sized>(
    start_dir: &Path,
    file_name: &str,
    reader: &R,
) -> Option<PathBuf> {
    for dir in start_dir.ancestors() {
        let Some(candidate) = FileId::new(dir.join(file_name)) else {
            continue;
        };
        log::trace!("Looking for launcher at {}", candidate);
        if reader.exists(&candidate).await {
            return Some(candidate.path().to_path_buf());
        }
    }
    None
}

/// `"<launcher>" BuildGraph -Script="<script>" -Target="<target>"[ -ListOnly]`
/// with the script path relative to the launcher's directory.
pub fn compose_command(launcher: &Path, script: &Path, target: &str, list_only: bool) -> String {
    let launcher_dir = launcher.parent().unwrap_or(launcher);
    let script = relative_path(launcher_dir, script).unwrap_or_else(|| script.to_path_buf());
    let list_only = if list_only { " -ListOnly" } else { "" };
    format!(
        "\"{}\" BuildGraph -Script=\"{}\" -Target=\"{}\"{}",
        launcher.display(),
        script.display(),
        target,
        list_only
    )
}

/// Lexical relative path from directory `from` to `to`. `None` when the two
/// paths do not share a root.
fn relative_path(from: &Path, to: &Path) -> Option<PathBuf> {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();

    let is_root = |c: &Component| matches!(c, Component::Prefix(_) | Component::RootDir);
    let from_root: Vec<_> = from.iter().take_while(|c| is_root(c)).collect();
    let to_root: Vec<_> = to.iter().take_while(|c| is_root(c)).collect();
    if from_root != to_root {
        return None;
    }

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &to[common..] {
        relative.push(component);
    }
    Some(relative)
}

// ============================================================================
// -ListOnly output
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedOption {
    pub name: String,
    /// The whole `-set:` line as printed
    pub record: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub options: Vec<ListedOption>,
    pub nodes: Vec<String>,
    pub aggregates: Vec<String>,
}

#[derive(Clone, Copy)]
enum Section {
    None,
    Options,
    Graph,
    Aggregates,
}

/// Scrape the build tool's listing output. Unknown lines are ignored.
pub fn parse_listing(output: &str) -> Listing {
    let mut listing = Listing::default();
    let mut section = Section::None;

    for raw in output.lines() {
        let line = raw.trim();
        match line {
            "Options:" => {
                section = Section::Options;
                continue;
            }
            "Graph:" => {
                section = Section::Graph;
                continue;
            }
            "Aggregates:" => {
                section = Section::Aggregates;
                continue;
            }
            _ => {}
        }

        match section {
            Section::Options => {
                if let Some(rest) = line.strip_prefix("-set:") {
                    let name = rest
                        .split(|c: char| c == '=' || c.is_whitespace())
                        .next()
                        .unwrap_or_default();
                    if !name.is_empty() {
                        listing.options.push(ListedOption {
                            name: name.to_string(),
                            record: line.to_string(),
                        });
                    }
                }
            }
            Section::Graph => {
                if let Some(rest) = line.strip_prefix("Node:") {
                    let name = rest.trim();
                    if !name.is_empty() {
                        listing.nodes.push(name.to_string());
                    }
                }
            }
            Section::Aggregates => {
                if line.is_empty() {
                    section = Section::None;
                } else {
                    listing.aggregates.push(line.to_string());
                }
            }
            Section::None => {}
        }
    }

    log::trace!(
        "Parsed listing: {} options, {} nodes, {} aggregates",
        listing.options.len(),
        listing.nodes.len(),
        listing.aggregates.len()
    );
    listing
}
