//
// definition.rs
//
// Reference classification and go-to-definition resolution
//
// A cursor is classified into one of four reference kinds, checked in order:
// Expand, Include, #tag, $(variable). Each kind searches its own scope of
// files and returns the first match found in that scope's order.
//

use regex::Regex;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::Range;

use crate::config::BuildGraphConfig;
use crate::cross_file::content_provider::{FileReader, PinnedDocument};
use crate::cross_file::dependency::{direct_includes, resolve_dependencies};
use crate::cross_file::path_resolve::FileId;
use crate::scanner::{comment_spans, in_comment, open_tags, tag_tokens};
use crate::span::{floor_char_boundary, line_span_at, LineIndex, SourceSpan};

/// What the cursor points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `Name` value of an `<Expand>` tag
    Expand { name: String, origin: SourceSpan },
    /// `Script` value of an `<Include>` tag
    Include { path: String, origin: SourceSpan },
    /// `#name` token; `name` excludes the `#`
    Tag { name: String, origin: SourceSpan },
    /// `$(name)` usage; `origin` covers `$(` through `)`
    Variable { name: String, origin: SourceSpan },
}

impl Reference {
    pub fn origin(&self) -> SourceSpan {
        match self {
            Self::Expand { origin, .. }
            | Self::Include { origin, .. }
            | Self::Tag { origin, .. }
            | Self::Variable { origin, .. } => *origin,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Expand { name, .. } | Self::Tag { name, .. } | Self::Variable { name, .. } => {
                name
            }
            Self::Include { path, .. } => path,
        }
    }

    /// Files searched for this kind of reference.
    pub fn scope(&self) -> SearchScope {
        match self {
            Self::Expand { .. } | Self::Variable { .. } => SearchScope::Transitive,
            Self::Include { .. } => SearchScope::Document,
            Self::Tag { .. } => SearchScope::DirectIncludes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// The current document only
    Document,
    /// The current document, then its one-hop includes in document order
    DirectIncludes,
    /// The full include closure in discovery order
    Transitive,
}

impl SearchScope {
    /// Candidate files for this scope, in search order. `None` when cancelled.
    pub async fn files<R>(
        self,
        file: &FileId,
        text: &str,
        reader: &R,
        cancel: &CancellationToken,
        max_files: usize,
    ) -> Option<Vec<FileId>>
    where
        R: FileReader + ?Sized,
    {
        if cancel.is_cancelled() {
            return None;
        }
        match self {
            Self::Document => Some(vec![file.clone()]),
            Self::DirectIncludes => {
                let mut files = vec![file.clone()];
                files.extend(direct_includes(file, text));
                Some(files)
            }
            Self::Transitive => {
                let pinned = PinnedDocument::new(file, text, reader);
                resolve_dependencies(file, &pinned, cancel, max_files)
                    .await
                    .map(|set| set.into_vec())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// What the user clicked, in the requesting document
    pub origin: SourceSpan,
    pub target_file: FileId,
    /// Span of the definition in the target file's text
    pub target_span: SourceSpan,
    /// The identifying name within `target_span`
    pub selection_span: SourceSpan,
    pub target_range: Range,
    pub selection_range: Range,
    /// Trimmed text of the line the definition starts on
    pub preview_line: String,
}

impl Definition {
    fn new(origin: SourceSpan, target_file: FileId, text: &str, found: Match) -> Self {
        let index = LineIndex::new(text);
        Self {
            origin,
            target_file,
            target_span: found.target,
            selection_span: found.selection,
            target_range: index.range_of(found.target),
            selection_range: index.range_of(found.selection),
            preview_line: line_span_at(text, found.target.start)
                .slice(text)
                .trim()
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub definition: Option<Definition>,
    /// Message for the user when the request cannot be satisfied at all
    pub warning: Option<String>,
}

impl ResolveOutcome {
    fn found(definition: Definition) -> Self {
        Self {
            definition: Some(definition),
            warning: None,
        }
    }
}

/// Location of a definition inside one file's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub target: SourceSpan,
    pub selection: SourceSpan,
}

// ============================================================================
// Classification
// ============================================================================

struct VariablePatterns {
    prefix: Regex,
    suffix: Regex,
}

fn variable_patterns() -> &'static VariablePatterns {
    static PATTERNS: OnceLock<VariablePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| VariablePatterns {
        prefix: Regex::new(r"\$\(([^)]*)$").unwrap(),
        suffix: Regex::new(r"^([^)]*)\)").unwrap(),
    })
}

/// Determine which reference, if any, is under `offset`.
pub fn classify_reference(text: &str, offset: usize) -> Option<Reference> {
    let offset = floor_char_boundary(text, offset);
    if in_comment(&comment_spans(text), offset) {
        return None;
    }

    let tag = open_tags(text)
        .into_iter()
        .find(|tag| tag.span.start < offset && offset < tag.span.end);
    if let Some(tag) = tag {
        if tag.is("Expand") {
            if let Some(name) = tag.attribute("Name") {
                if !name.value.is_empty() && name.value_span.contains_offset(offset) {
                    return Some(Reference::Expand {
                        name: name.value.to_string(),
                        origin: name.value_span,
                    });
                }
            }
        }
        if tag.is("Include") {
            if let Some(script) = tag.attribute("Script") {
                if !script.value.is_empty() && script.value_span.contains_offset(offset) {
                    return Some(Reference::Include {
                        path: script.value.to_string(),
                        origin: script.value_span,
                    });
                }
            }
        }
    }

    let line = line_span_at(text, offset);
    let line_text = line.slice(text);
    // The `\n` of a CRLF pair lies past the line's end
    let column = (offset - line.start).min(line_text.len());

    if let Some(token) = tag_tokens(line_text).find(|t| t.span.contains_offset(column)) {
        return Some(Reference::Tag {
            name: token.name.to_string(),
            origin: token.span.shifted(line.start),
        });
    }

    let patterns = variable_patterns();
    let prefix = patterns.prefix.captures(&line_text[..column])?;
    let suffix = patterns.suffix.captures(&line_text[column..])?;
    let (head, tail) = (prefix.get(1)?, suffix.get(1)?);
    let name = format!("{}{}", head.as_str(), tail.as_str());
    if name.trim().is_empty() {
        return None;
    }
    // `$(` sits right before the captured head; `)` right after the tail.
    let start = line.start + head.start() - 2;
    let end = line.start + column + tail.end() + 1;
    Some(Reference::Variable {
        name,
        origin: SourceSpan::new(start, end),
    })
}

// ============================================================================
// Per-kind finders
// ============================================================================

/// First `<Macro Name="name">` in `text`.
pub fn find_macro(text: &str, name: &str) -> Option<Match> {
    open_tags(text).into_iter().find_map(|tag| {
        if !tag.is("Macro") {
            return None;
        }
        let attr = tag.attribute("Name").filter(|a| a.value == name)?;
        Some(Match {
            target: tag.span,
            selection: attr.value_span,
        })
    })
}

/// First `<Node Produces="...">` whose value contains the exact `#name` token.
/// The target is the token; the selection excludes the `#`.
pub fn find_produced_tag(text: &str, name: &str) -> Option<Match> {
    open_tags(text).into_iter().find_map(|tag| {
        if !tag.is("Node") {
            return None;
        }
        let produces = tag.attribute("Produces")?;
        let base = produces.value_span.start;
        tag_tokens(produces.value)
            .find(|token| token.name == name)
            .map(|token| Match {
                target: token.span.shifted(base),
                selection: token.name_span.shifted(base),
            })
    })
}

/// First tag of any kind except `Expand` with `Name="name"`.
pub fn find_named_tag(text: &str, name: &str) -> Option<Match> {
    open_tags(text).into_iter().find_map(|tag| {
        if tag.is("Expand") {
            return None;
        }
        let attr = tag.attribute("Name").filter(|a| a.value == name)?;
        Some(Match {
            target: tag.span,
            selection: attr.value_span,
        })
    })
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the reference under `offset` in `file`, whose current text is `text`.
pub async fn resolve_at<R>(
    file: &FileId,
    text: &str,
    offset: usize,
    reader: &R,
    cancel: &CancellationToken,
    config: &BuildGraphConfig,
) -> ResolveOutcome
where
    R: FileReader + ?Sized,
{
    match classify_reference(text, offset) {
        Some(reference) => resolve_reference(file, text, &reference, reader, cancel, config).await,
        None => ResolveOutcome::default(),
    }
}

pub async fn resolve_reference<R>(
    file: &FileId,
    text: &str,
    reference: &Reference,
    reader: &R,
    cancel: &CancellationToken,
    config: &BuildGraphConfig,
) -> ResolveOutcome
where
    R: FileReader + ?Sized,
{
    log::trace!("Resolving {:?} in {}", reference, file);
    let reader = PinnedDocument::new(file, text, reader);

    if let Reference::Include { path, origin } = reference {
        return resolve_include(file, path, *origin, &reader, cancel, config).await;
    }

    let name = reference.name();
    let finder: fn(&str, &str) -> Option<Match> = match reference {
        Reference::Expand { .. } => find_macro,
        Reference::Tag { .. } => find_produced_tag,
        _ => find_named_tag,
    };

    let Some(candidates) = reference
        .scope()
        .files(file, text, &reader, cancel, config.max_dependency_files)
        .await
    else {
        return ResolveOutcome::default();
    };

    for candidate in candidates {
        if cancel.is_cancelled() {
            log::trace!("Definition search for '{}' cancelled", name);
            return ResolveOutcome::default();
        }
        let candidate_text = match reader.read_text(&candidate).await {
            Ok(text) => text,
            Err(err) => {
                log::debug!("Skipping candidate during definition search: {}", err);
                continue;
            }
        };
        if let Some(found) = finder(&candidate_text, name) {
            log::trace!("Found definition of '{}' in {}", name, candidate);
            return ResolveOutcome::found(Definition::new(
                reference.origin(),
                candidate,
                &candidate_text,
                found,
            ));
        }
    }

    log::trace!("No definition found for '{}'", name);
    ResolveOutcome::default()
}

async fn resolve_include<R>(
    file: &FileId,
    path: &str,
    origin: SourceSpan,
    reader: &R,
    cancel: &CancellationToken,
    config: &BuildGraphConfig,
) -> ResolveOutcome
where
    R: FileReader + ?Sized,
{
    if cancel.is_cancelled() {
        return ResolveOutcome::default();
    }
    let Some(target) = FileId::resolve(file.directory(), path) else {
        return ResolveOutcome::default();
    };

    if !reader.exists(&target).await {
        log::warn!("Include file not found: {}", target);
        return ResolveOutcome {
            definition: None,
            warning: config
                .warn_on_missing_include
                .then(|| format!("Include file not found: {}", target)),
        };
    }

    if cancel.is_cancelled() {
        return ResolveOutcome::default();
    }

    let text = match reader.read_text(&target).await {
        Ok(text) => text,
        Err(err) => {
            log::debug!("Include target exists but is unreadable: {}", err);
            String::new()
        }
    };
    let first_line = line_span_at(&text, 0);
    ResolveOutcome::found(Definition::new(
        origin,
        target,
        &text,
        Match {
            target: first_line,
            selection: first_line,
        },
    ))
}
