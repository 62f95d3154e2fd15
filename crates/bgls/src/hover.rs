//
// hover.rs
//
// Hover previews built on top of definition resolution
//

use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{HoverContents, MarkupContent, MarkupKind};

use crate::config::BuildGraphConfig;
use crate::cross_file::content_provider::FileReader;
use crate::cross_file::path_resolve::FileId;
use crate::definition::{classify_reference, resolve_reference, Reference};
use crate::span::SourceSpan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoverInfo {
    /// Expand, tag and variable references show the definition's line.
    DefinitionPreview {
        origin: SourceSpan,
        preview_line: String,
    },
    /// Include references show the included file's name.
    IncludePreview { origin: SourceSpan, file_name: String },
}

impl HoverInfo {
    pub fn origin(&self) -> SourceSpan {
        match self {
            Self::DefinitionPreview { origin, .. } | Self::IncludePreview { origin, .. } => *origin,
        }
    }

    pub fn render_markdown(&self) -> String {
        match self {
            Self::DefinitionPreview { preview_line, .. } => {
                format!("```xml\n{}\n```", preview_line)
            }
            Self::IncludePreview { file_name, .. } => {
                format!("*(include)*\n```xml\n{}\n```", file_name)
            }
        }
    }

    pub fn to_contents(&self) -> HoverContents {
        HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: self.render_markdown(),
        })
    }
}

/// Hover for the reference under `offset`. Missing include targets produce no
/// hover and no warning; warnings belong to go-to-definition.
pub async fn classify_hover<R>(
    file: &FileId,
    text: &str,
    offset: usize,
    reader: &R,
    cancel: &CancellationToken,
    config: &BuildGraphConfig,
) -> Option<HoverInfo>
where
    R: FileReader + ?Sized,
{
    let reference = classify_reference(text, offset)?;
    let outcome = resolve_reference(file, text, &reference, reader, cancel, config).await;
    let definition = outcome.definition?;

    Some(match reference {
        Reference::Include { .. } => HoverInfo::IncludePreview {
            origin: definition.origin,
            file_name: definition.target_file.file_name().to_string(),
        },
        _ => HoverInfo::DefinitionPreview {
            origin: definition.origin,
            preview_line: definition.preview_line,
        },
    })
}
