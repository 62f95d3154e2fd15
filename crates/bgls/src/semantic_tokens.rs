//
// semantic_tokens.rs
//
// Semantic highlighting for `#tag` and `$(variable)` tokens
//

use tower_lsp::lsp_types::{
    SemanticToken, SemanticTokenModifier, SemanticTokenType, SemanticTokensLegend,
};

use crate::scanner::{comment_spans, in_comment, open_tags, tag_tokens, variable_tokens};
use crate::span::{LineIndex, SourceSpan};

pub const TOKEN_TYPES: [&str; 2] = ["buildGraphTag", "buildGraphVariable"];
pub const TOKEN_MODIFIERS: [&str; 1] = ["declaration"];

const DECLARATION_BIT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildGraphTokenKind {
    Tag,
    Variable,
}

impl BuildGraphTokenKind {
    fn legend_index(self) -> u32 {
        match self {
            Self::Tag => 0,
            Self::Variable => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildGraphToken {
    pub kind: BuildGraphTokenKind,
    pub span: SourceSpan,
    /// Set for `#tag` tokens listed in a `Produces` attribute
    pub declaration: bool,
}

pub fn legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: TOKEN_TYPES.into_iter().map(SemanticTokenType::new).collect(),
        token_modifiers: TOKEN_MODIFIERS
            .into_iter()
            .map(SemanticTokenModifier::new)
            .collect(),
    }
}

/// All highlighted tokens of a document, sorted, non-overlapping, none inside
/// comments.
pub fn collect_semantic_tokens(text: &str) -> Vec<BuildGraphToken> {
    let comments = comment_spans(text);
    let declarations: Vec<SourceSpan> = open_tags(text)
        .iter()
        .filter_map(|tag| tag.attribute("Produces"))
        .map(|attr| attr.value_span)
        .collect();

    let variables = variable_tokens(text).map(|token| BuildGraphToken {
        kind: BuildGraphTokenKind::Variable,
        span: token.span,
        declaration: false,
    });
    let tags = tag_tokens(text).map(|token| BuildGraphToken {
        kind: BuildGraphTokenKind::Tag,
        span: token.span,
        declaration: declarations.iter().any(|value| value.encloses(&token.span)),
    });

    let mut tokens: Vec<BuildGraphToken> = variables
        .chain(tags)
        .filter(|token| !in_comment(&comments, token.span.start))
        .collect();
    tokens.sort_by_key(|token| (token.span.start, token.span.end));

    let mut last_end = 0;
    tokens.retain(|token| {
        let keep = token.span.start >= last_end;
        if keep {
            last_end = token.span.end;
        }
        keep
    });
    tokens
}

/// Encode tokens in the LSP relative format. Tokens are single-line by
/// construction.
pub fn encode(tokens: &[BuildGraphToken], index: &LineIndex<'_>) -> Vec<SemanticToken> {
    let mut data = Vec::with_capacity(tokens.len());
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;

    for token in tokens {
        let start = index.position_at(token.span.start);
        let end = index.position_at(token.span.end);
        if end.line != start.line || end.character <= start.character {
            continue;
        }
        let delta_line = start.line - prev_line;
        let delta_start = if delta_line == 0 {
            start.character - prev_start
        } else {
            start.character
        };
        data.push(SemanticToken {
            delta_line,
            delta_start,
            length: end.character - start.character,
            token_type: token.kind.legend_index(),
            token_modifiers_bitset: if token.declaration { DECLARATION_BIT } else { 0 },
        });
        prev_line = start.line;
        prev_start = start.character;
    }

    data
}
