//
// outline.rs
//
// Document outline for BuildGraph scripts
//
// The scanner produces a flat stream of tag events with no guarantee that
// tags are balanced. The outline is rebuilt from that stream with an arena of
// nodes and an explicit stack of arena indices: a close tag pops only when it
// matches the element on top of the stack, and anything still open at end of
// text is widened to cover its descendants.
//

use tower_lsp::lsp_types::{DocumentSymbol, SymbolKind};

use crate::scanner::{include_references, scan, tag_tokens, OpenTag, TagEvent};
use crate::span::{LineIndex, SourceSpan};

/// Name of the synthetic group collecting top-level value declarations.
pub const VARIABLES_GROUP: &str = "Variables";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolCategory {
    Agent,
    Node,
    Macro,
    Property,
    Option,
    EnvVar,
    Produces,
    Include,
    Group,
}

impl SymbolCategory {
    /// Category of an element by tag name; `None` for elements that do not
    /// appear in the outline.
    pub fn classify(tag_name: &str) -> Option<Self> {
        const ELEMENTS: [(&str, SymbolCategory); 6] = [
            ("Agent", SymbolCategory::Agent),
            ("Node", SymbolCategory::Node),
            ("Macro", SymbolCategory::Macro),
            ("Property", SymbolCategory::Property),
            ("Option", SymbolCategory::Option),
            ("EnvVar", SymbolCategory::EnvVar),
        ];
        ELEMENTS
            .iter()
            .find(|(name, _)| tag_name.eq_ignore_ascii_case(name))
            .map(|(_, category)| *category)
    }

    /// Property, Option and EnvVar declare values.
    pub fn is_value(self) -> bool {
        matches!(self, Self::Property | Self::Option | Self::EnvVar)
    }

    pub fn symbol_kind(self) -> SymbolKind {
        match self {
            Self::Agent => SymbolKind::MODULE,
            Self::Node => SymbolKind::CLASS,
            Self::Macro => SymbolKind::FUNCTION,
            Self::Property => SymbolKind::PROPERTY,
            Self::Option => SymbolKind::ENUM_MEMBER,
            Self::EnvVar => SymbolKind::VARIABLE,
            Self::Produces => SymbolKind::KEY,
            Self::Include => SymbolKind::FILE,
            Self::Group => SymbolKind::NAMESPACE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub category: SymbolCategory,
    /// Tag name as written in the document; empty for the synthetic group.
    pub detail: String,
    pub full_range: SourceSpan,
    pub name_range: SourceSpan,
    pub children: Vec<Symbol>,
}

struct OutlineNode {
    name: String,
    category: SymbolCategory,
    tag_name: String,
    full_range: SourceSpan,
    name_range: SourceSpan,
    children: Vec<usize>,
}

#[derive(Default)]
struct OutlineBuilder {
    nodes: Vec<OutlineNode>,
    roots: Vec<usize>,
    variables: Vec<usize>,
    stack: Vec<usize>,
}

impl OutlineBuilder {
    fn add(&mut self, node: OutlineNode, parent: Option<usize>) -> usize {
        let idx = self.nodes.len();
        let category = node.category;
        self.nodes.push(node);
        match parent.or_else(|| self.stack.last().copied()) {
            Some(parent) => self.nodes[parent].children.push(idx),
            None if category.is_value() => self.variables.push(idx),
            None => self.roots.push(idx),
        }
        idx
    }

    fn open(&mut self, tag: &OpenTag<'_>) {
        let Some(category) = SymbolCategory::classify(tag.name) else {
            return;
        };

        let (name, name_range) = match tag.attribute("Name").filter(|a| !a.value.is_empty()) {
            Some(attr) => (attr.value.to_string(), attr.value_span),
            None => (tag.name.to_string(), tag.name_span),
        };

        let idx = self.add(
            OutlineNode {
                name,
                category,
                tag_name: tag.name.to_string(),
                full_range: tag.span,
                name_range,
                children: Vec::new(),
            },
            None,
        );

        if category == SymbolCategory::Node {
            if let Some(produces) = tag.attribute("Produces") {
                let base = produces.value_span.start;
                for token in tag_tokens(produces.value) {
                    self.add(
                        OutlineNode {
                            name: format!("#{}", token.name),
                            category: SymbolCategory::Produces,
                            tag_name: "Produces".to_string(),
                            full_range: token.span.shifted(base),
                            name_range: token.name_span.shifted(base),
                            children: Vec::new(),
                        },
                        Some(idx),
                    );
                }
            }
        }

        if !tag.self_closing {
            self.stack.push(idx);
        }
    }

    fn close(&mut self, name: &str, span: SourceSpan) {
        let Some(&top) = self.stack.last() else {
            return;
        };
        let node = &mut self.nodes[top];
        if node.tag_name.eq_ignore_ascii_case(name) {
            node.full_range.end = span.end;
            self.stack.pop();
        } else {
            log::trace!(
                "Ignoring </{}> at {} while <{}> is open",
                name,
                span.start,
                node.tag_name
            );
        }
    }

    fn finish(mut self, text: &str) -> Vec<Symbol> {
        if !self.stack.is_empty() {
            log::trace!("{} element(s) left unclosed at end of text", self.stack.len());
        }

        // Children always have higher arena indices than their parent, so a
        // reverse sweep sees every child before its parent.
        for idx in (0..self.nodes.len()).rev() {
            let widest = self.nodes[idx]
                .children
                .iter()
                .map(|&child| self.nodes[child].full_range.end)
                .max();
            if let Some(end) = widest {
                let node = &mut self.nodes[idx];
                node.full_range.end = node.full_range.end.max(end);
            }
        }

        let mut built: Vec<Option<Symbol>> = Vec::with_capacity(self.nodes.len());
        built.resize_with(self.nodes.len(), || None);
        for idx in (0..self.nodes.len()).rev() {
            let node = &mut self.nodes[idx];
            let mut children: Vec<Symbol> = node
                .children
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            children.sort_by_key(|c| c.full_range.start);
            built[idx] = Some(Symbol {
                name: std::mem::take(&mut node.name),
                category: node.category,
                detail: std::mem::take(&mut node.tag_name),
                full_range: node.full_range,
                name_range: node.name_range,
                children,
            });
        }

        let mut roots: Vec<Symbol> = self
            .roots
            .iter()
            .filter_map(|&idx| built[idx].take())
            .collect();

        let mut variables: Vec<Symbol> = self
            .variables
            .iter()
            .filter_map(|&idx| built[idx].take())
            .collect();
        variables.sort_by_key(|v| v.full_range.start);
        if let (Some(first), Some(last)) = (variables.first(), variables.last()) {
            roots.push(Symbol {
                name: VARIABLES_GROUP.to_string(),
                category: SymbolCategory::Group,
                detail: String::new(),
                full_range: SourceSpan::new(first.full_range.start, last.full_range.end),
                name_range: first.name_range,
                children: variables,
            });
        }

        for include in include_references(text) {
            if include.path.trim().is_empty() {
                continue;
            }
            let name = include
                .path
                .rsplit(['/', '\\'])
                .find(|part| !part.is_empty())
                .unwrap_or(include.path);
            roots.push(Symbol {
                name: name.to_string(),
                category: SymbolCategory::Include,
                detail: "Include".to_string(),
                full_range: include.tag_span,
                name_range: include.path_span,
                children: Vec::new(),
            });
        }

        roots.sort_by_key(|s| s.full_range.start);
        roots
    }
}

/// Build the outline of one document. Pure, no I/O.
pub fn build_outline(text: &str) -> Vec<Symbol> {
    let mut builder = OutlineBuilder::default();
    let mut in_comment = false;

    for event in scan(text) {
        match event {
            TagEvent::CommentStart { .. } => in_comment = true,
            TagEvent::CommentEnd { .. } => in_comment = false,
            _ if in_comment => {}
            TagEvent::Open(tag) => builder.open(&tag),
            TagEvent::Close { name, span } => builder.close(name, span),
        }
    }

    builder.finish(text)
}

/// Convert outline symbols into nested LSP document symbols.
pub fn to_document_symbols(symbols: &[Symbol], index: &LineIndex<'_>) -> Vec<DocumentSymbol> {
    symbols
        .iter()
        .map(|symbol| {
            #[allow(deprecated)]
            DocumentSymbol {
                name: symbol.name.clone(),
                detail: (!symbol.detail.is_empty()).then(|| symbol.detail.clone()),
                kind: symbol.category.symbol_kind(),
                tags: None,
                deprecated: None,
                range: index.range_of(symbol.full_range),
                selection_range: index.range_of(symbol.name_range),
                children: (!symbol.children.is_empty())
                    .then(|| to_document_symbols(&symbol.children, index)),
            }
        })
        .collect()
}
