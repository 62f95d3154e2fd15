//
// property_tests.rs
//
// Property-based tests for the scanner, outline and resolution
//

use std::collections::{HashSet, VecDeque};

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::Position;

use crate::cross_file::dependency::resolve_dependencies;
use crate::cross_file::path_resolve::FileId;
use crate::definition::classify_reference;
use crate::outline::{build_outline, Symbol, SymbolCategory};
use crate::scanner::{scan, TagEvent};
use crate::semantic_tokens::collect_semantic_tokens;
use crate::span::LineIndex;
use crate::test_utils::MemoryReader;

// ============================================================================
// Generators
// ============================================================================

/// Text biased toward markup fragments, including unbalanced ones.
fn markup_soup() -> impl Strategy<Value = String> {
    let fragment = prop_oneof![
        Just("<".to_string()),
        Just(">".to_string()),
        Just("/>".to_string()),
        Just("</".to_string()),
        Just("<!--".to_string()),
        Just("-->".to_string()),
        Just("<![CDATA[".to_string()),
        Just("]]>".to_string()),
        Just("<?xml ?>".to_string()),
        Just("\"".to_string()),
        Just("'".to_string()),
        Just("=".to_string()),
        Just("$(".to_string()),
        Just(")".to_string()),
        Just("#".to_string()),
        Just("\r\n".to_string()),
        Just("é😀".to_string()),
        "[A-Za-z ]{1,6}",
        "<(Node|Expand|Include|Macro|Property) Name=\"[A-Za-z]{0,4}\"",
    ];
    prop::collection::vec(fragment, 0..40).prop_map(|parts| parts.concat())
}

#[derive(Debug, Clone)]
struct Element {
    tag: &'static str,
    name: String,
    produces: Option<String>,
    children: Vec<Element>,
}

fn element_name() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{0,5}"
}

fn leaf() -> impl Strategy<Value = Element> {
    (
        prop::sample::select(vec!["Agent", "Node", "Macro", "Property", "Option", "Log"]),
        element_name(),
        prop::option::of(element_name()),
    )
        .prop_map(|(tag, name, produces)| Element {
            tag,
            name,
            produces,
            children: Vec::new(),
        })
}

fn element_tree() -> impl Strategy<Value = Element> {
    leaf().prop_recursive(4, 32, 4, |inner| {
        (leaf(), prop::collection::vec(inner, 0..4)).prop_map(|(mut parent, children)| {
            parent.children = children;
            parent
        })
    })
}

fn render(element: &Element, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!("{}<{} Name=\"{}\"", indent, element.tag, element.name));
    if let Some(tag) = &element.produces {
        out.push_str(&format!(" Produces=\"#{}\"", tag));
    }
    if element.children.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push_str(">\n");
    for child in &element.children {
        render(child, depth + 1, out);
    }
    out.push_str(&format!("{}</{}>\n", indent, element.tag));
}

fn balanced_document() -> impl Strategy<Value = String> {
    prop::collection::vec(element_tree(), 0..4).prop_map(|elements| {
        let mut out = String::from("<BuildGraph>\n");
        for element in &elements {
            render(element, 1, &mut out);
        }
        out.push_str("</BuildGraph>\n");
        out
    })
}

// ============================================================================
// Scanner and classification tolerate any input
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_scanner_spans_are_valid(text in markup_soup()) {
        let mut previous_start = 0;
        for event in scan(&text) {
            let span = match &event {
                TagEvent::Open(tag) => {
                    for attr in &tag.attributes {
                        prop_assert_eq!(attr.value_span.slice(&text), attr.value);
                        prop_assert!(tag.span.encloses(&attr.value_span));
                    }
                    tag.span
                }
                TagEvent::Close { span, .. }
                | TagEvent::CommentStart { span }
                | TagEvent::CommentEnd { span } => *span,
            };
            prop_assert!(span.start <= span.end && span.end <= text.len());
            prop_assert!(text.is_char_boundary(span.start) && text.is_char_boundary(span.end));
            prop_assert!(span.start >= previous_start, "events out of order");
            previous_start = span.start;
        }
    }

    #[test]
    fn prop_scanning_is_idempotent(text in markup_soup()) {
        let first: Vec<_> = scan(&text).collect();
        let second: Vec<_> = scan(&text).collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_outline_containment_on_tag_soup(text in markup_soup()) {
        fn check(symbol: &Symbol) -> Result<(), TestCaseError> {
            prop_assert!(symbol.full_range.encloses(&symbol.name_range) || symbol.category == SymbolCategory::Group);
            for child in &symbol.children {
                if symbol.category != SymbolCategory::Group {
                    prop_assert!(symbol.full_range.encloses(&child.full_range));
                }
                check(child)?;
            }
            Ok(())
        }
        for symbol in build_outline(&text) {
            check(&symbol)?;
        }
    }

    #[test]
    fn prop_classify_never_panics(text in markup_soup(), offset in 0usize..400) {
        if let Some(reference) = classify_reference(&text, offset) {
            let origin = reference.origin();
            prop_assert!(origin.end <= text.len());
            let named = !reference.name().is_empty()
                || matches!(reference, crate::definition::Reference::Include { .. });
            prop_assert!(named, "unnamed reference {:?}", reference);
        }
        let _ = build_outline(&text);
    }

    #[test]
    fn prop_semantic_tokens_sorted_and_disjoint(text in markup_soup()) {
        let tokens = collect_semantic_tokens(&text);
        for pair in tokens.windows(2) {
            prop_assert!(pair[0].span.end <= pair[1].span.start);
        }
    }

    #[test]
    fn prop_line_index_round_trips(text in markup_soup()) {
        let index = LineIndex::new(&text);
        for (offset, _) in text.char_indices() {
            let position = index.position_at(offset);
            // Offsets inside a CRLF pair map back to the line end
            if text[offset..].starts_with('\n') && offset > 0 && text.as_bytes()[offset - 1] == b'\r' {
                continue;
            }
            prop_assert_eq!(index.offset_at(position), offset);
        }
        prop_assert_eq!(index.offset_at(Position::new(u32::MAX, 0)), text.len());
    }
}

// ============================================================================
// Outline structure over balanced documents
// ============================================================================

fn check_symbol(symbol: &Symbol, text: &str) -> Result<(), TestCaseError> {
    let is_element = !matches!(
        symbol.category,
        SymbolCategory::Group | SymbolCategory::Produces | SymbolCategory::Include
    );
    if is_element {
        let slice = symbol.full_range.slice(text);
        prop_assert!(slice.starts_with('<'), "{} starts with {:?}", symbol.name, slice);
        let expected_close = format!("</{}>", symbol.detail);
        prop_assert!(
            slice.ends_with("/>") || slice.ends_with(&expected_close),
            "{} ends with {:?}",
            symbol.name,
            slice
        );
    }
    for child in &symbol.children {
        if symbol.category != SymbolCategory::Group {
            prop_assert!(symbol.full_range.encloses(&child.full_range));
        }
        check_symbol(child, text)?;
    }
    for pair in symbol.children.windows(2) {
        prop_assert!(pair[0].full_range.start <= pair[1].full_range.start);
    }
    Ok(())
}

fn count_outline_elements(element: &Element) -> usize {
    let own = usize::from(element.tag != "Log");
    own + element.children.iter().map(count_outline_elements).sum::<usize>()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_outline_ranges_nest(text in balanced_document()) {
        for symbol in build_outline(&text) {
            check_symbol(&symbol, &text)?;
        }
    }

    #[test]
    fn prop_outline_keeps_every_named_element(element in element_tree()) {
        let mut text = String::new();
        render(&element, 0, &mut text);

        fn count(symbols: &[Symbol]) -> usize {
            symbols
                .iter()
                .map(|s| {
                    let own = usize::from(!matches!(
                        s.category,
                        SymbolCategory::Group | SymbolCategory::Produces
                    ));
                    own + count(&s.children)
                })
                .sum()
        }
        prop_assert_eq!(count(&build_outline(&text)), count_outline_elements(&element));
    }
}

// ============================================================================
// Dependency discovery over arbitrary include graphs
// ============================================================================

fn include_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..8).prop_flat_map(|n| prop::collection::vec(prop::collection::vec(0..n, 0..4), n))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_dependencies_match_reachability(graph in include_graph()) {
        let path = |i: usize| format!("/w/File{}.xml", i);
        let mut reader = MemoryReader::new();
        for (i, edges) in graph.iter().enumerate() {
            let text: String = edges
                .iter()
                .map(|j| format!("<Include Script=\"File{}.xml\"/>\n", j))
                .collect();
            reader = reader.with_file(&path(i), &text);
        }

        let root = FileId::new(path(0)).unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let set = runtime
            .block_on(resolve_dependencies(&root, &reader, &CancellationToken::new(), 2048))
            .unwrap();

        let mut reachable = HashSet::from([0usize]);
        let mut queue = VecDeque::from([0usize]);
        while let Some(i) = queue.pop_front() {
            for &j in &graph[i] {
                if reachable.insert(j) {
                    queue.push_back(j);
                }
            }
        }

        prop_assert_eq!(set.root(), &root);
        prop_assert_eq!(set.len(), reachable.len());
        for i in reachable {
            prop_assert!(set.contains(&FileId::new(path(i)).unwrap()));
        }
        for i in 0..graph.len() {
            prop_assert!(reader.read_count(&FileId::new(path(i)).unwrap()) <= 1);
        }
    }
}
