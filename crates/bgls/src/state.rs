//
// state.rs
//
// Open documents, workspace configuration and in-flight request tracking
//

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use ropey::Rope;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{TextDocumentContentChangeEvent, Url};

use crate::config::BuildGraphConfig;
use crate::cross_file::content_provider::{DiskReader, OverlayReader};
use crate::cross_file::path_resolve::FileId;

/// An open document
pub struct Document {
    pub contents: Rope,
}

impl Document {
    pub fn new(text: &str) -> Self {
        Self {
            contents: Rope::from_str(text),
        }
    }

    pub fn apply_change(&mut self, change: TextDocumentContentChangeEvent) {
        if let Some(range) = change.range {
            let start_idx = self.char_index(range.start.line, range.start.character);
            let end_idx = self.char_index(range.end.line, range.end.character).max(start_idx);

            self.contents.remove(start_idx..end_idx);
            self.contents.insert(start_idx, &change.text);
        } else {
            // Full document sync
            self.contents = Rope::from_str(&change.text);
        }
    }

    /// Char index of an LSP position. Positions past the last line clamp to the
    /// end of the rope.
    fn char_index(&self, line: u32, utf16_character: u32) -> usize {
        let line = line as usize;
        if line >= self.contents.len_lines() {
            return self.contents.len_chars();
        }
        let line_text = self.contents.line(line).to_string();
        self.contents.line_to_char(line) + utf16_offset_to_char_offset(&line_text, utf16_character)
    }

    pub fn text(&self) -> String {
        self.contents.to_string()
    }
}

fn utf16_offset_to_char_offset(line_text: &str, utf16_offset: u32) -> usize {
    let mut utf16_count = 0;
    let mut char_count = 0;

    for ch in line_text.chars() {
        if utf16_count >= utf16_offset as usize || ch == '\n' || ch == '\r' {
            return char_count;
        }
        utf16_count += ch.len_utf16();
        char_count += 1;
    }
    char_count
}

/// Cancellation tokens for requests running against each document.
///
/// Every request gets a child of the document's current token. Editing or
/// closing the document cancels the parent, which reaches every outstanding
/// request on that document at once.
#[derive(Debug, Default)]
pub struct RequestTracker {
    generations: RwLock<HashMap<Url, CancellationToken>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for a new request on `uri`.
    pub fn begin(&self, uri: &Url) -> CancellationToken {
        let mut generations = self
            .generations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        generations
            .entry(uri.clone())
            .or_insert_with(CancellationToken::new)
            .child_token()
    }

    /// Cancel every outstanding request on `uri`.
    pub fn cancel(&self, uri: &Url) {
        let mut generations = self
            .generations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = generations.remove(uri) {
            log::trace!("Cancelling outstanding requests for {}", uri);
            token.cancel();
        }
    }

    pub fn cancel_all(&self) {
        let mut generations = self
            .generations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, token) in generations.drain() {
            token.cancel();
        }
    }
}

pub struct WorldState {
    pub documents: HashMap<Url, Document>,
    pub config: BuildGraphConfig,
    pub requests: RequestTracker,
    /// Client accepts `LocationLink` results for go-to-definition
    pub link_support: bool,
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldState {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
            config: BuildGraphConfig::default(),
            requests: RequestTracker::new(),
            link_support: false,
        }
    }

    pub fn open_document(&mut self, uri: Url, text: &str) {
        self.documents.insert(uri, Document::new(text));
    }

    pub fn close_document(&mut self, uri: &Url) {
        self.documents.remove(uri);
        self.requests.cancel(uri);
    }

    pub fn apply_change(&mut self, uri: &Url, change: TextDocumentContentChangeEvent) {
        if let Some(doc) = self.documents.get_mut(uri) {
            doc.apply_change(change);
        }
    }

    pub fn get_document(&self, uri: &Url) -> Option<&Document> {
        self.documents.get(uri)
    }

    /// Copy of every open document's text layered over disk, so resolution
    /// can run without holding the state lock.
    pub fn snapshot_reader(&self) -> OverlayReader<DiskReader> {
        let open = self
            .documents
            .iter()
            .filter_map(|(uri, doc)| Some((FileId::from_url(uri)?, doc.text())))
            .collect();
        OverlayReader::new(open, DiskReader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::{Position, Range};

    fn change(range: Option<Range>, text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range,
            range_length: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_incremental_change() {
        let mut doc = Document::new("<Node Name=\"A\"/>\n<Macro Name=\"M\"/>");
        doc.apply_change(change(
            Some(Range::new(Position::new(1, 13), Position::new(1, 14))),
            "Sign",
        ));
        assert_eq!(doc.text(), "<Node Name=\"A\"/>\n<Macro Name=\"Sign\"/>");
    }

    #[test]
    fn test_change_with_utf16_columns() {
        let mut doc = Document::new("<Property Name=\"😀\" Value=\"x\"/>");
        // The emoji is two UTF-16 code units: columns 16..18
        doc.apply_change(change(
            Some(Range::new(Position::new(0, 16), Position::new(0, 18))),
            "Smile",
        ));
        assert_eq!(doc.text(), "<Property Name=\"Smile\" Value=\"x\"/>");
    }

    #[test]
    fn test_full_sync_and_append_past_end() {
        let mut doc = Document::new("old");
        doc.apply_change(change(None, "<BuildGraph>"));
        assert_eq!(doc.text(), "<BuildGraph>");

        doc.apply_change(change(
            Some(Range::new(Position::new(5, 0), Position::new(5, 0))),
            "\n</BuildGraph>",
        ));
        assert_eq!(doc.text(), "<BuildGraph>\n</BuildGraph>");
    }

    #[test]
    fn test_request_tracker_cancels_children() {
        let tracker = RequestTracker::new();
        let uri = Url::parse("file:///w/Main.xml").unwrap();
        let other = Url::parse("file:///w/Other.xml").unwrap();

        let first = tracker.begin(&uri);
        let second = tracker.begin(&uri);
        let unrelated = tracker.begin(&other);

        tracker.cancel(&uri);
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert!(!unrelated.is_cancelled());

        // New requests after an edit start fresh
        assert!(!tracker.begin(&uri).is_cancelled());

        tracker.cancel_all();
        assert!(unrelated.is_cancelled());
    }

    #[test]
    fn test_document_text_tracks_open_and_edits() {
        let mut state = WorldState::new();
        let uri = Url::parse("file:///w/Main.xml").unwrap();
        state.open_document(uri.clone(), "<BuildGraph/>");
        state.apply_change(&uri, change(None, "<BuildGraph>\n</BuildGraph>"));
        assert_eq!(state.get_document(&uri).unwrap().text(), "<BuildGraph>\n</BuildGraph>");

        // Reopening replaces the buffer outright
        state.open_document(uri.clone(), "<Agent Name=\"A\"/>");
        assert_eq!(state.get_document(&uri).unwrap().text(), "<Agent Name=\"A\"/>");
    }

    #[test]
    fn test_close_document_cancels_requests() {
        let mut state = WorldState::new();
        let uri = Url::parse("file:///w/Main.xml").unwrap();
        state.open_document(uri.clone(), "<BuildGraph/>");
        let token = state.requests.begin(&uri);

        state.close_document(&uri);
        assert!(token.is_cancelled());
        assert!(state.get_document(&uri).is_none());
    }
}
