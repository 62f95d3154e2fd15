//
// handlers.rs
//
// LSP request handlers: convert protocol positions to byte offsets, call into
// the analysis modules, and convert results back
//

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;

use crate::build_tool::{self, ComposeError};
use crate::config::BuildGraphConfig;
use crate::cross_file::content_provider::{DiskReader, FileReader, OverlayReader};
use crate::cross_file::path_resolve::FileId;
use crate::definition::{resolve_at, Definition};
use crate::hover::classify_hover;
use crate::outline::{build_outline, to_document_symbols};
use crate::semantic_tokens::{collect_semantic_tokens, encode};
use crate::span::LineIndex;
use crate::state::WorldState;

pub const COMMAND_COMPOSE: &str = "bgls.composeCommand";
pub const COMMAND_PARSE_LISTING: &str = "bgls.parseListing";

pub fn commands() -> Vec<String> {
    vec![COMMAND_COMPOSE.to_string(), COMMAND_PARSE_LISTING.to_string()]
}

pub fn document_symbol(state: &WorldState, uri: &Url) -> Option<DocumentSymbolResponse> {
    let text = state.get_document(uri)?.text();
    let outline = build_outline(&text);
    let index = LineIndex::new(&text);
    Some(DocumentSymbolResponse::Nested(to_document_symbols(
        &outline, &index,
    )))
}

pub fn semantic_tokens_full(state: &WorldState, uri: &Url) -> Option<SemanticTokensResult> {
    if !state.config.semantic_tokens {
        return None;
    }
    let text = state.get_document(uri)?.text();
    let tokens = collect_semantic_tokens(&text);
    let data = encode(&tokens, &LineIndex::new(&text));
    Some(SemanticTokensResult::Tokens(SemanticTokens {
        result_id: None,
        data,
    }))
}

/// Everything a cross-file request needs, copied out of the world state so
/// the lock is released before any file is read.
pub struct RequestSnapshot {
    pub uri: Url,
    pub file: FileId,
    pub text: String,
    pub reader: OverlayReader<DiskReader>,
    pub config: BuildGraphConfig,
    pub cancel: CancellationToken,
    pub link_support: bool,
}

impl RequestSnapshot {
    pub fn capture(state: &WorldState, uri: &Url) -> Option<Self> {
        let text = state.get_document(uri)?.text();
        let file = FileId::from_url(uri)?;
        Some(Self {
            uri: uri.clone(),
            file,
            text,
            reader: state.snapshot_reader(),
            config: state.config.clone(),
            cancel: state.requests.begin(uri),
            link_support: state.link_support,
        })
    }

    fn offset_at(&self, position: Position) -> usize {
        LineIndex::new(&self.text).offset_at(position)
    }
}

/// Definition response plus an optional message to show the user.
pub async fn goto_definition(
    snapshot: &RequestSnapshot,
    position: Position,
) -> (Option<GotoDefinitionResponse>, Option<String>) {
    let offset = snapshot.offset_at(position);
    let outcome = resolve_at(
        &snapshot.file,
        &snapshot.text,
        offset,
        &snapshot.reader,
        &snapshot.cancel,
        &snapshot.config,
    )
    .await;

    let response = outcome
        .definition
        .and_then(|definition| definition_response(snapshot, &definition));
    (response, outcome.warning)
}

fn definition_response(
    snapshot: &RequestSnapshot,
    definition: &Definition,
) -> Option<GotoDefinitionResponse> {
    let target_uri = definition.target_file.to_url()?;
    if snapshot.link_support {
        let origin = LineIndex::new(&snapshot.text).range_of(definition.origin);
        Some(GotoDefinitionResponse::Link(vec![LocationLink {
            origin_selection_range: Some(origin),
            target_uri,
            target_range: definition.target_range,
            target_selection_range: definition.selection_range,
        }]))
    } else {
        Some(GotoDefinitionResponse::Scalar(Location::new(
            target_uri,
            definition.target_range,
        )))
    }
}

pub async fn hover(snapshot: &RequestSnapshot, position: Position) -> Option<Hover> {
    let offset = snapshot.offset_at(position);
    let info = classify_hover(
        &snapshot.file,
        &snapshot.text,
        offset,
        &snapshot.reader,
        &snapshot.cancel,
        &snapshot.config,
    )
    .await?;

    Some(Hover {
        contents: info.to_contents(),
        range: Some(LineIndex::new(&snapshot.text).range_of(info.origin())),
    })
}

// ============================================================================
// workspace/executeCommand
// ============================================================================

pub enum CommandOutcome {
    Value(Option<Value>),
    /// Nothing to return; tell the user why
    Message(MessageType, String),
}

/// A workspace command with its arguments validated and any document text
/// copied out of the state, ready to run without the state lock.
#[derive(Debug)]
pub enum PreparedCommand {
    Compose {
        script: PathBuf,
        text: String,
        offset: usize,
        launcher_name: String,
        list_only: bool,
    },
    ParseListing(String),
}

pub fn prepare_command(
    state: &WorldState,
    command: &str,
    arguments: &[Value],
) -> Result<PreparedCommand> {
    match command {
        COMMAND_COMPOSE => {
            let uri = arguments
                .first()
                .and_then(|v| v.as_str())
                .and_then(|s| Url::parse(s).ok())
                .ok_or_else(|| Error::invalid_params("Missing or invalid 'uri' argument"))?;
            let position = arguments
                .get(1)
                .and_then(|v| serde_json::from_value::<Position>(v.clone()).ok())
                .ok_or_else(|| Error::invalid_params("Missing or invalid 'position' argument"))?;
            let list_only = arguments.get(2).and_then(|v| v.as_bool()).unwrap_or(false);

            let text = state
                .get_document(&uri)
                .ok_or_else(|| Error::invalid_params("Document is not open"))?
                .text();
            let script = uri
                .to_file_path()
                .map_err(|_| Error::invalid_params("Document is not a file"))?;
            let offset = LineIndex::new(&text).offset_at(position);

            Ok(PreparedCommand::Compose {
                script,
                text,
                offset,
                launcher_name: state.config.launcher_name.clone(),
                list_only,
            })
        }
        COMMAND_PARSE_LISTING => {
            let output = arguments
                .first()
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::invalid_params("Missing 'output' argument"))?;
            Ok(PreparedCommand::ParseListing(output.to_string()))
        }
        _ => Err(Error::method_not_found()),
    }
}

/// Run a prepared command. The launcher lookup goes through `reader`.
pub async fn run_command<R: FileReader + ?Sized>(
    command: PreparedCommand,
    reader: &R,
) -> Result<CommandOutcome> {
    match command {
        PreparedCommand::Compose {
            script,
            text,
            offset,
            launcher_name,
            list_only,
        } => {
            match compose_for_document(&script, &text, offset, &launcher_name, list_only, reader)
                .await
            {
                Ok(command) => Ok(CommandOutcome::Value(Some(Value::String(command)))),
                Err(err @ ComposeError::NoTarget) => {
                    Ok(CommandOutcome::Message(MessageType::WARNING, err.to_string()))
                }
                Err(err @ ComposeError::LauncherNotFound(_)) => {
                    Ok(CommandOutcome::Message(MessageType::ERROR, err.to_string()))
                }
            }
        }
        PreparedCommand::ParseListing(output) => {
            let listing = build_tool::parse_listing(&output);
            let value = serde_json::to_value(listing).map_err(|_| Error::internal_error())?;
            Ok(CommandOutcome::Value(Some(value)))
        }
    }
}

/// Build the launcher command line for the target under `offset` in `script`.
pub async fn compose_for_document<R: FileReader + ?Sized>(
    script: &Path,
    text: &str,
    offset: usize,
    launcher_name: &str,
    list_only: bool,
    reader: &R,
) -> std::result::Result<String, ComposeError> {
    let target = build_tool::target_name_at(text, offset).ok_or(ComposeError::NoTarget)?;
    let script_dir = script.parent().unwrap_or(script);
    let launcher = build_tool::find_launcher(script_dir, launcher_name, reader)
        .await
        .ok_or_else(|| ComposeError::LauncherNotFound(launcher_name.to_string()))?;
    Ok(build_tool::compose_command(
        &launcher, script, &target, list_only,
    ))
}
