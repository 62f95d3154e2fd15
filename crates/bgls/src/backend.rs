//
// backend.rs
//
// Language server shell: document lifecycle, capabilities and request routing
//

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::Client;
use tower_lsp::LanguageServer;
use tower_lsp::LspService;
use tower_lsp::Server;

use crate::config::BuildGraphConfig;
use crate::cross_file::content_provider::DiskReader;
use crate::handlers::{self, CommandOutcome, RequestSnapshot};
use crate::semantic_tokens;
use crate::state::WorldState;

pub struct Backend {
    client: Client,
    state: Arc<RwLock<WorldState>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(RwLock::new(WorldState::new())),
        }
    }

    /// Snapshot a document for a cross-file request under a brief read lock.
    async fn snapshot(&self, uri: &Url) -> Option<RequestSnapshot> {
        let state = self.state.read().await;
        RequestSnapshot::capture(&state, uri)
    }
}

fn client_supports_definition_links(capabilities: &ClientCapabilities) -> bool {
    capabilities
        .text_document
        .as_ref()
        .and_then(|td| td.definition.as_ref())
        .and_then(|def| def.link_support)
        .unwrap_or(false)
}

fn server_capabilities(config: &BuildGraphConfig) -> ServerCapabilities {
    let semantic_tokens_provider = config.semantic_tokens.then(|| {
        SemanticTokensServerCapabilities::SemanticTokensOptions(SemanticTokensOptions {
            legend: semantic_tokens::legend(),
            full: Some(SemanticTokensFullOptions::Bool(true)),
            range: None,
            ..Default::default()
        })
    });

    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Kind(
            TextDocumentSyncKind::INCREMENTAL,
        )),
        document_symbol_provider: Some(OneOf::Left(true)),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        definition_provider: Some(OneOf::Left(true)),
        semantic_tokens_provider,
        execute_command_provider: Some(ExecuteCommandOptions {
            commands: handlers::commands(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        log::info!("Initializing bgls");

        let mut state = self.state.write().await;

        if let Some(config) = params
            .initialization_options
            .as_ref()
            .and_then(BuildGraphConfig::from_settings)
        {
            state.config = config;
        }
        state.link_support = client_supports_definition_links(&params.capabilities);
        log::info!(
            "Definition links {}supported by client",
            if state.link_support { "" } else { "not " }
        );

        let capabilities = server_capabilities(&state.config);
        drop(state);

        Ok(InitializeResult {
            capabilities,
            server_info: Some(ServerInfo {
                name: String::from("bgls"),
                version: Some(String::from(env!("CARGO_PKG_VERSION"))),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        log::info!("bgls initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        log::info!("bgls shutting down");
        self.state.read().await.requests.cancel_all();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        log::trace!("Opened {} (version {})", doc.uri, doc.version);
        let mut state = self.state.write().await;
        state.open_document(doc.uri, &doc.text);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let mut state = self.state.write().await;

        // A newer edit supersedes any query still running against this document.
        state.requests.cancel(&uri);

        log::trace!("Changed {} (version {})", uri, params.text_document.version);
        for change in params.content_changes {
            state.apply_change(&uri, change);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = &params.text_document.uri;
        log::trace!("Closed {}", uri);
        self.state.write().await.close_document(uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        match BuildGraphConfig::from_settings(&params.settings) {
            Some(config) => {
                log::info!("Configuration changed: {:?}", config);
                self.state.write().await.config = config;
            }
            None => log::warn!(
                "Failed to parse configuration from settings, using existing configuration"
            ),
        }
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let state = self.state.read().await;
        Ok(handlers::document_symbol(&state, &params.text_document.uri))
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> Result<Option<SemanticTokensResult>> {
        let state = self.state.read().await;
        Ok(handlers::semantic_tokens_full(&state, &params.text_document.uri))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params;
        let Some(snapshot) = self.snapshot(&position.text_document.uri).await else {
            return Ok(None);
        };
        Ok(handlers::hover(&snapshot, position.position).await)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params;
        let Some(snapshot) = self.snapshot(&position.text_document.uri).await else {
            return Ok(None);
        };

        let (response, warning) = handlers::goto_definition(&snapshot, position.position).await;
        if let Some(message) = warning {
            self.client.show_message(MessageType::WARNING, message).await;
        }
        Ok(response)
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        log::trace!("Executing command {}", params.command);
        let command = {
            let state = self.state.read().await;
            handlers::prepare_command(&state, &params.command, &params.arguments)?
        };
        let outcome = handlers::run_command(command, &DiskReader).await?;

        match outcome {
            CommandOutcome::Value(value) => Ok(value),
            CommandOutcome::Message(kind, message) => {
                self.client.show_message(kind, message).await;
                Ok(None)
            }
        }
    }
}

pub async fn start_lsp() -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
