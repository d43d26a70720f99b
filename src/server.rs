/// LSP server trait implementation.
///
/// This module contains the `impl LanguageServer for Backend` block,
/// which handles the protocol messages the server answers (initialize,
/// didSave, definition, shutdown).
use tower_lsp::LanguageServer;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::{debug, error, info};

use crate::Backend;

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        // Extract and store the workspace root path
        let workspace_root = params
            .root_uri
            .as_ref()
            .and_then(|uri| uri.to_file_path().ok());

        match workspace_root {
            Some(root) => {
                *self.workspace_root.lock() = Some(root.clone());
                let config = self.config.for_workspace(&root);
                let options = config.engine_options(&root);
                // Runs in the background; initialize answers right away.
                self.start_initial_check(root, options);
            }
            None => info!("No workspace root, mypy will not run"),
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(false),
                        change: Some(TextDocumentSyncKind::NONE),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..TextDocumentSyncOptions::default()
                    },
                )),
                definition_provider: Some(OneOf::Left(true)),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: self.name.clone(),
                version: Some(self.version.clone()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let message = match self.workspace_root() {
            Some(root) => format!("mypyls initialized, checking {}", root.display()),
            None => "mypyls initialized without a workspace".to_string(),
        };
        self.log(MessageType::INFO, message).await;
    }

    async fn shutdown(&self) -> Result<()> {
        self.session.abort();
        Ok(())
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        if !is_python_source(&uri) {
            debug!("Saved {}, not a Python file", uri);
            return;
        }
        info!("Saved {}, re-checking", uri);
        self.start_recheck();
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        // Engine queries block.
        let backend = self.clone();
        let found =
            tokio::task::spawn_blocking(move || backend.resolve_definition(&uri, position)).await;
        let locations: Vec<Location> = match found {
            Ok(location) => location.into_iter().collect(),
            Err(e) => {
                error!("Definition lookup failed: {}", e);
                Vec::new()
            }
        };
        Ok(Some(GotoDefinitionResponse::Array(locations)))
    }
}

fn is_python_source(uri: &Url) -> bool {
    uri.path().ends_with(".py") || uri.path().ends_with(".pyi")
}
