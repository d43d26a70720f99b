//! mypyls: Python go-to-definition and diagnostics over a live checking
//! session.
//!
//! The server keeps one long-lived incremental checking engine per
//! workspace.  `initialize` starts it in the background and publishes the
//! diagnostics of the first full check; `textDocument/definition` asks the
//! live engine for the node under the cursor and follows it to its
//! declaration.
//!
//! - [`session`]: engine lifecycle and background checks
//! - [`diagnostics`]: report parsing and publishing
//! - [`definition`]: position-to-declaration resolution
//! - [`engine`]: the trait the checking engine is driven through
//! - [`dmypy`]: an engine backed by the `dmypy` daemon client
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tower_lsp::Client;
use tower_lsp::lsp_types::{Diagnostic, Url};

pub mod config;
pub mod definition;
pub mod diagnostics;
pub mod dmypy;
pub mod engine;
mod server;
pub mod session;
pub mod types;

pub use config::Config;
pub use engine::{CheckOutcome, CheckingEngine, EngineError, EngineFactory, EngineOptions};
pub use session::{CheckState, CheckerSession};

#[derive(Clone)]
pub struct Backend {
    name: String,
    version: String,
    /// Root of the project being checked, set by `initialize`.
    workspace_root: Arc<Mutex<Option<PathBuf>>>,
    /// Command-line configuration; the workspace file is layered on top
    /// at `initialize`.
    config: Config,
    engine_factory: EngineFactory,
    session: Arc<CheckerSession>,
    /// Last diagnostics sent per document, used to clear documents that
    /// no longer have any.
    published: Arc<Mutex<HashMap<Url, Vec<Diagnostic>>>>,
    client: Option<Client>,
}

impl Backend {
    pub fn new(client: Client, config: Config, engine_factory: EngineFactory) -> Self {
        Self::build(Some(client), config, engine_factory)
    }

    /// A backend with no client and no engine.
    pub fn new_test() -> Self {
        Self::build(None, Config::default(), engine::unavailable_engine())
    }

    /// A backend with no client whose session will use `engine`.
    pub fn new_test_with_engine(engine: Arc<dyn CheckingEngine>) -> Self {
        Self::build(None, Config::default(), engine::shared_engine(engine))
    }

    fn build(client: Option<Client>, config: Config, engine_factory: EngineFactory) -> Self {
        Self {
            name: "mypyls".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            workspace_root: Arc::new(Mutex::new(None)),
            config,
            engine_factory,
            session: Arc::new(CheckerSession::new()),
            published: Arc::new(Mutex::new(HashMap::new())),
            client,
        }
    }

    pub fn session(&self) -> &CheckerSession {
        &self.session
    }

    pub fn workspace_root(&self) -> Option<PathBuf> {
        self.workspace_root.lock().clone()
    }

    pub(crate) async fn log(&self, typ: tower_lsp::lsp_types::MessageType, message: String) {
        if let Some(client) = &self.client {
            client.log_message(typ, message).await;
        }
    }
}
