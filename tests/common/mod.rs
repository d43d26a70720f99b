#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use mypyls::types::*;
use mypyls::{Backend, CheckOutcome, CheckingEngine, EngineError};
use tower_lsp::LanguageServer;
use tower_lsp::lsp_types::*;

/// What the fake engine does when asked to check.
pub enum CheckBehaviour {
    Report(CheckOutcome),
    Fail(String),
    Exit(i32),
    Panic,
    /// Block until an outcome arrives on the channel.
    Blocked(Receiver<CheckOutcome>),
}

/// In-memory checking engine with canned answers.
#[derive(Default)]
pub struct FakeEngine {
    references: Vec<(PathBuf, NodeSpan, ReferenceNode, EnclosingFile)>,
    members: HashMap<u64, DefinitionNode>,
    files: HashMap<String, PathBuf>,
    modules: HashMap<String, DefinitionNode>,
    checks: Mutex<VecDeque<CheckBehaviour>>,
    check_count: AtomicUsize,
    cancel_count: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reference node covering `span` in `path`.
    pub fn reference(
        mut self,
        path: &Path,
        span: NodeSpan,
        node: ReferenceNode,
        enclosing: EnclosingFile,
    ) -> Self {
        self.references
            .push((path.to_path_buf(), span, node, enclosing));
        self
    }

    pub fn member(mut self, node_id: u64, definition: DefinitionNode) -> Self {
        self.members.insert(node_id, definition);
        self
    }

    /// Declare which file defines `fullname`.
    pub fn file(mut self, fullname: &str, path: &Path) -> Self {
        self.files.insert(fullname.to_string(), path.to_path_buf());
        self
    }

    pub fn module(mut self, definition: DefinitionNode) -> Self {
        self.modules.insert(definition.fullname.clone(), definition);
        self
    }

    /// Queue the behaviour of the next check.
    pub fn on_check(self, behaviour: CheckBehaviour) -> Self {
        self.checks.lock().unwrap().push_back(behaviour);
        self
    }

    pub fn check_count(&self) -> usize {
        self.check_count.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancel_count.load(Ordering::SeqCst)
    }
}

impl CheckingEngine for FakeEngine {
    fn find_reference(
        &self,
        path: &Path,
        position: EnginePosition,
    ) -> Option<(ReferenceNode, EnclosingFile)> {
        self.references
            .iter()
            .find(|(p, span, _, _)| p == path && span.start <= position && position < span.end)
            .map(|(_, _, node, enclosing)| (node.clone(), enclosing.clone()))
    }

    fn member_definition(&self, member: &MemberRef) -> Option<DefinitionNode> {
        self.members.get(&member.node_id).cloned()
    }

    fn containing_file(
        &self,
        definition: &DefinitionNode,
        _enclosing: &EnclosingFile,
    ) -> Option<PathBuf> {
        self.files.get(&definition.fullname).cloned()
    }

    fn check(&self, _roots: &[PathBuf]) -> Result<CheckOutcome, EngineError> {
        self.check_count.fetch_add(1, Ordering::SeqCst);
        let behaviour = self.checks.lock().unwrap().pop_front();
        match behaviour {
            None => Ok(CheckOutcome::default()),
            Some(CheckBehaviour::Report(outcome)) => Ok(outcome),
            Some(CheckBehaviour::Fail(message)) => Err(EngineError::Failed(message)),
            Some(CheckBehaviour::Exit(code)) => Err(EngineError::Exited(code)),
            Some(CheckBehaviour::Panic) => panic!("engine blew up"),
            Some(CheckBehaviour::Blocked(rx)) => Ok(rx.recv().unwrap()),
        }
    }

    fn module(&self, name: &str) -> Option<DefinitionNode> {
        self.modules.get(name).cloned()
    }

    fn cancel(&self) {
        self.cancel_count.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn pos(line: u32, column: u32) -> EnginePosition {
    EnginePosition::new(line, column)
}

pub fn span(start: (u32, u32), end: (u32, u32)) -> NodeSpan {
    NodeSpan::new(pos(start.0, start.1), pos(end.0, end.1))
}

pub fn definition(fullname: &str, kind: &str, line: i32, column: i32) -> DefinitionNode {
    DefinitionNode {
        fullname: fullname.to_string(),
        kind: kind.to_string(),
        line,
        column,
    }
}

pub fn enclosing(module: &str, path: &Path) -> EnclosingFile {
    EnclosingFile {
        module: module.to_string(),
        path: path.to_path_buf(),
    }
}

pub fn report(status: i32, out: &str) -> CheckBehaviour {
    CheckBehaviour::Report(CheckOutcome {
        status,
        out: out.to_string(),
        err: String::new(),
    })
}

/// Create a temp workspace containing `files`.
pub fn create_workspace(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    for (rel_path, content) in files {
        let full = dir.path().join(rel_path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("failed to create dirs");
        }
        fs::write(&full, content).expect("failed to write Python file");
    }
    dir
}

pub fn backend_with(engine: Arc<FakeEngine>) -> Backend {
    Backend::new_test_with_engine(engine)
}

/// Send `initialize` with `root` as the workspace.
#[allow(deprecated)]
pub async fn initialize(backend: &Backend, root: &Path) -> InitializeResult {
    let params = InitializeParams {
        root_uri: Some(Url::from_file_path(root).unwrap()),
        ..InitializeParams::default()
    };
    backend.initialize(params).await.unwrap()
}

/// Send a definition request and return the locations.
pub async fn definition_at(backend: &Backend, path: &Path, line: u32, character: u32) -> Vec<Location> {
    let params = GotoDefinitionParams {
        text_document_position_params: TextDocumentPositionParams {
            text_document: TextDocumentIdentifier {
                uri: Url::from_file_path(path).unwrap(),
            },
            position: Position { line, character },
        },
        work_done_progress_params: WorkDoneProgressParams::default(),
        partial_result_params: PartialResultParams::default(),
    };
    match backend.goto_definition(params).await.unwrap() {
        Some(GotoDefinitionResponse::Array(locations)) => locations,
        Some(GotoDefinitionResponse::Scalar(location)) => vec![location],
        Some(GotoDefinitionResponse::Link(_)) => panic!("unexpected location links"),
        None => Vec::new(),
    }
}
