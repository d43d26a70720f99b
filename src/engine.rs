//! The incremental checking engine seam.
//!
//! The engine is a long-lived analysis service: it type-checks the
//! project, keeps its module table and cross-file symbol graph in memory,
//! and answers position-based queries against them.  Everything this
//! crate needs from it is expressed by [`CheckingEngine`].
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::types::{DefinitionNode, EnclosingFile, EnginePosition, MemberRef, ReferenceNode};

/// Status file the engine uses when none is configured.
pub const DEFAULT_STATUS_FILE: &str = ".dmypy.json";

/// Failures reported by an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine crashed or refused to run, as opposed to finishing a
    /// check that found errors.
    #[error("engine tried to exit with status {0}")]
    Exited(i32),

    #[error("engine process was terminated by a signal")]
    Terminated,

    #[error("engine failed: {0}")]
    Failed(String),

    #[error("no checking engine is available")]
    Unavailable,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result of a full-project check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Engine exit status (0 clean, 1 type errors, 2 crash).
    pub status: i32,
    /// The human-readable diagnostic report.
    pub out: String,
    pub err: String,
}

/// Settings used to construct an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Project root; process-backed engines run from here.
    pub root: PathBuf,
    pub show_column_numbers: bool,
    pub status_file: PathBuf,
    /// Executable for process-backed engines.
    pub executable: String,
    /// Extra checker flags passed through verbatim.
    pub flags: Vec<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            show_column_numbers: true,
            status_file: PathBuf::from(DEFAULT_STATUS_FILE),
            executable: "dmypy".to_string(),
            flags: Vec::new(),
        }
    }
}

/// Query and check surface of the checking engine.
///
/// Implementations must be safe to query from several request handlers
/// while a check runs on the background worker.
pub trait CheckingEngine: Send + Sync {
    /// Find the reference node at `position` in `path`, together with the
    /// module file that encloses it.
    fn find_reference(
        &self,
        path: &Path,
        position: EnginePosition,
    ) -> Option<(ReferenceNode, EnclosingFile)>;

    /// Resolve an attribute access using the whole-program inferred type
    /// table.
    fn member_definition(&self, member: &MemberRef) -> Option<DefinitionNode>;

    /// The file that contains `definition`; `enclosing` is the file the
    /// reference was found in.
    fn containing_file(
        &self,
        definition: &DefinitionNode,
        enclosing: &EnclosingFile,
    ) -> Option<PathBuf>;

    /// Run a full check of `roots`.  Blocking; may run for a long time.
    fn check(&self, roots: &[PathBuf]) -> Result<CheckOutcome, EngineError>;

    /// Look a dotted module name up in the module table.
    fn module(&self, name: &str) -> Option<DefinitionNode>;

    /// Stop a running [`check`](Self::check) as soon as possible.
    fn cancel(&self) {}
}

/// Builds an engine from options.  Called on the background worker.
pub type EngineFactory =
    Arc<dyn Fn(&EngineOptions) -> Result<Arc<dyn CheckingEngine>, EngineError> + Send + Sync>;

/// A factory that always hands out the same engine.
pub fn shared_engine(engine: Arc<dyn CheckingEngine>) -> EngineFactory {
    Arc::new(
        move |_options: &EngineOptions| -> Result<Arc<dyn CheckingEngine>, EngineError> {
            Ok(Arc::clone(&engine))
        },
    )
}

/// A factory that never produces an engine.
pub fn unavailable_engine() -> EngineFactory {
    Arc::new(
        |_options: &EngineOptions| -> Result<Arc<dyn CheckingEngine>, EngineError> {
            Err(EngineError::Unavailable)
        },
    )
}
