//! Checker session lifecycle.
//!
//! On `initialize` the server starts a supervised background task that
//! builds the checking engine, runs a full-project check and publishes
//! the resulting diagnostics.  The engine slot is written once; requests
//! read it without waiting, so a definition request that arrives while
//! the engine is still starting simply finds nothing.
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::Backend;
use crate::engine::{CheckOutcome, CheckingEngine, EngineError, EngineFactory, EngineOptions};

/// Progress of the most recent check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckState {
    Idle,
    Running,
    Finished { status: i32 },
    Failed(String),
}

impl CheckState {
    pub fn is_running(&self) -> bool {
        matches!(self, CheckState::Running)
    }
}

/// The live checking session owned by the workspace.
pub struct CheckerSession {
    engine: OnceLock<Arc<dyn CheckingEngine>>,
    state: watch::Sender<CheckState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for CheckerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckerSession {
    pub fn new() -> Self {
        let (state, _) = watch::channel(CheckState::Idle);
        Self {
            engine: OnceLock::new(),
            state,
            task: Mutex::new(None),
        }
    }

    /// The engine, once the background worker has created it.
    pub fn engine(&self) -> Option<Arc<dyn CheckingEngine>> {
        self.engine.get().cloned()
    }

    /// Store the engine.  The first engine wins; the returned engine is
    /// the one actually installed.
    pub fn install(&self, engine: Arc<dyn CheckingEngine>) -> Arc<dyn CheckingEngine> {
        let installed = self.engine.get_or_init(|| Arc::clone(&engine));
        if !Arc::ptr_eq(installed, &engine) {
            warn!("Checking session already exists, keeping the first one");
        }
        Arc::clone(installed)
    }

    pub fn state(&self) -> CheckState {
        self.state.borrow().clone()
    }

    /// Mark a check as running unless one already is.  Returns `false`
    /// when a check is in progress.
    fn try_begin(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_running() {
                false
            } else {
                *state = CheckState::Running;
                true
            }
        })
    }

    fn finish(&self, state: CheckState) {
        self.state.send_replace(state);
    }

    /// Wait until no check is running and return the final state.
    pub async fn wait_for_check(&self) -> CheckState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|state| !state.is_running()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Stop the current check.  The engine is asked to cancel its run and
    /// the supervisor is aborted, so nothing is published.
    pub fn abort(&self) {
        if let Some(engine) = self.engine() {
            engine.cancel();
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.state.send_if_modified(|state| {
            if state.is_running() {
                *state = CheckState::Failed("aborted".to_string());
                true
            } else {
                false
            }
        });
    }

    fn set_task(&self, task: JoinHandle<()>) {
        *self.task.lock() = Some(task);
    }
}

/// What the background worker should do before checking.
enum CheckPlan {
    /// Build the engine with these options, install it, then check.
    Create(EngineFactory, EngineOptions),
    /// Re-check with the already installed engine.
    Reuse(Arc<dyn CheckingEngine>),
}

/// Body of the blocking worker.
fn run_check(
    session: &CheckerSession,
    plan: CheckPlan,
    root: PathBuf,
) -> Result<CheckOutcome, EngineError> {
    let engine = match plan {
        CheckPlan::Create(factory, mut options) => {
            options.show_column_numbers = true;
            session.install(factory(&options)?)
        }
        CheckPlan::Reuse(engine) => engine,
    };
    info!("Checking mypy...");
    engine.check(&[root])
}

impl Backend {
    /// Start the initial full-project check.  Returns immediately.
    pub(crate) fn start_initial_check(&self, root: PathBuf, options: EngineOptions) {
        let plan = CheckPlan::Create(Arc::clone(&self.engine_factory), options);
        self.spawn_check(root, plan);
    }

    /// Re-check the project with the existing engine, e.g. after a save.
    pub(crate) fn start_recheck(&self) {
        let Some(engine) = self.session.engine() else {
            info!("No checking session yet, skipping recheck");
            return;
        };
        let Some(root) = self.workspace_root.lock().clone() else {
            return;
        };
        self.spawn_check(root, CheckPlan::Reuse(engine));
    }

    fn spawn_check(&self, root: PathBuf, plan: CheckPlan) {
        if !self.session.try_begin() {
            info!("A mypy check is already running, skipping");
            return;
        }

        let backend = self.clone();
        let task = tokio::spawn(async move {
            let session = Arc::clone(&backend.session);
            let worker_root = root.clone();
            let result =
                tokio::task::spawn_blocking(move || run_check(&session, plan, worker_root)).await;

            let state = match result {
                Ok(Ok(outcome)) => {
                    info!("mypy done, exit code {}", outcome.status);
                    if !outcome.err.is_empty() {
                        info!("mypy stderr:\n{}", outcome.err);
                    }
                    if !outcome.out.is_empty() {
                        info!("mypy stdout:\n{}", outcome.out);
                    }
                    backend.publish_report(&root, &outcome.out).await;
                    CheckState::Finished {
                        status: outcome.status,
                    }
                }
                Ok(Err(e)) => {
                    error!("Error in mypy check: {}", e);
                    CheckState::Failed(e.to_string())
                }
                Err(e) if e.is_panic() => {
                    error!("mypy check panicked: {}", e);
                    CheckState::Failed(format!("panicked: {}", e))
                }
                Err(e) => {
                    warn!("mypy check was cancelled: {}", e);
                    CheckState::Failed(e.to_string())
                }
            };
            backend.session.finish(state);
        });
        self.session.set_task(task);
    }

    /// Wait for the running check (if any) to settle.
    pub async fn wait_for_check(&self) -> CheckState {
        self.session.wait_for_check().await
    }
}
