//! Process-backed engine driving the external `dmypy` daemon client.
//!
//! The daemon keeps the fine-grained incremental state between runs, so
//! repeated checks only re-analyse what changed.  It is started with
//! `--export-types`, which lets `dmypy inspect --show definition` answer
//! definition queries against the same state.  Inspect takes one-based
//! columns on both sides; the conversion happens here.
//!
//! Every call blocks on a child process and must run on a blocking
//! worker thread, never on a runtime worker.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::LazyLock;

use parking_lot::Mutex;
use regex::Regex;
use tokio::process::Command;
use tokio::runtime::{Builder, Handle};
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::engine::{CheckOutcome, CheckingEngine, EngineError, EngineOptions};
use crate::types::{
    DefinitionNode, EnclosingFile, EnginePosition, MemberRef, NameRef, ReferenceNode,
};

/// Exit status of a client or daemon failure.
pub const CRASH_STATUS: i32 = 2;

/// `path:line:column:name`, several joined by `, ` when a name has more
/// than one definition.  Only the first is used.
static DEFINITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?):(-?\d+):(-?\d+):([^\s,]+)").expect("definition pattern is valid")
});

/// One definition reported by `dmypy inspect`, in engine coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectedDefinition {
    pub path: PathBuf,
    pub line: i32,
    /// Zero-based.
    pub column: i32,
    pub name: String,
}

pub struct DmypyEngine {
    options: EngineOptions,
    /// Files of the definitions handed out by `find_reference`.
    locations: Mutex<HashMap<DefinitionNode, PathBuf>>,
    cancel: Notify,
}

impl DmypyEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            locations: Mutex::new(HashMap::new()),
            cancel: Notify::new(),
        }
    }

    /// Arguments passed to the daemon client for a check of `roots`.
    pub fn check_args(&self, roots: &[PathBuf]) -> Vec<String> {
        let mut args = vec![
            "--status-file".to_string(),
            self.options.status_file.display().to_string(),
            "run".to_string(),
            "--export-types".to_string(),
            "--".to_string(),
        ];
        if self.options.show_column_numbers {
            args.push("--show-column-numbers".to_string());
        }
        args.extend(self.options.flags.iter().cloned());
        args.extend(roots.iter().map(|root| root.display().to_string()));
        args
    }

    /// Arguments asking the daemon for the definition of the innermost
    /// expression at `position`.
    pub fn inspect_args(&self, path: &Path, position: EnginePosition) -> Vec<String> {
        vec![
            "--status-file".to_string(),
            self.options.status_file.display().to_string(),
            "inspect".to_string(),
            "--show".to_string(),
            "definition".to_string(),
            "--limit".to_string(),
            "1".to_string(),
            format!(
                "{}:{}:{}",
                path.display(),
                position.line,
                position.column + 1
            ),
        ]
    }

    fn run(&self, args: &[String]) -> Result<Output, EngineError> {
        debug!("Running {} {}", self.options.executable, args.join(" "));
        match Handle::try_current() {
            Ok(handle) => handle.block_on(self.output(args)),
            Err(_) => Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(self.output(args)),
        }
    }

    /// Run the client to completion.  The child is killed if the run is
    /// cancelled.
    async fn output(&self, args: &[String]) -> Result<Output, EngineError> {
        let child = Command::new(&self.options.executable)
            .args(args)
            .current_dir(&self.options.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        tokio::select! {
            output = child.wait_with_output() => Ok(output?),
            _ = self.cancel.notified() => {
                info!("Killing {}", self.options.executable);
                Err(EngineError::Failed("cancelled".to_string()))
            }
        }
    }
}

/// Turn a finished client run into a check outcome.  Type errors exit
/// with 1 and a report; a crash exits with [`CRASH_STATUS`] and says
/// nothing on stdout.
pub fn check_outcome(status: i32, out: String, err: String) -> Result<CheckOutcome, EngineError> {
    if status == CRASH_STATUS && out.trim().is_empty() {
        error!("dmypy failed:\n{}", err);
        return Err(EngineError::Exited(status));
    }
    Ok(CheckOutcome { status, out, err })
}

/// Parse the output of `dmypy inspect --show definition`.  Relative
/// paths are resolved against `root`.
pub fn parse_definition(out: &str, root: &Path) -> Option<InspectedDefinition> {
    let line = out.lines().map(str::trim).find(|line| !line.is_empty())?;
    let caps = DEFINITION_RE.captures(line)?;
    let column: i32 = caps[3].parse().ok()?;
    Some(InspectedDefinition {
        path: root.join(&caps[1]),
        line: caps[2].parse().ok()?,
        column: column - 1,
        name: caps[4].to_string(),
    })
}

impl CheckingEngine for DmypyEngine {
    fn find_reference(
        &self,
        path: &Path,
        position: EnginePosition,
    ) -> Option<(ReferenceNode, EnclosingFile)> {
        let output = match self.run(&self.inspect_args(path, position)) {
            Ok(output) => output,
            Err(e) => {
                error!("dmypy inspect failed: {}", e);
                return None;
            }
        };
        let out = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            info!(
                "dmypy inspect: {} {}",
                out.trim(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }

        let Some(found) = parse_definition(&out, &self.options.root) else {
            info!("Unexpected dmypy inspect output: {}", out.trim());
            return None;
        };
        let target = DefinitionNode {
            fullname: found.name.clone(),
            kind: "Definition".to_string(),
            line: found.line,
            column: found.column,
        };
        self.locations.lock().insert(target.clone(), found.path);

        let enclosing = EnclosingFile {
            module: path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_path_buf(),
        };
        let name = NameRef {
            name: found.name,
            position,
            target: Some(target),
        };
        Some((ReferenceNode::Name(name), enclosing))
    }

    fn member_definition(&self, _member: &MemberRef) -> Option<DefinitionNode> {
        None
    }

    fn containing_file(
        &self,
        definition: &DefinitionNode,
        _enclosing: &EnclosingFile,
    ) -> Option<PathBuf> {
        self.locations.lock().get(definition).cloned()
    }

    fn check(&self, roots: &[PathBuf]) -> Result<CheckOutcome, EngineError> {
        let output = self.run(&self.check_args(roots))?;
        let status = output.status.code().ok_or(EngineError::Terminated)?;
        check_outcome(
            status,
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        )
    }

    fn module(&self, _name: &str) -> Option<DefinitionNode> {
        None
    }

    fn cancel(&self) {
        self.cancel.notify_waiters();
    }
}
