//! Translation of the checker's textual report into LSP diagnostics.
//!
//! Every report line looks like
//!
//! ```text
//! path/to/file.py:12:4: error: Incompatible return value type
//! path/to/file.py: note: In function "f":
//! ```
//!
//! where the line and column groups are optional.  The checker gives no
//! end position, so every diagnostic is a point range.
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tower_lsp::lsp_types::*;
use tracing::{info, warn};

use crate::Backend;

/// Value of `Diagnostic::source` for everything published here.
pub const DIAGNOSTIC_SOURCE: &str = "mypy";

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]+):(?:(\d+):)?(?:(\d+):)? (\w+): (.*)").expect("report line pattern")
});

/// Parse one report line into its path and diagnostic.
///
/// Returns `None` (and logs) for lines that do not match the report
/// grammar.  Only the severity word `error` maps to an error; every other
/// word becomes a warning.
pub fn parse_line(line: &str) -> Option<(String, Diagnostic)> {
    let Some(caps) = LINE_PATTERN.captures(line) else {
        info!("Skipped unrecognized mypy line: {}", line);
        return None;
    };

    let path = caps[1].to_string();
    let lineno: u32 = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1);
    let offset: u32 = caps
        .get(3)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    let severity = if &caps[4] == "error" {
        DiagnosticSeverity::ERROR
    } else {
        DiagnosticSeverity::WARNING
    };

    let point = Position {
        line: lineno.saturating_sub(1),
        character: offset,
    };

    Some((
        path,
        Diagnostic {
            range: Range {
                start: point,
                end: point,
            },
            severity: Some(severity),
            source: Some(DIAGNOSTIC_SOURCE.to_string()),
            message: caps[5].to_string(),
            ..Diagnostic::default()
        },
    ))
}

/// Parse a whole report, grouping diagnostics by path.
///
/// Paths appear in the order they are first seen; diagnostics keep the
/// order of their report lines.
pub fn parse_report(report: &str) -> Vec<(String, Vec<Diagnostic>)> {
    let mut grouped: Vec<(String, Vec<Diagnostic>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in report.lines() {
        let Some((path, diagnostic)) = parse_line(line) else {
            continue;
        };
        match index.get(&path).copied() {
            Some(i) => grouped[i].1.push(diagnostic),
            None => {
                index.insert(path.clone(), grouped.len());
                grouped.push((path, vec![diagnostic]));
            }
        }
    }

    grouped
}

/// Parse `report` and key the diagnostics by document URI.  Report paths
/// are resolved against `root`; absolute paths are kept as they are.
pub fn diagnostics_by_uri(root: &Path, report: &str) -> Vec<(Url, Vec<Diagnostic>)> {
    parse_report(report)
        .into_iter()
        .filter_map(|(path, diagnostics)| {
            let full = root.join(&path);
            match Url::from_file_path(&full) {
                Ok(uri) => Some((uri, diagnostics)),
                Err(()) => {
                    warn!("Cannot build a URI for {}", full.display());
                    None
                }
            }
        })
        .collect()
}

impl Backend {
    /// Publish a checker report.  Each document receives its complete
    /// diagnostic list; documents that had diagnostics in the previous
    /// publish and have none now are cleared.
    pub(crate) async fn publish_report(&self, root: &Path, report: &str) {
        let fresh = diagnostics_by_uri(root, report);

        let stale: Vec<Url> = {
            let mut published = self.published.lock();
            let stale = published
                .keys()
                .filter(|uri| !fresh.iter().any(|(u, _)| u == *uri))
                .cloned()
                .collect();
            published.clear();
            for (uri, diagnostics) in &fresh {
                published.insert(uri.clone(), diagnostics.clone());
            }
            stale
        };

        let Some(client) = &self.client else {
            return;
        };
        for uri in stale {
            client.publish_diagnostics(uri, Vec::new(), None).await;
        }
        for (uri, diagnostics) in fresh {
            client.publish_diagnostics(uri, diagnostics, None).await;
        }
    }

    /// The diagnostics most recently published for `uri`.
    pub fn get_published_diagnostics(&self, uri: &Url) -> Option<Vec<Diagnostic>> {
        self.published.lock().get(uri).cloned()
    }
}
