/// Goto-definition resolution.
///
/// Given a document path and a zero-based editor position this module:
///   1. Shifts the line to the engine's one-based numbering.
///   2. Asks the engine for the reference node under the cursor.
///   3. Follows the node to its declaration according to its kind.
///   4. Finds the file that declares it, falling back to the current file.
///   5. Returns a point `Location` in editor coordinates.
///
/// Every failure along the way is logged and ends in "no definition".
use std::path::Path;

use tower_lsp::lsp_types::*;
use tracing::{error, info, warn};

use crate::Backend;
use crate::definition::import::import_definition;
use crate::engine::CheckingEngine;
use crate::types::*;

/// Resolve the symbol at `position` in `path` to its declaration.
pub fn find_definition(
    engine: &dyn CheckingEngine,
    path: &Path,
    position: Position,
) -> Option<DefiningLocation> {
    let cursor = EnginePosition::from_editor(position);

    let Some((node, enclosing)) = engine.find_reference(path, cursor) else {
        info!("No name expression at this location");
        return None;
    };

    let target = match &node {
        ReferenceNode::Name(name) => {
            info!(
                "Find definition of '{}' ({}:{})",
                name.name,
                name.position.line,
                name.position.column + 1
            );
            name.target.clone()
        }
        ReferenceNode::Instance(instance) => {
            info!(
                "Find definition of '{}' at ({}:{})",
                instance.type_fullname,
                instance.position.line,
                instance.position.column + 1
            );
            Some(instance.definition.clone())
        }
        ReferenceNode::Member(member) => {
            info!(
                "Find definition of '{}' ({}:{})",
                member.name,
                member.position.line,
                member.position.column + 1
            );
            engine.member_definition(member)
        }
        ReferenceNode::Import(import) => {
            info!(
                "Find definition of import ({}:{})",
                import.span.start.line,
                import.span.start.column + 1
            );
            import_definition(engine, import, &enclosing, path, cursor)
        }
        ReferenceNode::Unsupported { kind } => {
            error!("Unknown expression: {}", kind);
            None
        }
    };

    let Some(target) = target else {
        info!("Definition not found");
        return None;
    };

    let file = match engine.containing_file(&target, &enclosing) {
        Some(file) => file,
        None => {
            info!("Could not find file name, guessing symbol is defined in same file.");
            path.to_path_buf()
        }
    };

    let line = normalize_line(target.line);
    let column = normalize_column(target.column);
    info!(
        "Definition at {}:{}:{} ({})",
        file.display(),
        line,
        column,
        target.kind
    );

    Some(DefiningLocation {
        path: file,
        line,
        column,
    })
}

impl Backend {
    /// Handle a "go to definition" request.
    ///
    /// Returns `None` when the checking session does not exist yet or the
    /// symbol cannot be resolved.
    pub(crate) fn resolve_definition(&self, uri: &Url, position: Position) -> Option<Location> {
        let Some(engine) = self.session.engine() else {
            info!("Checking session is not ready yet, no definition for {}", uri);
            return None;
        };

        let Ok(path) = uri.to_file_path() else {
            warn!("Not a file URI: {}", uri);
            return None;
        };

        let found = find_definition(engine.as_ref(), &path, position)?;

        let Ok(target_uri) = Url::from_file_path(&found.path) else {
            warn!("Cannot build a URI for {}", found.path.display());
            return None;
        };
        let point = found.editor_position();
        Some(Location {
            uri: target_uri,
            range: Range {
                start: point,
                end: point,
            },
        })
    }
}
