/// Import statement resolution.
///
/// The engine represents `import a.b.c, d as e` as one node covering the
/// whole statement.  To learn which module the cursor points at, the
/// statement's text is sliced out of the file, parsed on its own with
/// tree-sitter, and the cursor is rebased onto the slice:
///
/// ```text
/// file:   7 |    import pkg.sub as s      cursor (7, 15)
/// slice:  1 | import pkg.sub as s         cursor (1, 11)  -> "pkg.sub"
/// ```
///
/// Only the first line of the slice is shifted left; later lines keep
/// their columns because the slice contains them whole.
use std::path::Path;

use tracing::{debug, error, warn};
use tree_sitter::{Node, Parser};

use crate::engine::CheckingEngine;
use crate::types::{DefinitionNode, EnclosingFile, EnginePosition, ImportKind, ImportRef, NodeSpan};

/// Cut the text covered by `span` out of `content`.
///
/// Columns count characters.  Lines strictly between the first and the
/// last are copied whole, terminators included.  Returns `None` when the
/// span does not fit the file.
pub fn import_source(content: &str, span: NodeSpan) -> Option<String> {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let first = (span.start.line as usize).checked_sub(1)?;
    let last = (span.end.line as usize).checked_sub(1)?;
    if last < first || last >= lines.len() {
        return None;
    }

    let start_col = span.start.column as usize;
    let end_col = span.end.column as usize;

    if first == last {
        return Some(char_slice(lines[first], start_col, Some(end_col)));
    }

    let mut source = char_slice(lines[first], start_col, None);
    for line in &lines[first + 1..last] {
        source.push_str(line);
    }
    source.push_str(&char_slice(lines[last], 0, Some(end_col)));
    Some(source)
}

fn char_slice(line: &str, start: usize, end: Option<usize>) -> String {
    let chars = line.chars().skip(start);
    match end {
        Some(end) => chars.take(end.saturating_sub(start)).collect(),
        None => chars.collect(),
    }
}

/// Express `position` relative to a slice that starts at `span_start`.
/// The first line of the slice is line 1.
pub fn rebase(position: EnginePosition, span_start: EnginePosition) -> EnginePosition {
    let line = position.line.saturating_sub(span_start.line) + 1;
    let column = if line == 1 {
        position.column.saturating_sub(span_start.column)
    } else {
        position.column
    };
    EnginePosition { line, column }
}

/// Find the dotted module path under `cursor` in a standalone import
/// statement.  `cursor` is relative to `source` (see [`rebase`]).
///
/// `from X import Y` statements are not resolved.
pub fn find_import_module(kind: ImportKind, source: &str, cursor: EnginePosition) -> Option<String> {
    if kind == ImportKind::ImportFrom {
        debug!("Names imported with `from ... import` are not resolved");
        return None;
    }

    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&tree_sitter_python::LANGUAGE.into()) {
        error!("Cannot load the Python grammar: {}", e);
        return None;
    }
    let tree = parser.parse(source, None)?;
    let root = tree.root_node();
    let mut walker = root.walk();
    let statement = root.named_children(&mut walker).next()?;

    match kind {
        ImportKind::Import => plain_import_module(statement, source, cursor),
        ImportKind::ImportAll => wildcard_import_module(statement, source, cursor),
        ImportKind::ImportFrom => None,
    }
}

/// `import a.b.c, d.e as f`
fn plain_import_module(statement: Node, source: &str, cursor: EnginePosition) -> Option<String> {
    if statement.kind() != "import_statement" {
        debug!("Expected an import statement, found {}", statement.kind());
        return None;
    }

    let mut walker = statement.walk();
    for name in statement.children_by_field_name("name", &mut walker) {
        let dotted = match name.kind() {
            "dotted_name" => name,
            "aliased_import" => match name.child_by_field_name("name") {
                Some(dotted) => dotted,
                None => continue,
            },
            _ => continue,
        };
        if let Some(module) = dotted_name_at(dotted, source, cursor) {
            return Some(module);
        }
    }
    None
}

/// `from ..pkg.mod import *`
fn wildcard_import_module(statement: Node, source: &str, cursor: EnginePosition) -> Option<String> {
    if statement.kind() != "import_from_statement" {
        debug!("Expected a from-import statement, found {}", statement.kind());
        return None;
    }

    let module = statement.child_by_field_name("module_name")?;
    let (prefix, dotted) = match module.kind() {
        "relative_import" => {
            let mut prefix = None;
            let mut dotted = None;
            let mut walker = module.walk();
            for child in module.named_children(&mut walker) {
                match child.kind() {
                    "import_prefix" => prefix = Some(child),
                    "dotted_name" => dotted = Some(child),
                    _ => {}
                }
            }
            (prefix, dotted)
        }
        "dotted_name" => (None, Some(module)),
        other => {
            debug!("Unexpected module name node {}", other);
            return None;
        }
    };

    let mut leading_dots = String::new();
    let mut in_leading_dots = false;
    if let Some(prefix) = prefix {
        for dot in leaf_tokens(prefix) {
            let text = dot.utf8_text(source.as_bytes()).ok()?;
            leading_dots.push_str(text);
            if !in_leading_dots {
                in_leading_dots = token_contains(dot, source, text.chars().count(), cursor);
            }
        }
    }

    let dotted = dotted?;
    if in_leading_dots {
        let mut walker = dotted.walk();
        let first = dotted
            .named_children(&mut walker)
            .find(|part| part.kind() == "identifier")?;
        let first = first.utf8_text(source.as_bytes()).ok()?;
        return Some(format!("{}{}", leading_dots, first));
    }

    dotted_name_at(dotted, source, cursor).map(|name| format!("{}{}", leading_dots, name))
}

/// Scan the segments of a dotted name left to right and return the path
/// up to and including the segment under the cursor.
fn dotted_name_at(dotted: Node, source: &str, cursor: EnginePosition) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    let mut walker = dotted.walk();
    for part in dotted.named_children(&mut walker) {
        if part.kind() != "identifier" {
            continue;
        }
        let text = part.utf8_text(source.as_bytes()).ok()?;
        segments.push(text);
        if token_contains(part, source, text.chars().count(), cursor) {
            return Some(segments.join("."));
        }
    }
    None
}

/// A node's own tokens: its children, or the node itself if it is a leaf.
fn leaf_tokens<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    if node.child_count() == 0 {
        return vec![node];
    }
    let mut walker = node.walk();
    node.children(&mut walker).collect()
}

/// Inclusive on both ends, so a cursor just past a segment still hits it.
/// `length` and the cursor count characters.
fn token_contains(token: Node, source: &str, length: usize, cursor: EnginePosition) -> bool {
    if token.start_position().row + 1 != cursor.line as usize {
        return false;
    }
    let column = char_column(token, source);
    let cursor_column = cursor.column as usize;
    column <= cursor_column && cursor_column <= column + length
}

/// Tree-sitter columns count bytes; this counts characters.
fn char_column(node: Node, source: &str) -> usize {
    let start = node.start_byte();
    let Some(before) = source.get(..start) else {
        return node.start_position().column;
    };
    let line_start = before.rfind('\n').map_or(0, |newline| newline + 1);
    before[line_start..].chars().count()
}

/// Turn a relative module path (`..pkg`) into an absolute one, relative to
/// the module that contains the import.  Absolute paths are returned as
/// they are.
pub fn absolute_module(module: &str, enclosing: &EnclosingFile) -> Option<String> {
    let dots = module.chars().take_while(|c| *c == '.').count();
    if dots == 0 {
        return Some(module.to_string());
    }
    let rest = &module[dots..];

    // A package's `__init__` is its own package; a plain module's package
    // is one level up.
    let is_package = enclosing
        .path
        .file_stem()
        .is_some_and(|stem| stem == "__init__");
    let levels = if is_package { dots - 1 } else { dots };

    let mut parts: Vec<&str> = enclosing.module.split('.').collect();
    if levels > parts.len() {
        return None;
    }
    parts.truncate(parts.len() - levels);
    if !rest.is_empty() {
        parts.push(rest);
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("."))
}

/// Resolve the module an import statement refers to at `cursor`.
///
/// The file is read from disk and assumed to match what the engine last
/// analysed.
pub(crate) fn import_definition(
    engine: &dyn CheckingEngine,
    import: &ImportRef,
    enclosing: &EnclosingFile,
    path: &Path,
    cursor: EnginePosition,
) -> Option<DefinitionNode> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return None;
        }
    };

    let Some(source) = import_source(&content, import.span) else {
        warn!(
            "Import span {}:{}-{}:{} is outside {}",
            import.span.start.line,
            import.span.start.column,
            import.span.end.line,
            import.span.end.column,
            path.display()
        );
        return None;
    };

    let relative = rebase(cursor, import.span.start);
    let module = find_import_module(import.kind, &source, relative)?;
    debug!("Import under cursor refers to '{}'", module);

    if let Some(node) = engine.module(&module) {
        return Some(node);
    }
    let absolute = absolute_module(&module, enclosing)?;
    if absolute == module {
        return None;
    }
    debug!("Looking up '{}' as '{}'", module, absolute);
    engine.module(&absolute)
}
