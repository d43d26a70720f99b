//! Data types shared by the session manager and the definition resolver.
//!
//! Two coordinate systems meet here.  The editor protocol is zero-based
//! for both line and column; the checking engine reports one-based lines
//! and zero-based columns.  [`EnginePosition`] is the engine side, and the
//! only way to get one from an editor [`Position`] is
//! [`EnginePosition::from_editor`], so every crossing is explicit.
use std::path::PathBuf;

use tower_lsp::lsp_types::Position;

/// A position in engine coordinates: one-based line, zero-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnginePosition {
    pub line: u32,
    pub column: u32,
}

impl EnginePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Convert an editor (zero-based line) position into engine coordinates.
    pub fn from_editor(position: Position) -> Self {
        Self {
            line: position.line + 1,
            column: position.character,
        }
    }

    /// Convert back into a zero-based editor position.
    pub fn to_editor(self) -> Position {
        Position {
            line: self.line.saturating_sub(1),
            character: self.column,
        }
    }
}

/// Start and end of an AST node in engine coordinates.  The end column is
/// exclusive, as the engine reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSpan {
    pub start: EnginePosition,
    pub end: EnginePosition,
}

impl NodeSpan {
    pub fn new(start: EnginePosition, end: EnginePosition) -> Self {
        Self { start, end }
    }
}

/// A declaration the engine knows about (function, class, variable,
/// module ...).
///
/// Line and column are kept signed because the engine uses `-1` for
/// "unknown"; see [`normalize_column`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefinitionNode {
    /// Fully-qualified name, e.g. `pkg.mod.Class.method`.
    pub fullname: String,
    /// Short node-type tag used in logs (`FuncDef`, `TypeInfo`, `MypyFile`).
    pub kind: String,
    pub line: i32,
    pub column: i32,
}

/// The module file that contains the reference being resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosingFile {
    /// Dotted module name (`pkg.mod`).
    pub module: String,
    pub path: PathBuf,
}

/// A plain identifier reference.  The engine attaches the resolved
/// target directly when semantic analysis found one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRef {
    pub name: String,
    pub position: EnginePosition,
    pub target: Option<DefinitionNode>,
}

/// An attribute access such as `a.b`.  The target depends on the inferred
/// type of the base expression, so resolution is delegated back to the
/// engine using `node_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub name: String,
    pub position: EnginePosition,
    /// Engine-assigned identity of the member expression.
    pub node_id: u64,
}

/// A resolved type appearing in inferred-type position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRef {
    pub type_fullname: String,
    pub position: EnginePosition,
    /// The class declaration of the type.
    pub definition: DefinitionNode,
}

/// The three shapes of import statement the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import a.b.c` / `import a.b as c, d`
    Import,
    /// `from .pkg import *`
    ImportAll,
    /// `from pkg import name`
    ImportFrom,
}

/// An import statement.  The engine only knows the span of the whole
/// statement, not the position of each dotted segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportRef {
    pub kind: ImportKind,
    pub span: NodeSpan,
}

/// The node found under the cursor, classified by reference kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceNode {
    Name(NameRef),
    Member(MemberRef),
    Instance(InstanceRef),
    Import(ImportRef),
    /// Any other node kind the engine returned.  Carries the engine's
    /// short type name for logging.
    Unsupported { kind: String },
}

/// Where a symbol is defined: absolute file, one-based line, zero-based
/// column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefiningLocation {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl DefiningLocation {
    /// The zero-based editor position of this location.
    pub fn editor_position(&self) -> Position {
        EnginePosition::new(self.line, self.column).to_editor()
    }
}

/// The engine occasionally reports `-1` for an unknown column.  That and
/// any other negative value become column 0; everything else passes
/// through.
pub fn normalize_column(column: i32) -> u32 {
    u32::try_from(column).unwrap_or(0)
}

/// Engine lines are one-based; an unknown (`-1`) or zero line is pinned to
/// the first line of the file.
pub fn normalize_line(line: i32) -> u32 {
    u32::try_from(line).unwrap_or(0).max(1)
}
