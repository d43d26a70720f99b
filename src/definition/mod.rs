/// Go-to-definition support.
///
/// A definition request is answered in two passes:
///
///   1. The checking engine is asked for the reference node under the
///      cursor.  The node is one of four kinds (plain name, member access,
///      type instance, import statement) and each kind has its own way of
///      reaching the declaration it refers to.
///   2. Import statements are a special case: the engine only knows the
///      span of the whole statement, so the statement's source text is cut
///      out of the file and re-parsed locally to find which dotted module
///      segment the cursor sits on.
///
/// - [`resolve`]: request entry point, reference-kind dispatch, file and
///   column fix-ups, conversion back to editor coordinates.
/// - [`import`]: statement slicing, cursor rebasing, and the import
///   statement walk.
pub mod import;
pub mod resolve;

pub use import::{absolute_module, find_import_module, import_source, rebase};
pub use resolve::find_definition;
