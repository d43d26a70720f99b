mod common;

use std::sync::Arc;

use common::*;
use mypyls::definition::find_definition;
use mypyls::types::*;
use tower_lsp::lsp_types::*;

// ─── Coordinate Tests ───────────────────────────────────────────────────────

#[test]
fn test_editor_line_round_trip() {
    for line in [0u32, 1, 2, 41, 10_000] {
        let engine = EnginePosition::from_editor(Position { line, character: 3 });
        assert_eq!(engine.line, line + 1);
        assert_eq!(engine.column, 3);
        assert_eq!(engine.to_editor(), Position { line, character: 3 });
    }
}

#[test]
fn test_unknown_column_normalizes_to_zero() {
    assert_eq!(normalize_column(-1), 0);
    assert_eq!(normalize_column(0), 0);
    assert_eq!(normalize_column(17), 17);
}

#[test]
fn test_unknown_line_pins_to_first_line() {
    assert_eq!(normalize_line(-1), 1);
    assert_eq!(normalize_line(0), 1);
    assert_eq!(normalize_line(12), 12);
}

#[test]
fn test_defining_location_editor_position() {
    let location = DefiningLocation {
        path: "/src/app.py".into(),
        line: 10,
        column: 4,
    };
    assert_eq!(
        location.editor_position(),
        Position {
            line: 9,
            character: 4
        }
    );
}

// ─── Resolver Tests ─────────────────────────────────────────────────────────

fn name_ref(name: &str, line: u32, column: u32, target: Option<DefinitionNode>) -> ReferenceNode {
    ReferenceNode::Name(NameRef {
        name: name.to_string(),
        position: pos(line, column),
        target,
    })
}

#[test]
fn test_plain_name_resolves_to_declaration() {
    let dir = create_workspace(&[("app.py", ""), ("lib.py", "")]);
    let app = dir.path().join("app.py");
    let lib = dir.path().join("lib.py");

    let engine = FakeEngine::new()
        .reference(
            &app,
            span((5, 4), (5, 10)),
            name_ref("helper", 5, 4, Some(definition("lib.helper", "FuncDef", 3, 0))),
            enclosing("app", &app),
        )
        .file("lib.helper", &lib);

    // Editor line 4 is engine line 5.
    for character in 4..10 {
        let found = find_definition(&engine, &app, Position { line: 4, character })
            .expect("cursor inside the name should resolve");
        assert_eq!(found.path, lib);
        assert_eq!(found.line, 3);
        assert_eq!(found.column, 0);
    }
}

#[test]
fn test_position_outside_any_reference_is_empty() {
    let dir = create_workspace(&[("app.py", "")]);
    let app = dir.path().join("app.py");

    let engine = FakeEngine::new().reference(
        &app,
        span((5, 4), (5, 10)),
        name_ref("helper", 5, 4, Some(definition("app.helper", "FuncDef", 1, 0))),
        enclosing("app", &app),
    );

    assert!(find_definition(&engine, &app, Position { line: 4, character: 12 }).is_none());
    assert!(find_definition(&engine, &app, Position { line: 5, character: 5 }).is_none());
}

#[test]
fn test_name_without_target_is_empty() {
    let dir = create_workspace(&[("app.py", "")]);
    let app = dir.path().join("app.py");

    let engine = FakeEngine::new().reference(
        &app,
        span((1, 0), (1, 7)),
        name_ref("unknown", 1, 0, None),
        enclosing("app", &app),
    );

    assert!(find_definition(&engine, &app, Position { line: 0, character: 2 }).is_none());
}

#[test]
fn test_missing_file_guesses_same_file() {
    let dir = create_workspace(&[("app.py", "")]);
    let app = dir.path().join("app.py");

    let engine = FakeEngine::new().reference(
        &app,
        span((8, 0), (8, 5)),
        name_ref("local", 8, 0, Some(definition("app.local", "Var", 2, -1))),
        enclosing("app", &app),
    );

    let found = find_definition(&engine, &app, Position { line: 7, character: 1 }).unwrap();
    assert_eq!(found.path, app);
    assert_eq!(found.line, 2);
    assert_eq!(found.column, 0, "column -1 should become 0");
}

#[test]
fn test_type_instance_resolves_to_class_declaration() {
    let dir = create_workspace(&[("app.py", ""), ("models.py", "")]);
    let app = dir.path().join("app.py");
    let models = dir.path().join("models.py");

    let engine = FakeEngine::new()
        .reference(
            &app,
            span((3, 10), (3, 14)),
            ReferenceNode::Instance(InstanceRef {
                type_fullname: "models.User".to_string(),
                position: pos(3, 10),
                definition: definition("models.User", "ClassDef", 12, 0),
            }),
            enclosing("app", &app),
        )
        .file("models.User", &models);

    let found = find_definition(&engine, &app, Position { line: 2, character: 11 }).unwrap();
    assert_eq!(found.path, models);
    assert_eq!(found.line, 12);
}

#[test]
fn test_member_access_uses_engine_lookup() {
    let dir = create_workspace(&[("app.py", ""), ("models.py", "")]);
    let app = dir.path().join("app.py");
    let models = dir.path().join("models.py");

    let engine = FakeEngine::new()
        .reference(
            &app,
            span((6, 9), (6, 13)),
            ReferenceNode::Member(MemberRef {
                name: "save".to_string(),
                position: pos(6, 9),
                node_id: 42,
            }),
            enclosing("app", &app),
        )
        .member(42, definition("models.User.save", "FuncDef", 20, 4))
        .file("models.User.save", &models);

    let found = find_definition(&engine, &app, Position { line: 5, character: 10 }).unwrap();
    assert_eq!(found.path, models);
    assert_eq!(found.line, 20);
    assert_eq!(found.column, 4);
}

#[test]
fn test_unresolved_member_is_empty() {
    let dir = create_workspace(&[("app.py", "")]);
    let app = dir.path().join("app.py");

    let engine = FakeEngine::new().reference(
        &app,
        span((6, 9), (6, 13)),
        ReferenceNode::Member(MemberRef {
            name: "nope".to_string(),
            position: pos(6, 9),
            node_id: 7,
        }),
        enclosing("app", &app),
    );

    assert!(find_definition(&engine, &app, Position { line: 5, character: 10 }).is_none());
}

#[test]
fn test_unsupported_node_kind_is_empty() {
    let dir = create_workspace(&[("app.py", "")]);
    let app = dir.path().join("app.py");

    let engine = FakeEngine::new().reference(
        &app,
        span((1, 0), (1, 3)),
        ReferenceNode::Unsupported {
            kind: "IntExpr".to_string(),
        },
        enclosing("app", &app),
    );

    assert!(find_definition(&engine, &app, Position { line: 0, character: 1 }).is_none());
}

#[test]
fn test_import_resolves_module_file() {
    let content = "import os\nimport pkg.sub as s, other\n";
    let dir = create_workspace(&[("app.py", content), ("pkg/sub.py", "x = 1\n")]);
    let app = dir.path().join("app.py");
    let sub = dir.path().join("pkg/sub.py");

    let engine = FakeEngine::new()
        .reference(
            &app,
            span((2, 0), (2, 26)),
            ReferenceNode::Import(ImportRef {
                kind: ImportKind::Import,
                span: span((2, 0), (2, 26)),
            }),
            enclosing("app", &app),
        )
        .module(definition("pkg", "MypyFile", -1, -1))
        .module(definition("pkg.sub", "MypyFile", -1, -1))
        .file("pkg.sub", &sub);

    // Cursor on `sub`.
    let found = find_definition(&engine, &app, Position { line: 1, character: 12 }).unwrap();
    assert_eq!(found.path, sub);
    assert_eq!(found.line, 1);
    assert_eq!(found.column, 0);

    // Cursor on the alias: nothing.
    assert!(find_definition(&engine, &app, Position { line: 1, character: 18 }).is_none());
}

#[test]
fn test_relative_wildcard_import_resolves_against_enclosing_module() {
    let content = "from ..models import *\n";
    let dir = create_workspace(&[("app/views/main.py", content), ("app/models.py", "")]);
    let main = dir.path().join("app/views/main.py");
    let models = dir.path().join("app/models.py");

    let engine = FakeEngine::new()
        .reference(
            &main,
            span((1, 0), (1, 22)),
            ReferenceNode::Import(ImportRef {
                kind: ImportKind::ImportAll,
                span: span((1, 0), (1, 22)),
            }),
            enclosing("app.views.main", &main),
        )
        .module(definition("app.models", "MypyFile", 1, 0))
        .file("app.models", &models);

    let found = find_definition(&engine, &main, Position { line: 0, character: 9 }).unwrap();
    assert_eq!(found.path, models);
}

#[test]
fn test_from_import_name_is_not_resolved() {
    let content = "from pkg import thing\n";
    let dir = create_workspace(&[("app.py", content)]);
    let app = dir.path().join("app.py");

    let engine = FakeEngine::new()
        .reference(
            &app,
            span((1, 0), (1, 21)),
            ReferenceNode::Import(ImportRef {
                kind: ImportKind::ImportFrom,
                span: span((1, 0), (1, 21)),
            }),
            enclosing("app", &app),
        )
        .module(definition("pkg", "MypyFile", 1, 0));

    assert!(find_definition(&engine, &app, Position { line: 0, character: 6 }).is_none());
    assert!(find_definition(&engine, &app, Position { line: 0, character: 17 }).is_none());
}

// ─── Request Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_goto_definition_returns_point_location() {
    let dir = create_workspace(&[("app.py", ""), ("lib.py", "")]);
    let app = dir.path().join("app.py");
    let lib = dir.path().join("lib.py");

    let engine = FakeEngine::new()
        .reference(
            &app,
            span((2, 0), (2, 6)),
            name_ref("helper", 2, 0, Some(definition("lib.helper", "FuncDef", 7, 4))),
            enclosing("app", &app),
        )
        .file("lib.helper", &lib);
    let backend = backend_with(Arc::new(engine));

    initialize(&backend, dir.path()).await;
    backend.wait_for_check().await;

    let locations = definition_at(&backend, &app, 1, 3).await;
    assert_eq!(locations.len(), 1);
    let location = &locations[0];
    assert_eq!(location.uri, Url::from_file_path(&lib).unwrap());
    assert_eq!(
        location.range.start,
        Position {
            line: 6,
            character: 4
        }
    );
    assert_eq!(location.range.start, location.range.end);
}

#[tokio::test]
async fn test_goto_definition_before_session_exists_is_empty() {
    let dir = create_workspace(&[("app.py", "")]);
    let app = dir.path().join("app.py");

    let engine = FakeEngine::new().reference(
        &app,
        span((1, 0), (1, 6)),
        name_ref("helper", 1, 0, Some(definition("app.helper", "FuncDef", 3, 0))),
        enclosing("app", &app),
    );
    let backend = backend_with(Arc::new(engine));

    // No initialize: the engine was never created.
    assert!(backend.session().engine().is_none());
    assert!(definition_at(&backend, &app, 0, 2).await.is_empty());
}

#[tokio::test]
async fn test_goto_definition_miss_is_empty_list() {
    let dir = create_workspace(&[("app.py", "")]);
    let app = dir.path().join("app.py");
    let backend = backend_with(Arc::new(FakeEngine::new()));

    initialize(&backend, dir.path()).await;
    backend.wait_for_check().await;

    assert!(definition_at(&backend, &app, 0, 0).await.is_empty());
}
