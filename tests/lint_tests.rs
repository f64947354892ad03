/// Lint integration tests: static checks over the fixture stories.

use std::path::Path;

use story_engine::core::lint::{lint, LintKind, Severity};
use story_engine::StoryGraph;

#[test]
fn fixture_has_no_errors_or_warnings() {
    let graph = StoryGraph::load(Path::new("tests/fixtures/lantern_keep.json")).unwrap();
    let diagnostics = lint(&graph);
    assert!(
        diagnostics.iter().all(|d| d.severity == Severity::Info),
        "{:?}",
        diagnostics
    );

    let dead_ends: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.kind == LintKind::DeadEnd)
        .filter_map(|d| d.passage.as_deref())
        .collect();
    assert_eq!(dead_ends, ["lamp_room"]);

    let conditions: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.kind == LintKind::UnenforcedCondition)
        .collect();
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].passage.as_deref(), Some("gate"));
}

#[test]
fn ron_fixture_lints_clean() {
    let graph = StoryGraph::load(Path::new("tests/fixtures/lantern_keep.ron")).unwrap();
    assert!(lint(&graph)
        .iter()
        .all(|d| d.severity < Severity::Warning));
}

#[test]
fn broken_story_is_flagged() {
    let graph = StoryGraph::parse_json(
        r#"{
        "variables": { "hp": { "type": "int", "default_value": 3 } },
        "nodes": {
            "start": { "type": "START", "outputs": [ { "target_node_id": "hall" } ] },
            "hall": { "type": "SCENE", "content": { "choices": [
                { "text": "Rest", "condition": "hp <", "target_node_id": "heal" } ] } },
            "heal": { "type": "SET_VAR",
                      "content": { "variable_name": "hp", "operation": "+", "value": "1" },
                      "outputs": [ { "target_node_id": "again" } ] },
            "again": { "type": "SET_VAR",
                       "content": { "variable_name": "rested", "operation": "=", "value": "True" },
                       "outputs": [ { "target_node_id": "heal" } ] },
            "attic": { "type": "SCENE", "content": { "text": "Nobody comes here." } }
        },
        "start_node_id": "start"
    }"#,
    )
    .unwrap();

    let diagnostics = lint(&graph);
    let has = |kind: LintKind, passage: &str| {
        diagnostics
            .iter()
            .any(|d| d.kind == kind && d.passage.as_deref() == Some(passage))
    };

    assert!(has(LintKind::LogicCycle, "again"));
    assert!(has(LintKind::BadExpression, "hall"));
    assert!(has(LintKind::UndeclaredVariable, "again"));
    assert!(has(LintKind::Unreachable, "attic"));
    assert!(!has(LintKind::Unreachable, "heal"));
    assert!(diagnostics.iter().any(|d| d.severity == Severity::Error));
}
