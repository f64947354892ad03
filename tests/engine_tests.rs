/// Engine integration tests: full playthroughs of the fixture stories
/// through the public facade.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use story_engine::core::state::UNKNOWN_LOCATION;
use story_engine::schema::action::NpcStatus;
use story_engine::schema::graph::ProjectError;
use story_engine::schema::value::Value;
use story_engine::{EngineError, Step, StoryEngine, StoryEvent};

const FIXTURE: &str = "tests/fixtures/lantern_keep.json";

fn engine() -> StoryEngine {
    StoryEngine::builder()
        .seed(42)
        .project(FIXTURE)
        .build()
        .unwrap()
}

fn record(engine: &mut StoryEngine) -> Rc<RefCell<Vec<StoryEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    engine.subscribe(move |e| sink.borrow_mut().push(e.clone()));
    events
}

fn scene_id(step: &Step) -> Option<&str> {
    step.passage().map(|p| p.id.as_str())
}

#[test]
fn loads_fixture_metadata() {
    let engine = engine();
    let graph = engine.graph().unwrap();
    assert_eq!(graph.meta.name, "Lantern Keep");
    assert_eq!(graph.meta.version, "1.2.0");
    assert_eq!(graph.meta.resolution, (1920, 1080));
    assert_eq!(graph.passages.len(), 9);
    assert_eq!(graph.assets["wind.ogg"], "audio/wind.ogg");
    assert_eq!(graph.start_passage_id.as_deref(), Some("start"));
}

#[test]
fn paying_the_toll_walkthrough() {
    let mut engine = engine();
    let events = record(&mut engine);

    let step = engine.start().unwrap();
    assert_eq!(scene_id(&step), Some("arrival"));
    assert_eq!(engine.state().item_count("lantern"), 1);
    let keeper = engine.state().npc("keeper").unwrap();
    assert!(keeper.spawned);
    assert_eq!(keeper.location, "arrival");
    assert_eq!(keeper.status, NpcStatus::Fixed);
    {
        let events = events.borrow();
        assert_eq!(events[0], StoryEvent::SoundRequested("wind.ogg".to_string()));
        assert!(matches!(&events[1], StoryEvent::PassageChanged(p) if p.id == "arrival"));
    }

    assert_eq!(scene_id(&engine.select_choice(0).unwrap()), Some("gate"));
    assert_eq!(scene_id(&engine.select_choice(0).unwrap()), Some("courtyard"));

    let state = engine.state();
    assert_eq!(state.variable("coins"), Value::Int(0));
    assert_eq!(state.variable("trust"), Value::Int(2));
    assert_eq!(state.variable("visits"), Value::Int(1));
    assert_eq!(state.variable("lit"), Value::Bool(true));
    assert_eq!(state.npc("keeper").unwrap().status, NpcStatus::Follow);
    assert_eq!(
        state.history(),
        ["start", "arrival", "gate", "pay", "trust_up", "courtyard"]
    );

    assert_eq!(scene_id(&engine.next_dialogue().unwrap()), Some("tower"));
    assert!(!engine.state().inventory().contains_key("lantern"));
    assert_eq!(engine.state().item_count("key"), 2);

    assert_eq!(scene_id(&engine.select_choice(0).unwrap()), Some("lamp_room"));
    assert_eq!(engine.next_dialogue().unwrap(), Step::Ended);
    assert_eq!(events.borrow().last(), Some(&StoryEvent::StoryEnded));
    assert!(events
        .borrow()
        .contains(&StoryEvent::SoundRequested("bell.ogg".to_string())));
}

#[test]
fn sneaking_costs_trust() {
    let mut engine = engine();
    engine.start().unwrap();
    engine.select_choice(0).unwrap();
    let step = engine.select_choice(1).unwrap();
    assert_eq!(scene_id(&step), Some("courtyard"));
    assert_eq!(engine.state().variable("trust"), Value::Int(-1));
    assert_eq!(engine.state().variable("lit"), Value::Bool(false));
    assert_eq!(engine.state().variable("coins"), Value::Int(1));
}

#[test]
fn walking_away_ends_the_story() {
    let mut engine = engine();
    engine.start().unwrap();
    let events = record(&mut engine);
    assert!(engine.select_choice(1).unwrap().is_ended());
    assert_eq!(*events.borrow(), vec![StoryEvent::StoryEnded]);
}

#[test]
fn revisiting_a_scene_reruns_its_actions() {
    let mut engine = engine();
    engine.start().unwrap();
    engine.select_choice(0).unwrap();
    engine.select_choice(0).unwrap();
    engine.next_dialogue().unwrap();
    let step = engine.select_choice(1).unwrap();
    assert_eq!(scene_id(&step), Some("arrival"));
    assert_eq!(engine.state().item_count("lantern"), 1);
    let keeper = engine.state().npc("keeper").unwrap();
    assert_eq!(keeper.status, NpcStatus::Follow);
    assert_eq!(keeper.location, "arrival");
}

#[test]
fn out_of_range_choice_on_scene_with_choices_is_terminal() {
    let mut engine = engine();
    engine.start().unwrap();
    assert!(engine.select_choice(9).unwrap().is_ended());
    assert_eq!(engine.current_passage().map(|p| p.id.as_str()), Some("arrival"));
}

#[test]
fn restart_resets_session() {
    let mut engine = engine();
    engine.start().unwrap();
    engine.select_choice(0).unwrap();
    engine.select_choice(0).unwrap();
    assert_eq!(engine.state().variable("coins"), Value::Int(0));

    let step = engine.start().unwrap();
    assert_eq!(scene_id(&step), Some("arrival"));
    assert_eq!(engine.state().variable("coins"), Value::Int(1));
    assert_eq!(engine.state().history(), ["start", "arrival"]);
    assert_eq!(engine.state().item_count("lantern"), 1);
}

#[test]
fn condition_probe_reads_session() {
    let mut engine = engine();
    engine.start().unwrap();
    engine.select_choice(0).unwrap();
    let gate = engine.current_passage().unwrap().scene().unwrap().clone();
    assert!(engine.evaluate_condition(&gate.choices[0].condition));
    assert!(engine.evaluate_condition(&gate.choices[1].condition));
    assert!(!engine.evaluate_condition("coins >= 2"));
    assert_eq!(
        engine.evaluate_expression("traveler + ' the Bold'"),
        Value::from("Wren the Bold")
    );
}

#[test]
fn ron_fixture_plays() {
    let mut engine = StoryEngine::builder()
        .project("tests/fixtures/lantern_keep.ron")
        .build()
        .unwrap();
    let events = record(&mut engine);
    assert_eq!(scene_id(&engine.start().unwrap()), Some("arrival"));
    let step = engine.select_choice(0).unwrap();
    assert_eq!(scene_id(&step), Some("gate"));
    assert_eq!(engine.state().variable("coins"), Value::Int(0));
    assert_eq!(
        step.passage().unwrap().scene().unwrap().character_id.as_deref(),
        Some("keeper")
    );
    assert_eq!(events.borrow()[0], StoryEvent::SoundRequested("wind.ogg".to_string()));
}

#[test]
fn load_from_temp_files() {
    let mut json = tempfile::NamedTempFile::new().unwrap();
    json.write_all(std::fs::read(FIXTURE).unwrap().as_slice())
        .unwrap();
    let mut engine = StoryEngine::builder().build().unwrap();
    let graph = engine.load(json.path()).unwrap();
    assert_eq!(graph.meta.name, "Lantern Keep");

    let mut ron = tempfile::Builder::new().suffix(".ron").tempfile().unwrap();
    ron.write_all(std::fs::read("tests/fixtures/lantern_keep.ron").unwrap().as_slice())
        .unwrap();
    let graph = engine.load(ron.path()).unwrap();
    assert_eq!(graph.meta.name, "Lantern Keep (short)");
}

#[test]
fn malformed_projects_are_rejected() {
    let cases: &[(&str, fn(&ProjectError) -> bool)] = &[
        ("{ not json", |e| matches!(e, ProjectError::Json(_))),
        (
            r#"{ "nodes": { "a": { "type": "SCENE" } }, "start_node_id": "b" }"#,
            |e| matches!(e, ProjectError::MissingStart(id) if id == "b"),
        ),
        (
            r#"{ "nodes": { "a": { "type": "SCENE", "outputs": [ { "target_node_id": "zz" } ] } } }"#,
            |e| matches!(e, ProjectError::DanglingTarget { target, .. } if target == "zz"),
        ),
        (
            r#"{ "nodes": { "a": { "type": "PORTAL" } } }"#,
            |e| matches!(e, ProjectError::UnknownNodeType { .. }),
        ),
        (
            r#"{ "nodes": { "a": { "id": "b", "type": "SCENE" } } }"#,
            |e| matches!(e, ProjectError::IdMismatch { .. }),
        ),
        (
            r#"{ "nodes": { "a": { "type": "SCENE", "content": { "actions": [ { "type": "ADD_ITEM", "params": {} } ] } } } }"#,
            |e| matches!(e, ProjectError::InvalidAction { index: 0, .. }),
        ),
        (
            r#"{ "variables": { "hp": { "type": "int", "default_value": "lots" } } }"#,
            |e| matches!(e, ProjectError::InvalidDefault { .. }),
        ),
        (
            r#"{ "nodes": { "a": { "type": "SET_VAR", "content": { "variable_name": "x", "operation": "*", "value": "2" } } } }"#,
            |e| matches!(e, ProjectError::UnknownOperation { .. }),
        ),
    ];

    for (doc, expected) in cases {
        let mut engine = StoryEngine::builder().build().unwrap();
        match engine.load_json(doc) {
            Err(EngineError::MalformedProject(e)) => assert!(expected(&e), "{}: got {}", doc, e),
            Err(other) => panic!("{}: unexpected error {}", doc, other),
            Ok(_) => panic!("{}: should not load", doc),
        }
        assert!(engine.graph().is_none());
    }
}

#[test]
fn failed_load_keeps_previous_story() {
    let mut engine = engine();
    engine.start().unwrap();
    assert!(engine.load("tests/fixtures/does_not_exist.json").is_err());
    assert_eq!(engine.graph().unwrap().meta.name, "Lantern Keep");
    assert_eq!(engine.current_passage().map(|p| p.id.as_str()), Some("arrival"));
}

#[test]
fn npc_defaults_before_spawn() {
    let doc = r#"{
        "nodes": {
            "a": { "type": "SCENE", "content": { "actions": [
                { "type": "SET_NPC_STATUS", "params": { "npcId": "ghost", "status": "dead" } }
            ] } }
        },
        "startNodeId": "a"
    }"#;
    let mut engine = StoryEngine::builder().build().unwrap();
    engine.load_json(doc).unwrap();
    engine.start().unwrap();
    let ghost = engine.state().npc("ghost").unwrap();
    assert_eq!(ghost.status, NpcStatus::Dead);
    assert_eq!(ghost.location, UNKNOWN_LOCATION);
    assert!(!ghost.spawned);
}
