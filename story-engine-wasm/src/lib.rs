//! WASM bindings for story-engine: drives a story from a web front end.
//!
//! Everything crossing the boundary is JSON: the project document going in,
//! and view objects for scenes and session state coming out.

use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

use story_engine::core::state::NpcRecord;
use story_engine::schema::passage::Passage;
use story_engine::schema::value::Value;
use story_engine::{Step, StoryEngine, StoryEvent};

// ---------------------------------------------------------------------------
// JSON view types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct ChoiceView {
    index: usize,
    text: String,
    condition: String,
    /// What `condition` evaluates to now. Blank conditions are `true`.
    available: bool,
}

#[derive(serde::Serialize)]
struct SceneView {
    id: String,
    title: String,
    text: String,
    character_id: Option<String>,
    background_image: Option<String>,
    choices: Vec<ChoiceView>,
    /// Set when the scene has no choices and `next_dialogue` continues.
    has_next: bool,
}

#[derive(serde::Serialize)]
struct StepView {
    ended: bool,
    scene: Option<SceneView>,
    /// Audio clips requested while reaching this step, in order.
    sounds: Vec<String>,
}

#[derive(serde::Serialize)]
struct StateView<'a> {
    current: Option<&'a str>,
    variables: Vec<(&'a String, &'a Value)>,
    inventory: Vec<(&'a String, &'a u32)>,
    npcs: Vec<(&'a String, &'a NpcRecord)>,
    history: &'a [String],
}

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

// ---------------------------------------------------------------------------
// StoryPlayer: the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StoryPlayer {
    engine: StoryEngine,
    sounds: Rc<RefCell<Vec<String>>>,
}

#[wasm_bindgen]
impl StoryPlayer {
    /// Load a project from its JSON document.
    #[wasm_bindgen(constructor)]
    pub fn new(project_json: &str, seed: u64) -> Result<StoryPlayer, JsError> {
        #[cfg(target_arch = "wasm32")]
        tracing_wasm::try_set_as_global_default().ok();

        let mut engine = StoryEngine::builder().seed(seed).build().map_err(js_err)?;
        engine.load_json(project_json).map_err(js_err)?;

        let sounds = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&sounds);
        engine.subscribe(move |event| {
            if let StoryEvent::SoundRequested(clip) = event {
                sink.borrow_mut().push(clip.clone());
            }
        });

        Ok(StoryPlayer { engine, sounds })
    }

    /// Project metadata as JSON.
    pub fn meta(&self) -> Result<String, JsError> {
        let graph = self.engine.graph().ok_or_else(|| js_err("no story loaded"))?;
        serde_json::to_string(&graph.meta).map_err(js_err)
    }

    pub fn start(&mut self) -> Result<String, JsError> {
        let step = self.engine.start().map_err(js_err)?;
        self.step_json(step)
    }

    pub fn select_choice(&mut self, index: usize) -> Result<String, JsError> {
        let step = self.engine.select_choice(index).map_err(js_err)?;
        self.step_json(step)
    }

    pub fn next_dialogue(&mut self) -> Result<String, JsError> {
        let step = self.engine.next_dialogue().map_err(js_err)?;
        self.step_json(step)
    }

    /// Session state (variables, inventory, NPCs, history) as JSON.
    pub fn state_json(&self) -> Result<String, JsError> {
        let state = self.engine.state();
        let mut variables: Vec<_> = state.variables().iter().collect();
        variables.sort_by(|a, b| a.0.cmp(b.0));
        let mut inventory: Vec<_> = state.inventory().iter().collect();
        inventory.sort_by(|a, b| a.0.cmp(b.0));
        let mut npcs: Vec<_> = state.npcs().iter().collect();
        npcs.sort_by(|a, b| a.0.cmp(b.0));

        let view = StateView {
            current: state.current_passage_id(),
            variables,
            inventory,
            npcs,
            history: state.history(),
        };
        serde_json::to_string(&view).map_err(js_err)
    }

    /// Evaluate a condition against the live variables.
    pub fn check(&mut self, condition: &str) -> bool {
        self.engine.evaluate_condition(condition)
    }
}

impl StoryPlayer {
    fn step_json(&mut self, step: Step) -> Result<String, JsError> {
        let sounds = self.sounds.borrow_mut().drain(..).collect();
        let view = StepView {
            ended: step.is_ended(),
            scene: step.passage().map(|p| self.scene_view(p)),
            sounds,
        };
        serde_json::to_string(&view).map_err(js_err)
    }

    fn scene_view(&mut self, passage: &Passage) -> SceneView {
        let mut view = SceneView {
            id: passage.id.clone(),
            title: passage.title.clone(),
            text: String::new(),
            character_id: None,
            background_image: None,
            choices: Vec::new(),
            has_next: false,
        };
        if let Some(scene) = passage.scene() {
            view.text = scene.text.clone();
            view.character_id = scene.character_id.clone();
            view.background_image = scene.background_image.clone();
            view.has_next = scene.choices.is_empty() && passage.default_output.is_some();
            for (index, choice) in scene.choices.iter().enumerate() {
                view.choices.push(ChoiceView {
                    index,
                    text: choice.text.clone(),
                    condition: choice.condition.clone(),
                    available: self.engine.evaluate_condition(&choice.condition),
                });
            }
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORY: &str = r#"{
        "start_node_id": "gate",
        "variables": { "coins": { "type": "int", "default_value": 1 } },
        "nodes": {
            "gate": {
                "type": "SCENE",
                "content": {
                    "text": "A toll gate.",
                    "music": "gate.ogg",
                    "choices": [
                        { "text": "Pay", "condition": "coins >= 1", "target_node_id": "pay" },
                        { "text": "Leave", "target_node_id": null }
                    ]
                }
            },
            "pay": {
                "type": "SET_VAR",
                "content": { "variable_name": "coins", "operation": "-", "value": "1" },
                "outputs": [ { "target_node_id": "road" } ]
            },
            "road": { "type": "SCENE", "content": { "text": "The road." } }
        }
    }"#;

    fn json(result: Result<String, JsError>) -> serde_json::Value {
        match result {
            Ok(s) => serde_json::from_str(&s).unwrap(),
            Err(_) => panic!("player call failed"),
        }
    }

    #[test]
    fn plays_through_json_boundary() {
        let Ok(mut player) = StoryPlayer::new(STORY, 7) else {
            panic!("story failed to load");
        };
        let first = json(player.start());
        assert_eq!(first["scene"]["id"], "gate");
        assert_eq!(first["sounds"][0], "gate.ogg");
        assert_eq!(first["scene"]["choices"][0]["available"], true);

        let next = json(player.select_choice(0));
        assert_eq!(next["scene"]["id"], "road");
        assert!(next["sounds"].as_array().unwrap().is_empty());

        let state = json(player.state_json());
        assert_eq!(state["current"], "road");
        assert_eq!(state["variables"][0][0], "coins");
        assert_eq!(state["variables"][0][1], 0);

        let end = json(player.next_dialogue());
        assert_eq!(end["ended"], true);
    }
}
