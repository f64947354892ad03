//! Flow controller: traversal of the story graph against a session.
//!
//! The machine has no state of its own beyond the session's current
//! passage. Each passage kind has one step function deciding the next
//! passage id; [`FlowController::advance`] composes them, chaining through
//! non-visual passages (`Start`, `SetVar`) until it reaches a scene or a
//! passage with nowhere to go.

use thiserror::Error;

use crate::core::state::{NpcPatch, SessionState};
use crate::schema::action::Action;
use crate::schema::graph::StoryGraph;
use crate::schema::passage::{Assignment, Passage, PassageBody, PassageId, SceneContent};
use crate::script::{apply_operation, Evaluator};

/// Default bound on consecutive non-visual passages in one advance.
pub const DEFAULT_MAX_CHAIN_STEPS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    /// Chaining visited more logic passages than allowed without reaching
    /// a scene. Almost always a cycle made only of logic passages.
    #[error("no scene reached after {steps} logic passages (last: '{passage}'); the story has a logic-only cycle")]
    CycleDetected { passage: PassageId, steps: usize },
}

/// Drives one session through one graph. Borrowed per call, so the graph
/// stays read-only and the session is mutated only from here.
pub struct FlowController<'g, 's> {
    graph: &'g StoryGraph,
    state: &'s mut SessionState,
    evaluator: &'s mut Evaluator,
    max_chain_steps: usize,
}

impl<'g, 's> FlowController<'g, 's> {
    pub fn new(
        graph: &'g StoryGraph,
        state: &'s mut SessionState,
        evaluator: &'s mut Evaluator,
    ) -> Self {
        Self {
            graph,
            state,
            evaluator,
            max_chain_steps: DEFAULT_MAX_CHAIN_STEPS,
        }
    }

    pub fn with_max_chain_steps(mut self, steps: usize) -> Self {
        self.max_chain_steps = steps;
        self
    }

    /// Resolve the first scene from the session's current (start) passage.
    /// The session must already be initialized. Returns `Ok(None)` when the
    /// story ends before any scene.
    pub fn enter_start(&mut self) -> Result<Option<&'g Passage>, FlowError> {
        let graph = self.graph;
        let Some(id) = self.state.current_passage_id().map(str::to_string) else {
            tracing::info!("story has no start passage");
            return Ok(None);
        };
        self.state.push_history(id.clone());

        let Some(passage) = graph.passage(&id) else {
            tracing::warn!(passage = %id, "start passage not found");
            return Ok(None);
        };
        match &passage.body {
            PassageBody::Scene(scene) => {
                self.run_actions(scene);
                Ok(Some(passage))
            }
            PassageBody::Start | PassageBody::SetVar(_) => self.advance(None),
        }
    }

    /// Move the session forward.
    ///
    /// From a scene, a valid `choice` follows that choice; otherwise a scene
    /// without choices follows its default output, and a scene with choices
    /// stays terminal. From a logic passage the assignment runs first and the
    /// default output is followed. Entering a scene runs its actions once,
    /// in order. Entering a logic passage continues automatically.
    ///
    /// `Ok(None)` is the end of the story. Missing passages end the story
    /// rather than erroring. A chain longer than the configured bound is
    /// reported as [`FlowError::CycleDetected`].
    pub fn advance(&mut self, choice: Option<usize>) -> Result<Option<&'g Passage>, FlowError> {
        let graph = self.graph;
        let mut choice = choice;
        let mut chained = 0usize;

        loop {
            let Some(current_id) = self.state.current_passage_id() else {
                return Ok(None);
            };
            let Some(current) = graph.passage(current_id) else {
                tracing::warn!(passage = current_id, "current passage not found");
                return Ok(None);
            };

            let next_id = match &current.body {
                PassageBody::Scene(scene) => self.step_scene(current, scene, choice.take()),
                PassageBody::SetVar(assignment) => self.step_logic(current, assignment.as_ref()),
                PassageBody::Start => current.default_output.clone(),
            };
            let Some(next_id) = next_id else {
                tracing::debug!(from = %current.id, "no outgoing transition");
                return Ok(None);
            };

            tracing::debug!(from = %current.id, to = %next_id, "transition");
            self.state.set_current_passage(next_id.clone());
            self.state.push_history(next_id.clone());

            let Some(next) = graph.passage(&next_id) else {
                tracing::warn!(passage = %next_id, "transition to unknown passage");
                return Ok(None);
            };

            match &next.body {
                PassageBody::Scene(scene) => {
                    self.run_actions(scene);
                    return Ok(Some(next));
                }
                PassageBody::Start | PassageBody::SetVar(_) => {
                    chained += 1;
                    if chained > self.max_chain_steps {
                        tracing::error!(passage = %next_id, steps = chained, "logic chain exceeded bound");
                        return Err(FlowError::CycleDetected {
                            passage: next_id,
                            steps: chained,
                        });
                    }
                }
            }
        }
    }

    fn step_scene(
        &self,
        current: &Passage,
        scene: &SceneContent,
        choice: Option<usize>,
    ) -> Option<PassageId> {
        if let Some(index) = choice {
            if let Some(picked) = scene.choices.get(index) {
                tracing::debug!(passage = %current.id, index, text = %picked.text, "choice selected");
                return picked.target.clone();
            }
            tracing::debug!(passage = %current.id, index, "choice index out of range");
        }
        if scene.choices.is_empty() {
            return current.default_output.clone();
        }
        None
    }

    fn step_logic(&mut self, current: &Passage, assignment: Option<&Assignment>) -> Option<PassageId> {
        if let Some(assignment) = assignment {
            self.apply_assignment(assignment);
        }
        current.default_output.clone()
    }

    /// `current` is read first, then the expression is evaluated. When the
    /// variable holds an int, the result is coerced to int if possible.
    /// An update that cannot be applied leaves the variable unchanged.
    fn apply_assignment(&mut self, assignment: &Assignment) {
        let name = assignment.variable.as_str();
        let current = self.state.variable(name);
        let mut target = self
            .evaluator
            .evaluate_expression(&assignment.value_expression, self.state.variables());
        if current.is_int() {
            if let Some(i) = target.coerce_int() {
                target = i.into();
            }
        }

        match apply_operation(assignment.operation, &current, target) {
            Ok(result) => self.state.set_variable(name, result),
            Err(e) => {
                tracing::warn!(
                    variable = name,
                    operation = assignment.operation.symbol(),
                    error = %e,
                    "assignment skipped"
                );
            }
        }
    }

    fn run_actions(&mut self, scene: &SceneContent) {
        for action in &scene.actions {
            tracing::debug!(action = action.kind_name(), "running action");
            match action {
                Action::AddItem { item_id, qty } => self.state.add_item(item_id, *qty),
                Action::RemoveItem { item_id, qty } => self.state.remove_item(item_id, *qty),
                Action::SpawnNpc { npc_id } => {
                    let location = self.state.current_passage_id().map(str::to_string);
                    self.state.update_npc(
                        npc_id,
                        NpcPatch {
                            spawned: Some(true),
                            location,
                            ..NpcPatch::default()
                        },
                    );
                }
                Action::SetNpcStatus { npc_id, status } => self.state.update_npc(
                    npc_id,
                    NpcPatch {
                        status: Some(*status),
                        ..NpcPatch::default()
                    },
                ),
                Action::RunScript { script } => {
                    self.evaluator.execute_script(script, self.state.variables_mut());
                }
                // Presentation cues are emitted by the engine.
                Action::PlaySound { .. } | Action::Unknown { .. } => {}
            }
        }
    }
}
