//! The engine facade: owns the loaded story, the session and the evaluator,
//! and reports every outcome both as a returned [`Step`] and as
//! [`StoryEvent`]s to registered listeners.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::flow::{FlowController, FlowError, DEFAULT_MAX_CHAIN_STEPS};
use crate::core::state::SessionState;
use crate::schema::action::Action;
use crate::schema::graph::{ProjectError, StoryGraph};
use crate::schema::passage::{Passage, PassageId};
use crate::schema::value::Value;
use crate::script::{Evaluator, ExprError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed project: {0}")]
    MalformedProject(#[from] ProjectError),
    #[error("no scene reached after {steps} logic passages (last: '{passage}')")]
    CycleDetected { passage: PassageId, steps: usize },
    #[error("no story loaded")]
    NotLoaded,
}

impl From<FlowError> for EngineError {
    fn from(e: FlowError) -> Self {
        match e {
            FlowError::CycleDetected { passage, steps } => {
                EngineError::CycleDetected { passage, steps }
            }
        }
    }
}

/// Outcome of `start`, `select_choice` or `next_dialogue`.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The session now rests on this scene; its actions have run.
    Scene(Passage),
    /// The story reached a terminal.
    Ended,
}

impl Step {
    pub fn passage(&self) -> Option<&Passage> {
        match self {
            Step::Scene(p) => Some(p),
            Step::Ended => None,
        }
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, Step::Ended)
    }
}

/// Notifications for the presentation layer, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoryEvent {
    /// An audio clip the entered scene wants played. Emitted before the
    /// scene's `PassageChanged`.
    SoundRequested(String),
    PassageChanged(Passage),
    StoryEnded,
}

type Listener = Box<dyn FnMut(&StoryEvent)>;

/// Runs one playthrough at a time. Built via `StoryEngine::builder()`.
pub struct StoryEngine {
    graph: Option<StoryGraph>,
    state: SessionState,
    evaluator: Evaluator,
    max_chain_steps: usize,
    listeners: Vec<Listener>,
}

/// Builder for constructing a `StoryEngine`.
pub struct StoryEngineBuilder {
    seed: u64,
    max_chain_steps: usize,
    project_path: Option<PathBuf>,
    /// Directly provided story (for testing without files).
    graph: Option<StoryGraph>,
}

impl StoryEngine {
    pub fn builder() -> StoryEngineBuilder {
        StoryEngineBuilder {
            seed: 0,
            max_chain_steps: DEFAULT_MAX_CHAIN_STEPS,
            project_path: None,
            graph: None,
        }
    }

    /// Load a project file and make it the active story. On error the
    /// previously loaded story, if any, stays active.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<&StoryGraph, EngineError> {
        let path = path.as_ref();
        let graph = StoryGraph::load(path).inspect_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "failed to load project");
        })?;
        Ok(self.install(graph))
    }

    /// Parse a JSON project and make it the active story.
    pub fn load_json(&mut self, json: &str) -> Result<&StoryGraph, EngineError> {
        let graph = StoryGraph::parse_json(json)?;
        Ok(self.install(graph))
    }

    /// Validate an in-memory story and make it the active story.
    pub fn set_graph(&mut self, graph: StoryGraph) -> Result<&StoryGraph, EngineError> {
        graph.validate()?;
        Ok(self.install(graph))
    }

    fn install(&mut self, graph: StoryGraph) -> &StoryGraph {
        tracing::info!(
            name = %graph.meta.name,
            passages = graph.passages.len(),
            variables = graph.variable_defs.len(),
            "project loaded"
        );
        self.state = SessionState::new();
        self.graph.insert(graph)
    }

    /// Register a listener for every subsequent event.
    pub fn subscribe(&mut self, listener: impl FnMut(&StoryEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Begin a fresh playthrough and resolve the first scene.
    pub fn start(&mut self) -> Result<Step, EngineError> {
        let graph = self.graph.as_ref().ok_or(EngineError::NotLoaded)?;
        self.state.initialize(graph);
        tracing::info!(start = ?graph.start_passage_id, "story started");

        let outcome = FlowController::new(graph, &mut self.state, &mut self.evaluator)
            .with_max_chain_steps(self.max_chain_steps)
            .enter_start()
            .map(|p| p.cloned());
        self.finish(outcome)
    }

    /// Pick choice `index` on the current scene. An out-of-range index
    /// counts as no choice.
    pub fn select_choice(&mut self, index: usize) -> Result<Step, EngineError> {
        self.advance(Some(index))
    }

    /// Continue past a scene without picking a choice.
    pub fn next_dialogue(&mut self) -> Result<Step, EngineError> {
        self.advance(None)
    }

    fn advance(&mut self, choice: Option<usize>) -> Result<Step, EngineError> {
        let graph = self.graph.as_ref().ok_or(EngineError::NotLoaded)?;
        let outcome = FlowController::new(graph, &mut self.state, &mut self.evaluator)
            .with_max_chain_steps(self.max_chain_steps)
            .advance(choice)
            .map(|p| p.cloned());
        self.finish(outcome)
    }

    fn finish(&mut self, outcome: Result<Option<Passage>, FlowError>) -> Result<Step, EngineError> {
        match outcome? {
            Some(passage) => {
                if let Some(scene) = passage.scene() {
                    let clips = scene.audio_clip.iter().filter(|c| !c.is_empty()).cloned();
                    let cues = scene.actions.iter().filter_map(|a| match a {
                        Action::PlaySound { clip } => Some(clip.clone()),
                        _ => None,
                    });
                    for clip in clips.chain(cues).collect::<Vec<_>>() {
                        self.emit(&StoryEvent::SoundRequested(clip));
                    }
                }
                self.emit(&StoryEvent::PassageChanged(passage.clone()));
                Ok(Step::Scene(passage))
            }
            None => {
                tracing::info!(visited = self.state.history().len(), "story ended");
                self.emit(&StoryEvent::StoryEnded);
                Ok(Step::Ended)
            }
        }
    }

    fn emit(&mut self, event: &StoryEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    /// Read-only view of the session for display.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn graph(&self) -> Option<&StoryGraph> {
        self.graph.as_ref()
    }

    /// The passage the session currently rests on.
    pub fn current_passage(&self) -> Option<&Passage> {
        let id = self.state.current_passage_id()?;
        self.graph.as_ref()?.passage(id)
    }

    /// Evaluate a condition against the live variables. The flow never
    /// gates choices; this is for a presentation layer that wants to.
    pub fn evaluate_condition(&mut self, expr: &str) -> bool {
        self.evaluator.evaluate_condition(expr, self.state.variables())
    }

    pub fn evaluate_expression(&mut self, expr: &str) -> Value {
        self.evaluator.evaluate_expression(expr, self.state.variables())
    }

    /// Evaluate against the live variables, surfacing any error.
    pub fn try_evaluate(&mut self, expr: &str) -> Result<Value, ExprError> {
        self.evaluator.try_evaluate(expr, self.state.variables())
    }
}

impl StoryEngineBuilder {
    /// Seed for `random()` and `randint()` in story expressions.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Bound on consecutive logic passages in one advance.
    pub fn max_chain_steps(mut self, steps: usize) -> Self {
        self.max_chain_steps = steps;
        self
    }

    pub fn project(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(path.into());
        self
    }

    /// Provide a story directly (for testing without files). Takes
    /// precedence over `project`.
    pub fn with_graph(mut self, graph: StoryGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn build(self) -> Result<StoryEngine, EngineError> {
        let mut engine = StoryEngine {
            graph: None,
            state: SessionState::new(),
            evaluator: Evaluator::with_seed(self.seed),
            max_chain_steps: self.max_chain_steps,
            listeners: Vec::new(),
        };

        if let Some(graph) = self.graph {
            engine.set_graph(graph)?;
        } else if let Some(path) = self.project_path {
            engine.load(&path)?;
        }

        Ok(engine)
    }
}
