//! Story Engine: runtime for branching visual-novel stories.
//!
//! Loads a story graph of scenes and logic passages, tracks one
//! playthrough's variables, inventory and NPCs, and walks the graph as the
//! player picks choices, evaluating sandboxed expressions along the way.

pub mod core;
pub mod schema;
pub mod script;

pub use crate::core::engine::{EngineError, Step, StoryEngine, StoryEvent};
pub use crate::schema::graph::StoryGraph;
