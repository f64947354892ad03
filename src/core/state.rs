//! Session state: the mutable data of one playthrough.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::schema::action::NpcStatus;
use crate::schema::graph::StoryGraph;
use crate::schema::passage::PassageId;
use crate::schema::value::{Value, Variables};

/// Location given to an NPC the story has not placed yet.
pub const UNKNOWN_LOCATION: &str = "unknown";

/// What the session knows about one non-player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcRecord {
    pub status: NpcStatus,
    pub location: String,
    pub spawned: bool,
}

impl Default for NpcRecord {
    fn default() -> Self {
        Self {
            status: NpcStatus::Fixed,
            location: UNKNOWN_LOCATION.to_string(),
            spawned: false,
        }
    }
}

/// A partial NPC update. `None` fields leave the record unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NpcPatch {
    pub status: Option<NpcStatus>,
    pub location: Option<String>,
    pub spawned: Option<bool>,
}

/// Variables, history, inventory and NPC registry of the active
/// playthrough, plus the current position in the graph.
///
/// Only the flow controller mutates a live session; the engine hands the
/// presentation layer a shared reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    variables: Variables,
    history: Vec<PassageId>,
    current_passage_id: Option<PassageId>,
    inventory: FxHashMap<String, u32>,
    npcs: FxHashMap<String, NpcRecord>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new playthrough of `graph`: variables take their
    /// declared defaults, history, inventory and NPCs are cleared, and the
    /// position moves to the start passage.
    pub fn initialize(&mut self, graph: &StoryGraph) {
        self.variables = graph
            .variable_defs
            .iter()
            .map(|(name, def)| (name.clone(), def.default_value.clone()))
            .collect();
        self.history.clear();
        self.inventory.clear();
        self.npcs.clear();
        self.current_passage_id = graph.start_passage_id.clone();
    }

    /// Current value of `name`, or `0` when it has never been set.
    pub fn variable(&self, name: &str) -> Value {
        self.variables.get(name).cloned().unwrap_or_default()
    }

    /// Overwrite `name`. Names the story never declared are created.
    pub fn set_variable(&mut self, name: &str, value: Value) {
        if !self.variables.contains_key(name) {
            tracing::debug!(variable = name, "creating undeclared variable");
        }
        tracing::debug!(variable = name, value = %value, "set variable");
        self.variables.insert(name.to_string(), value);
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub(crate) fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    pub fn current_passage_id(&self) -> Option<&str> {
        self.current_passage_id.as_deref()
    }

    pub fn set_current_passage(&mut self, id: PassageId) {
        self.current_passage_id = Some(id);
    }

    /// Append a visited passage. History is never rewritten.
    pub fn push_history(&mut self, id: PassageId) {
        self.history.push(id);
    }

    /// Visited passages, oldest first.
    pub fn history(&self) -> &[PassageId] {
        &self.history
    }

    pub fn add_item(&mut self, item_id: &str, qty: u32) {
        if qty == 0 {
            return;
        }
        let count = self.inventory.entry(item_id.to_string()).or_insert(0);
        *count = count.saturating_add(qty);
        tracing::debug!(item = item_id, qty, total = *count, "item added");
    }

    /// Remove up to `qty`; the entry disappears when it reaches zero.
    pub fn remove_item(&mut self, item_id: &str, qty: u32) {
        let Some(count) = self.inventory.get_mut(item_id) else {
            return;
        };
        *count = count.saturating_sub(qty);
        if *count == 0 {
            self.inventory.remove(item_id);
        }
        tracing::debug!(item = item_id, qty, "item removed");
    }

    /// How many of `item_id` the player holds.
    pub fn item_count(&self, item_id: &str) -> u32 {
        self.inventory.get(item_id).copied().unwrap_or(0)
    }

    pub fn inventory(&self) -> &FxHashMap<String, u32> {
        &self.inventory
    }

    /// Merge `patch` into the NPC's record, creating a fixed NPC at an
    /// unknown location first if the story has not mentioned it.
    pub fn update_npc(&mut self, npc_id: &str, patch: NpcPatch) {
        let record = self.npcs.entry(npc_id.to_string()).or_default();
        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(location) = patch.location {
            record.location = location;
        }
        if let Some(spawned) = patch.spawned {
            record.spawned = spawned;
        }
        tracing::debug!(npc = npc_id, status = record.status.name(), location = %record.location, "npc updated");
    }

    pub fn npc(&self, npc_id: &str) -> Option<&NpcRecord> {
        self.npcs.get(npc_id)
    }

    pub fn npcs(&self) -> &FxHashMap<String, NpcRecord> {
        &self.npcs
    }
}
