//! Typed side effects executed when a scene is entered.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::passage::normalize;
use super::value::Value;

/// Movement state of a non-player character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NpcStatus {
    #[default]
    Fixed,
    Follow,
    Dead,
}

impl NpcStatus {
    pub fn parse(s: &str) -> Option<NpcStatus> {
        match normalize(s).as_str() {
            "fixed" => Some(NpcStatus::Fixed),
            "follow" => Some(NpcStatus::Follow),
            "dead" => Some(NpcStatus::Dead),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Follow => "follow",
            Self::Dead => "dead",
        }
    }
}

/// A scene action, validated once at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    AddItem { item_id: String, qty: u32 },
    RemoveItem { item_id: String, qty: u32 },
    SpawnNpc { npc_id: String },
    SetNpcStatus { npc_id: String, status: NpcStatus },
    /// Presentation cue; has no effect on session state.
    PlaySound { clip: String },
    /// A `;`-separated assignment script run against session variables.
    RunScript { script: String },
    /// A kind this runtime does not know. Kept so newer documents still
    /// load; executing it does nothing.
    Unknown { kind: String },
}

impl Action {
    /// Build a typed action from a document's `type` string and its
    /// parameter map. The error names what is missing or malformed.
    pub fn from_params(kind: &str, params: &FxHashMap<String, Value>) -> Result<Action, String> {
        let action = match normalize(kind).as_str() {
            "additem" => Action::AddItem {
                item_id: required_str(params, &["item_id", "itemId"])?,
                qty: quantity(params)?,
            },
            "removeitem" => Action::RemoveItem {
                item_id: required_str(params, &["item_id", "itemId"])?,
                qty: quantity(params)?,
            },
            "spawnnpc" => Action::SpawnNpc {
                npc_id: required_str(params, &["npc_id", "npcId"])?,
            },
            "setnpcstatus" => {
                let npc_id = required_str(params, &["npc_id", "npcId"])?;
                let raw = required_str(params, &["status"])?;
                let status = NpcStatus::parse(&raw)
                    .ok_or_else(|| format!("unknown npc status '{}'", raw))?;
                Action::SetNpcStatus { npc_id, status }
            }
            "playsound" => Action::PlaySound {
                clip: required_str(params, &["clip", "audio_clip", "audioClip"])?,
            },
            "runscript" => Action::RunScript {
                script: required_str(params, &["script"])?,
            },
            _ => Action::Unknown {
                kind: kind.to_string(),
            },
        };
        Ok(action)
    }

    pub fn kind_name(&self) -> &str {
        match self {
            Action::AddItem { .. } => "add_item",
            Action::RemoveItem { .. } => "remove_item",
            Action::SpawnNpc { .. } => "spawn_npc",
            Action::SetNpcStatus { .. } => "set_npc_status",
            Action::PlaySound { .. } => "play_sound",
            Action::RunScript { .. } => "run_script",
            Action::Unknown { kind } => kind,
        }
    }
}

fn lookup<'a>(params: &'a FxHashMap<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| params.get(*k))
}

fn required_str(params: &FxHashMap<String, Value>, keys: &[&str]) -> Result<String, String> {
    match lookup(params, keys) {
        Some(Value::Str(s)) if !s.is_empty() => Ok(s.clone()),
        Some(other) => Err(format!(
            "parameter '{}' must be a non-empty string, got {}",
            keys[0],
            other.type_name()
        )),
        None => Err(format!("missing parameter '{}'", keys[0])),
    }
}

/// `qty` defaults to 1 and must be a positive integer.
fn quantity(params: &FxHashMap<String, Value>) -> Result<u32, String> {
    match lookup(params, &["qty", "quantity"]) {
        None => Ok(1),
        Some(Value::Int(n)) if *n > 0 => u32::try_from(*n).map_err(|_| format!("qty {} is too large", n)),
        Some(other) => Err(format!("qty must be a positive integer, got '{}'", other)),
    }
}
