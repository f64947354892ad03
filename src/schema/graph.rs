//! Story graph: the read-only document a session plays through, plus
//! loading and validation of the persisted project format.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::action::Action;
use super::passage::{
    Assignment, Choice, Passage, PassageBody, PassageId, PassageKind, SceneContent, VarOperation,
    VariableDef, VariableType,
};
use super::value::Value;

/// Why a project document was rejected. Every variant is a
/// malformed-project condition; nothing is installed when one occurs.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("node key '{key}' does not match node id '{id}'")]
    IdMismatch { key: String, id: String },
    #[error("node '{node}' has unknown type '{node_type}'")]
    UnknownNodeType { node: String, node_type: String },
    #[error("node '{node}' has unknown operation '{operation}'")]
    UnknownOperation { node: String, operation: String },
    #[error("node '{node}' action {index}: {reason}")]
    InvalidAction {
        node: String,
        index: usize,
        reason: String,
    },
    #[error("variable '{name}' has unknown type '{var_type}'")]
    UnknownVariableType { name: String, var_type: String },
    #[error("variable '{name}' default {value} is not a valid {expected}")]
    InvalidDefault {
        name: String,
        value: Value,
        expected: &'static str,
    },
    #[error("start passage '{0}' does not exist")]
    MissingStart(PassageId),
    #[error("passage '{from}' links to unknown passage '{target}'")]
    DanglingTarget { from: PassageId, target: PassageId },
}

/// Project metadata, carried through for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMeta {
    pub name: String,
    pub author: String,
    pub version: String,
    pub resolution: (u32, u32),
}

impl Default for ProjectMeta {
    fn default() -> Self {
        Self {
            name: "Untitled Story".to_string(),
            author: String::new(),
            version: "1.0.0".to_string(),
            resolution: (1280, 720),
        }
    }
}

/// A loaded story. Immutable while a session is playing it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryGraph {
    pub meta: ProjectMeta,
    pub variable_defs: FxHashMap<String, VariableDef>,
    pub passages: FxHashMap<PassageId, Passage>,
    pub assets: FxHashMap<String, String>,
    pub start_passage_id: Option<PassageId>,
}

impl StoryGraph {
    pub fn passage(&self, id: &str) -> Option<&Passage> {
        self.passages.get(id)
    }

    /// Insert a passage, replacing any passage with the same id.
    pub fn insert_passage(&mut self, passage: Passage) {
        self.passages.insert(passage.id.clone(), passage);
    }

    pub fn define_variable(&mut self, name: &str, var_type: VariableType, default_value: Value) {
        self.variable_defs.insert(
            name.to_string(),
            VariableDef {
                var_type,
                default_value,
            },
        );
    }

    /// Passage ids in sorted order, for deterministic reporting.
    pub fn sorted_ids(&self) -> Vec<&PassageId> {
        let mut ids: Vec<&PassageId> = self.passages.keys().collect();
        ids.sort();
        ids
    }

    /// Check the graph invariants: the start id (if set) and every choice
    /// or output target resolve to a passage, and every variable default
    /// matches its declared type.
    pub fn validate(&self) -> Result<(), ProjectError> {
        if let Some(start) = &self.start_passage_id {
            if !self.passages.contains_key(start) {
                return Err(ProjectError::MissingStart(start.clone()));
            }
        }

        for id in self.sorted_ids() {
            let passage = &self.passages[id];
            for target in passage.targets() {
                if !self.passages.contains_key(target) {
                    return Err(ProjectError::DanglingTarget {
                        from: id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        let mut names: Vec<&String> = self.variable_defs.keys().collect();
        names.sort();
        for name in names {
            let def = &self.variable_defs[name];
            if !def.var_type.admits(&def.default_value) {
                return Err(ProjectError::InvalidDefault {
                    name: name.clone(),
                    value: def.default_value.clone(),
                    expected: def.var_type.name(),
                });
            }
        }

        Ok(())
    }

    /// Load a project file. `.ron` files are read as RON, anything else
    /// as JSON.
    pub fn load(path: &Path) -> Result<StoryGraph, ProjectError> {
        let contents = std::fs::read_to_string(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            Self::parse_ron(&contents)
        } else {
            Self::parse_json(&contents)
        }
    }

    /// Parse and validate a project from a JSON string.
    pub fn parse_json(input: &str) -> Result<StoryGraph, ProjectError> {
        let raw: RawProject = serde_json::from_str(input)?;
        raw.into_graph()
    }

    /// Parse and validate a project from a RON string.
    pub fn parse_ron(input: &str) -> Result<StoryGraph, ProjectError> {
        let raw: RawProject = ron::from_str(input)?;
        raw.into_graph()
    }
}

// The persisted format is the editor's node graph, which has a different
// shape than the runtime types, so it goes through intermediate structs.

#[derive(Debug, Deserialize)]
struct RawProject {
    #[serde(default)]
    meta: ProjectMeta,
    #[serde(default)]
    variables: FxHashMap<String, RawVariable>,
    #[serde(default)]
    nodes: FxHashMap<String, RawNode>,
    #[serde(default)]
    assets: FxHashMap<String, String>,
    #[serde(default, alias = "startNodeId")]
    start_node_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVariable {
    #[serde(rename = "type", alias = "kind")]
    var_type: String,
    #[serde(alias = "defaultValue")]
    default_value: Value,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", alias = "kind", default = "default_node_type")]
    node_type: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: RawContent,
    #[serde(default)]
    outputs: Vec<RawConnection>,
}

fn default_node_type() -> String {
    "SCENE".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawContent {
    text: Option<String>,
    #[serde(alias = "characterId")]
    character_id: Option<String>,
    #[serde(alias = "backgroundImage")]
    background_image: Option<String>,
    #[serde(alias = "audio_clip", alias = "audioClip")]
    music: Option<String>,
    choices: Vec<RawChoice>,
    actions: Vec<RawAction>,
    #[serde(alias = "variableName")]
    variable_name: Option<String>,
    operation: Option<String>,
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default, alias = "targetNodeId", alias = "target")]
    target_node_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(rename = "type", alias = "kind")]
    kind: String,
    #[serde(default)]
    params: FxHashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawConnection {
    #[serde(alias = "targetNodeId", alias = "target")]
    target_node_id: String,
}

impl RawProject {
    fn into_graph(self) -> Result<StoryGraph, ProjectError> {
        let mut graph = StoryGraph {
            meta: self.meta,
            assets: self.assets,
            start_passage_id: self.start_node_id.filter(|s| !s.is_empty()),
            ..StoryGraph::default()
        };

        for (name, raw) in self.variables {
            let var_type = VariableType::parse(&raw.var_type).ok_or_else(|| {
                ProjectError::UnknownVariableType {
                    name: name.clone(),
                    var_type: raw.var_type.clone(),
                }
            })?;
            graph.variable_defs.insert(
                name,
                VariableDef {
                    var_type,
                    default_value: raw.default_value,
                },
            );
        }

        for (key, node) in self.nodes {
            let passage = node.into_passage(key)?;
            graph.insert_passage(passage);
        }

        graph.validate()?;
        tracing::debug!(
            passages = graph.passages.len(),
            variables = graph.variable_defs.len(),
            "story graph validated"
        );
        Ok(graph)
    }
}

impl RawNode {
    fn into_passage(self, key: String) -> Result<Passage, ProjectError> {
        let id = match self.id {
            Some(id) if id != key => return Err(ProjectError::IdMismatch { key, id }),
            _ => key,
        };

        let kind = PassageKind::parse(&self.node_type).ok_or_else(|| {
            ProjectError::UnknownNodeType {
                node: id.clone(),
                node_type: self.node_type.clone(),
            }
        })?;

        let content = self.content;
        let body = match kind {
            PassageKind::Start => PassageBody::Start,
            PassageKind::Scene => {
                let mut actions = Vec::with_capacity(content.actions.len());
                for (index, raw) in content.actions.into_iter().enumerate() {
                    let action = Action::from_params(&raw.kind, &raw.params).map_err(|reason| {
                        ProjectError::InvalidAction {
                            node: id.clone(),
                            index,
                            reason,
                        }
                    })?;
                    actions.push(action);
                }
                let choices = content
                    .choices
                    .into_iter()
                    .map(|c| Choice {
                        text: c.text.unwrap_or_else(|| "Continue...".to_string()),
                        condition: c.condition.unwrap_or_default(),
                        target: c.target_node_id.filter(|t| !t.is_empty()),
                    })
                    .collect();
                PassageBody::Scene(SceneContent {
                    text: content.text.unwrap_or_default(),
                    character_id: content.character_id,
                    background_image: content.background_image,
                    audio_clip: content.music,
                    choices,
                    actions,
                })
            }
            PassageKind::SetVar => {
                let assignment = match (content.variable_name, content.operation) {
                    (Some(variable), Some(op)) if !variable.is_empty() && !op.is_empty() => {
                        let operation = VarOperation::parse(&op).ok_or_else(|| {
                            ProjectError::UnknownOperation {
                                node: id.clone(),
                                operation: op.clone(),
                            }
                        })?;
                        let value_expression = match content.value {
                            Some(Value::Str(s)) => s,
                            Some(other) => other.to_string(),
                            None => "0".to_string(),
                        };
                        Some(Assignment {
                            variable,
                            operation,
                            value_expression,
                        })
                    }
                    _ => {
                        tracing::debug!(node = %id, "logic node has no assignment");
                        None
                    }
                };
                PassageBody::SetVar(assignment)
            }
        };

        if self.outputs.len() > 1 {
            tracing::debug!(
                node = %id,
                outputs = self.outputs.len(),
                "only the first output is followed"
            );
        }
        let default_output = self
            .outputs
            .into_iter()
            .next()
            .map(|c| c.target_node_id)
            .filter(|t| !t.is_empty());

        Ok(Passage {
            id,
            title: self.title,
            body,
            default_output,
        })
    }
}
