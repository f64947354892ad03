//! Passages of the story graph, their kind-specific content and variable declarations.

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::value::Value;

/// Identifier of a passage inside a story graph.
pub type PassageId = String;

/// The closed set of passage kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassageKind {
    /// Entry marker. Not shown; continues through its default output.
    Start,
    /// A user-facing passage with text, choices and on-enter actions.
    Scene,
    /// A non-visual logic passage performing one variable assignment.
    SetVar,
}

impl PassageKind {
    /// Parse a document node type. Case and underscores are ignored, so
    /// `SET_VAR`, `SetVar` and `setvar` are the same kind.
    pub fn parse(s: &str) -> Option<PassageKind> {
        match normalize(s).as_str() {
            "start" => Some(PassageKind::Start),
            "scene" => Some(PassageKind::Scene),
            "setvar" => Some(PassageKind::SetVar),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Scene => "scene",
            Self::SetVar => "set_var",
        }
    }
}

/// A node in the story graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub title: String,
    pub body: PassageBody,
    /// The single linear fallback edge, used when a scene has no choices
    /// and after a logic passage.
    pub default_output: Option<PassageId>,
}

impl Passage {
    pub fn kind(&self) -> PassageKind {
        match self.body {
            PassageBody::Start => PassageKind::Start,
            PassageBody::Scene(_) => PassageKind::Scene,
            PassageBody::SetVar(_) => PassageKind::SetVar,
        }
    }

    /// Scene content, if this passage is a scene.
    pub fn scene(&self) -> Option<&SceneContent> {
        match &self.body {
            PassageBody::Scene(scene) => Some(scene),
            _ => None,
        }
    }

    /// Every passage id this passage can transition to.
    pub fn targets(&self) -> impl Iterator<Item = &PassageId> {
        let choice_targets = self
            .scene()
            .into_iter()
            .flat_map(|scene| scene.choices.iter().filter_map(|c| c.target.as_ref()));
        choice_targets.chain(self.default_output.iter())
    }
}

/// Kind-specific passage content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PassageBody {
    Start,
    Scene(SceneContent),
    /// `None` for a logic passage whose assignment was never filled in;
    /// such a passage only continues to its default output.
    SetVar(Option<Assignment>),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneContent {
    pub text: String,
    pub character_id: Option<String>,
    pub background_image: Option<String>,
    pub audio_clip: Option<String>,
    pub choices: Vec<Choice>,
    /// Executed in order, once, each time the scene is entered.
    pub actions: Vec<Action>,
}

/// A selectable option on a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    /// Carried for the presentation layer; traversal does not gate on it.
    pub condition: String,
    /// `None` ends the story when this choice is taken.
    pub target: Option<PassageId>,
}

/// The assignment a logic passage performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub variable: String,
    pub operation: VarOperation,
    pub value_expression: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarOperation {
    Set,
    Add,
    Sub,
}

impl VarOperation {
    /// Accepts the editor's symbols (`=`, `+`, `-`) or the names.
    pub fn parse(s: &str) -> Option<VarOperation> {
        match s.trim() {
            "=" => return Some(VarOperation::Set),
            "+" | "+=" => return Some(VarOperation::Add),
            "-" | "-=" => return Some(VarOperation::Sub),
            _ => {}
        }
        match normalize(s).as_str() {
            "set" => Some(VarOperation::Set),
            "add" => Some(VarOperation::Add),
            "sub" | "subtract" => Some(VarOperation::Sub),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Set => "=",
            Self::Add => "+=",
            Self::Sub => "-=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    Bool,
    Int,
    String,
}

impl VariableType {
    pub fn parse(s: &str) -> Option<VariableType> {
        match normalize(s).as_str() {
            "bool" | "boolean" => Some(VariableType::Bool),
            "int" | "integer" => Some(VariableType::Int),
            "str" | "string" => Some(VariableType::String),
            _ => None,
        }
    }

    /// Whether `value` is an acceptable default for this type.
    pub fn admits(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (VariableType::Bool, Value::Bool(_))
                | (VariableType::Int, Value::Int(_))
                | (VariableType::String, Value::Str(_))
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::String => "str",
        }
    }
}

/// Declaration of a story variable and the value a new session starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub var_type: VariableType,
    pub default_value: Value,
}

/// Lowercase and strip separators so `SET_VAR`, `set-var` and `SetVar`
/// compare equal.
pub(crate) fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passage_kind_parse_is_lenient() {
        assert_eq!(PassageKind::parse("SET_VAR"), Some(PassageKind::SetVar));
        assert_eq!(PassageKind::parse("SetVar"), Some(PassageKind::SetVar));
        assert_eq!(PassageKind::parse("SCENE"), Some(PassageKind::Scene));
        assert_eq!(PassageKind::parse("START"), Some(PassageKind::Start));
        assert_eq!(PassageKind::parse("CHOICE"), None);
    }

    #[test]
    fn operation_symbols_and_names() {
        assert_eq!(VarOperation::parse("="), Some(VarOperation::Set));
        assert_eq!(VarOperation::parse("+"), Some(VarOperation::Add));
        assert_eq!(VarOperation::parse("-"), Some(VarOperation::Sub));
        assert_eq!(VarOperation::parse("ADD"), Some(VarOperation::Add));
        assert_eq!(VarOperation::parse("*"), None);
    }

    #[test]
    fn variable_type_admits_matching_defaults() {
        assert!(VariableType::Int.admits(&Value::Int(3)));
        assert!(!VariableType::Int.admits(&Value::Float(3.0)));
        assert!(VariableType::parse("str").unwrap().admits(&Value::from("x")));
        assert!(!VariableType::Bool.admits(&Value::Int(1)));
    }

    #[test]
    fn targets_cover_choices_and_default() {
        let p = Passage {
            id: "a".to_string(),
            title: "A".to_string(),
            body: PassageBody::Scene(SceneContent {
                choices: vec![
                    Choice {
                        text: "go".to_string(),
                        condition: String::new(),
                        target: Some("b".to_string()),
                    },
                    Choice {
                        text: "quit".to_string(),
                        condition: String::new(),
                        target: None,
                    },
                ],
                ..SceneContent::default()
            }),
            default_output: Some("c".to_string()),
        };
        let targets: Vec<&PassageId> = p.targets().collect();
        assert_eq!(targets, vec!["b", "c"]);
    }
}
