//! Static checks over a loaded story: things that load fine but will play
//! badly.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::schema::action::Action;
use crate::schema::graph::StoryGraph;
use crate::schema::passage::{PassageBody, PassageId};
use crate::script::{parser, split_statements, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintKind {
    NoStart,
    Unreachable,
    LogicCycle,
    BadExpression,
    DeadEnd,
    IgnoredDefault,
    UnenforcedCondition,
    UndeclaredVariable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: LintKind,
    pub passage: Option<PassageId>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.passage {
            Some(id) => write!(f, "{}: [{}] {}", self.severity, id, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Run every check. Diagnostics come back grouped by passage in id order,
/// with graph-wide findings first.
pub fn lint(graph: &StoryGraph) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let reachable = reachable_from_start(graph);

    if graph.start_passage_id.is_none() {
        out.push(Diagnostic {
            severity: Severity::Error,
            kind: LintKind::NoStart,
            passage: None,
            message: "story has no start passage".to_string(),
        });
    }

    for cycle in logic_cycles(graph, &reachable) {
        out.push(Diagnostic {
            severity: Severity::Error,
            kind: LintKind::LogicCycle,
            passage: cycle.first().cloned(),
            message: format!(
                "logic passages loop without reaching a scene: {}",
                cycle.join(" -> ")
            ),
        });
    }

    for id in graph.sorted_ids() {
        let passage = &graph.passages[id];
        let mut push = |severity, kind, message: String| {
            out.push(Diagnostic {
                severity,
                kind,
                passage: Some(id.clone()),
                message,
            })
        };

        if graph.start_passage_id.is_some() && !reachable.contains(id) {
            push(
                Severity::Warning,
                LintKind::Unreachable,
                "not reachable from the start passage".to_string(),
            );
        }

        match &passage.body {
            PassageBody::Start => {}
            PassageBody::Scene(scene) => {
                if scene.choices.is_empty() && passage.default_output.is_none() {
                    push(
                        Severity::Info,
                        LintKind::DeadEnd,
                        "scene has no choices and no default output; the story ends here"
                            .to_string(),
                    );
                }
                if !scene.choices.is_empty() && passage.default_output.is_some() {
                    push(
                        Severity::Info,
                        LintKind::IgnoredDefault,
                        "default output is never followed from a scene with choices".to_string(),
                    );
                }
                for (i, choice) in scene.choices.iter().enumerate() {
                    if choice.condition.trim().is_empty() {
                        continue;
                    }
                    if let Err(e) = parser::parse(&choice.condition) {
                        push(
                            Severity::Error,
                            LintKind::BadExpression,
                            format!("choice {} condition '{}': {}", i, choice.condition, e),
                        );
                    }
                    push(
                        Severity::Info,
                        LintKind::UnenforcedCondition,
                        format!(
                            "choice {} ('{}') has a condition the runtime does not enforce",
                            i, choice.text
                        ),
                    );
                }
                for (i, action) in scene.actions.iter().enumerate() {
                    let Action::RunScript { script } = action else {
                        continue;
                    };
                    for raw in split_statements(script) {
                        let checked = Statement::parse(raw)
                            .and_then(|stmt| parser::parse(&stmt.expression).map(|_| stmt));
                        match checked {
                            Ok(stmt) if !graph.variable_defs.contains_key(&stmt.variable) => push(
                                Severity::Warning,
                                LintKind::UndeclaredVariable,
                                format!("action {} assigns undeclared variable '{}'", i, stmt.variable),
                            ),
                            Ok(_) => {}
                            Err(e) => push(
                                Severity::Error,
                                LintKind::BadExpression,
                                format!("action {} statement '{}': {}", i, raw.trim(), e),
                            ),
                        }
                    }
                }
            }
            PassageBody::SetVar(None) => {}
            PassageBody::SetVar(Some(assignment)) => {
                if !graph.variable_defs.contains_key(&assignment.variable) {
                    push(
                        Severity::Warning,
                        LintKind::UndeclaredVariable,
                        format!("assigns undeclared variable '{}'", assignment.variable),
                    );
                }
                let expr = assignment.value_expression.trim();
                if !expr.is_empty() {
                    if let Err(e) = parser::parse(expr) {
                        push(
                            Severity::Error,
                            LintKind::BadExpression,
                            format!("value '{}': {}", expr, e),
                        );
                    }
                }
            }
        }
    }

    out
}

fn reachable_from_start(graph: &StoryGraph) -> BTreeSet<PassageId> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::new();
    if let Some(start) = &graph.start_passage_id {
        queue.push_back(start.clone());
    }
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(passage) = graph.passage(&id) {
            queue.extend(passage.targets().cloned());
        }
    }
    seen
}

/// Reachable cycles made only of non-scene passages. Each logic passage
/// has at most one outgoing edge, so following default outputs from every
/// logic passage finds every such cycle. Passages are walked once; each
/// cycle is reported once, rotated to start at its smallest id.
fn logic_cycles(graph: &StoryGraph, reachable: &BTreeSet<PassageId>) -> Vec<Vec<PassageId>> {
    let is_logic = |id: &str| {
        graph
            .passage(id)
            .is_some_and(|p| !matches!(p.body, PassageBody::Scene(_)))
    };

    let mut done: BTreeSet<PassageId> = BTreeSet::new();
    let mut found = BTreeSet::new();
    for start in reachable.iter().filter(|id| is_logic(id)) {
        let mut path: Vec<PassageId> = Vec::new();
        let mut on_path: BTreeMap<PassageId, usize> = BTreeMap::new();
        let mut current = start.clone();
        loop {
            if done.contains(&current) {
                break;
            }
            if let Some(&pos) = on_path.get(&current) {
                let mut cycle = path[pos..].to_vec();
                let min = cycle
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, id)| *id)
                    .map_or(0, |(i, _)| i);
                cycle.rotate_left(min);
                found.insert(cycle);
                break;
            }
            on_path.insert(current.clone(), path.len());
            path.push(current.clone());
            let next = graph.passage(&current).and_then(|p| p.default_output.clone());
            match next {
                Some(next) if is_logic(&next) => current = next,
                _ => break,
            }
        }
        done.extend(path);
    }
    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::passage::{Assignment, Choice, Passage, SceneContent, VarOperation};
    use crate::schema::passage::VariableType;
    use crate::schema::value::Value;

    fn scene(id: &str, choices: Vec<Choice>, default: Option<&str>) -> Passage {
        Passage {
            id: id.to_string(),
            title: id.to_string(),
            body: PassageBody::Scene(SceneContent {
                choices,
                ..SceneContent::default()
            }),
            default_output: default.map(str::to_string),
        }
    }

    fn logic(id: &str, var: &str, expr: &str, next: Option<&str>) -> Passage {
        Passage {
            id: id.to_string(),
            title: id.to_string(),
            body: PassageBody::SetVar(Some(Assignment {
                variable: var.to_string(),
                operation: VarOperation::Set,
                value_expression: expr.to_string(),
            })),
            default_output: next.map(str::to_string),
        }
    }

    fn kinds(diags: &[Diagnostic], passage: &str) -> Vec<LintKind> {
        diags
            .iter()
            .filter(|d| d.passage.as_deref() == Some(passage))
            .map(|d| d.kind)
            .collect()
    }

    #[test]
    fn clean_story_has_only_the_ending_note() {
        let mut g = StoryGraph::default();
        g.define_variable("gold", VariableType::Int, Value::Int(0));
        g.insert_passage(scene("a", vec![], Some("l")));
        g.insert_passage(logic("l", "gold", "gold + 1", Some("b")));
        g.insert_passage(scene("b", vec![], None));
        g.start_passage_id = Some("a".to_string());

        let diags = lint(&g);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, LintKind::DeadEnd);
        assert_eq!(diags[0].passage.as_deref(), Some("b"));
    }

    #[test]
    fn finds_unreachable_and_missing_start() {
        let mut g = StoryGraph::default();
        g.insert_passage(scene("a", vec![], None));
        g.insert_passage(scene("island", vec![], None));
        g.start_passage_id = Some("a".to_string());
        let diags = lint(&g);
        assert!(kinds(&diags, "island").contains(&LintKind::Unreachable));
        assert!(!kinds(&diags, "a").contains(&LintKind::Unreachable));

        g.start_passage_id = None;
        let diags = lint(&g);
        assert_eq!(diags[0].kind, LintKind::NoStart);
        assert!(!diags.iter().any(|d| d.kind == LintKind::Unreachable));
    }

    #[test]
    fn reports_each_logic_cycle_once() {
        let mut g = StoryGraph::default();
        g.define_variable("n", VariableType::Int, Value::Int(0));
        g.insert_passage(scene("a", vec![], Some("x")));
        g.insert_passage(logic("x", "n", "n + 1", Some("y")));
        g.insert_passage(logic("y", "n", "n + 1", Some("z")));
        g.insert_passage(logic("z", "n", "n + 1", Some("y")));
        g.start_passage_id = Some("a".to_string());

        let cycles: Vec<_> = lint(&g)
            .into_iter()
            .filter(|d| d.kind == LintKind::LogicCycle)
            .collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].passage.as_deref(), Some("y"));
        assert!(cycles[0].message.contains("y -> z"));
        assert_eq!(cycles[0].severity, Severity::Error);
    }

    #[test]
    fn long_chain_into_a_cycle_is_found_once() {
        let mut g = StoryGraph::default();
        g.define_variable("n", VariableType::Int, Value::Int(0));
        g.insert_passage(scene("a", vec![], Some("l0000")));
        for i in 0..3000 {
            let next = if i == 2999 { 1500 } else { i + 1 };
            g.insert_passage(logic(
                &format!("l{:04}", i),
                "n",
                "n + 1",
                Some(&format!("l{:04}", next)),
            ));
        }
        g.start_passage_id = Some("a".to_string());

        let cycles: Vec<_> = lint(&g)
            .into_iter()
            .filter(|d| d.kind == LintKind::LogicCycle)
            .collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].passage.as_deref(), Some("l1500"));
    }

    #[test]
    fn quoted_delimiters_in_scripts_are_clean() {
        let mut g = StoryGraph::default();
        g.define_variable("note", VariableType::String, Value::from(""));
        let mut a = scene("a", vec![], None);
        if let PassageBody::Scene(ref mut s) = a.body {
            s.actions.push(Action::RunScript {
                script: "note = 'a;b'\nnote += \"c+=d\"".to_string(),
            });
        }
        g.insert_passage(a);
        g.start_passage_id = Some("a".to_string());

        let diags = lint(&g);
        assert!(
            diags.iter().all(|d| d.kind != LintKind::BadExpression
                && d.kind != LintKind::UndeclaredVariable),
            "{:?}",
            diags
        );
    }

    #[test]
    fn loop_through_a_scene_is_fine() {
        let mut g = StoryGraph::default();
        g.define_variable("n", VariableType::Int, Value::Int(0));
        g.insert_passage(scene("a", vec![], Some("x")));
        g.insert_passage(logic("x", "n", "n + 1", Some("a")));
        g.start_passage_id = Some("a".to_string());
        assert!(lint(&g).is_empty());
    }

    #[test]
    fn flags_bad_expressions_and_undeclared_variables() {
        let mut g = StoryGraph::default();
        let mut a = scene(
            "a",
            vec![Choice {
                text: "Pay".to_string(),
                condition: "gold >=".to_string(),
                target: Some("l".to_string()),
            }],
            None,
        );
        if let PassageBody::Scene(ref mut s) = a.body {
            s.actions.push(Action::RunScript {
                script: "mood = 'calm'; broken +".to_string(),
            });
        }
        g.insert_passage(a);
        g.insert_passage(logic("l", "gold", "gold -* 2", None));
        g.start_passage_id = Some("a".to_string());

        let diags = lint(&g);
        let a = kinds(&diags, "a");
        assert!(a.contains(&LintKind::BadExpression));
        assert!(a.contains(&LintKind::UnenforcedCondition));
        assert!(a.contains(&LintKind::UndeclaredVariable));
        let l = kinds(&diags, "l");
        assert!(l.contains(&LintKind::BadExpression));
        assert!(l.contains(&LintKind::UndeclaredVariable));
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic {
            severity: Severity::Warning,
            kind: LintKind::Unreachable,
            passage: Some("cellar".to_string()),
            message: "not reachable from the start passage".to_string(),
        };
        assert_eq!(
            d.to_string(),
            "WARNING: [cellar] not reachable from the start passage"
        );
    }
}
