//! Sandboxed expression evaluation for conditions, logic passages and
//! script actions.
//!
//! The [`Evaluator`] never fails: conditions fail closed (`false`),
//! expressions fail safe (`0`) and malformed script statements are skipped.
//! Every swallowed error is logged. [`Evaluator::try_evaluate`] exposes the
//! underlying error for tooling.

pub mod interp;
pub mod lexer;
pub mod parser;

use std::ops::Range;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::schema::passage::VarOperation;
use crate::schema::value::{Value, Variables};
use parser::BinaryOp;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("name '{0}' is not defined")]
    UnknownName(String),
    #[error("function '{0}' is not available")]
    UnknownFunction(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("{function}() called with {got} arguments")]
    Arity { function: String, got: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error("numeric overflow")]
    Overflow,
}

/// Separator between micro-script statements. Newlines also separate.
pub const STATEMENT_DELIMITER: char = ';';

/// One parsed micro-script statement: `name = expr`, `name += expr` or
/// `name -= expr`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub variable: String,
    pub operation: VarOperation,
    pub expression: String,
}

impl Statement {
    pub fn parse(src: &str) -> Result<Statement, ExprError> {
        let (op, operation) = assignment_operator(src)
            .ok_or_else(|| ExprError::Parse(format!("no assignment in '{}'", src.trim())))?;
        let (variable, expression) = (&src[..op.start], &src[op.end..]);

        let variable = variable.trim();
        let valid_name = variable
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && variable.chars().all(|c| c.is_alphanumeric() || c == '_');
        if !valid_name {
            return Err(ExprError::Parse(format!(
                "invalid assignment target '{}'",
                variable
            )));
        }

        let expression = expression.trim();
        if expression.is_empty() {
            return Err(ExprError::Parse(format!(
                "missing value for '{}'",
                variable
            )));
        }

        Ok(Statement {
            variable: variable.to_string(),
            operation,
            expression: expression.to_string(),
        })
    }
}

/// Characters of `src` outside string literals, with their byte offsets.
/// Literals follow the lexer: `'...'` or `"..."` with `\` escapes.
fn unquoted(src: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    src.char_indices().filter(move |&(_, c)| match quote {
        Some(q) => {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            false
        }
        None if c == '"' || c == '\'' => {
            quote = Some(c);
            false
        }
        None => true,
    })
}

/// Split a micro-script into its non-blank statements. Delimiters inside
/// string literals do not split.
pub fn split_statements(script: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    for (i, c) in unquoted(script) {
        if c == STATEMENT_DELIMITER || c == '\n' {
            statements.push(&script[start..i]);
            start = i + c.len_utf8();
        }
    }
    statements.push(&script[start..]);
    statements.retain(|s| !s.trim().is_empty());
    statements
}

/// Span and kind of the first assignment operator outside string literals.
/// A bare `=` that is part of `==`, `!=`, `<=` or `>=` does not count.
fn assignment_operator(src: &str) -> Option<(Range<usize>, VarOperation)> {
    let bytes = src.as_bytes();
    unquoted(src).find_map(|(i, c)| {
        if c != '=' || bytes.get(i + 1) == Some(&b'=') {
            return None;
        }
        match i.checked_sub(1).map(|j| bytes[j]) {
            Some(b'=' | b'!' | b'<' | b'>') => None,
            Some(b'+') => Some((i - 1..i + 1, VarOperation::Add)),
            Some(b'-') => Some((i - 1..i + 1, VarOperation::Sub)),
            _ => Some((i..i + 1, VarOperation::Set)),
        }
    })
}

/// Expression evaluator. Holds only its random source; the variable
/// context is passed into every call and never retained.
#[derive(Debug, Clone)]
pub struct Evaluator {
    rng: StdRng,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Evaluator {
    /// An evaluator whose `random()`/`randint()` sequence is fixed by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Parse and evaluate, surfacing any error.
    pub fn try_evaluate(&mut self, expr: &str, vars: &Variables) -> Result<Value, ExprError> {
        let ast = parser::parse(expr)?;
        interp::eval(&ast, vars, &mut self.rng)
    }

    /// Evaluate a condition. Blank conditions pass; any error fails closed.
    pub fn evaluate_condition(&mut self, expr: &str, vars: &Variables) -> bool {
        if expr.trim().is_empty() {
            return true;
        }
        match self.try_evaluate(expr, vars) {
            Ok(v) => v.is_truthy(),
            Err(e) => {
                tracing::warn!(condition = expr, error = %e, "condition failed, treating as false");
                false
            }
        }
    }

    /// Evaluate a value expression. Blank expressions and errors yield `0`.
    pub fn evaluate_expression(&mut self, expr: &str, vars: &Variables) -> Value {
        if expr.trim().is_empty() {
            return Value::Int(0);
        }
        match self.try_evaluate(expr, vars) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(expression = expr, error = %e, "expression failed, using 0");
                Value::Int(0)
            }
        }
    }

    /// Run a micro-script: statements separated by `;` or newlines,
    /// executed left to right against `vars`. A statement that does not
    /// parse, or whose update fails, is logged and skipped. Returns how
    /// many statements were applied.
    ///
    /// Unlike expressions, an undefined target starts from `0` for `+=`
    /// and `-=`.
    pub fn execute_script(&mut self, script: &str, vars: &mut Variables) -> usize {
        let mut applied = 0;
        for raw in split_statements(script) {
            let stmt = match Statement::parse(raw) {
                Ok(stmt) => stmt,
                Err(e) => {
                    tracing::warn!(statement = raw.trim(), error = %e, "skipping script statement");
                    continue;
                }
            };
            let value = match self.try_evaluate(&stmt.expression, vars) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(statement = raw.trim(), error = %e, "skipping script statement");
                    continue;
                }
            };
            let current = vars.get(&stmt.variable).cloned().unwrap_or_default();
            match apply_operation(stmt.operation, &current, value) {
                Ok(result) => {
                    tracing::debug!(variable = %stmt.variable, value = %result, "script assignment");
                    vars.insert(stmt.variable, result);
                    applied += 1;
                }
                Err(e) => {
                    tracing::warn!(statement = raw.trim(), error = %e, "skipping script statement");
                }
            }
        }
        applied
    }
}

/// Combine a variable's current value with an evaluated operand.
pub fn apply_operation(
    operation: VarOperation,
    current: &Value,
    operand: Value,
) -> Result<Value, ExprError> {
    match operation {
        VarOperation::Set => Ok(operand),
        VarOperation::Add => interp::binary(BinaryOp::Add, current, &operand),
        VarOperation::Sub => interp::binary(BinaryOp::Sub, current, &operand),
    }
}
