//! Tree-walking evaluation of parsed expressions.
//!
//! Only variable reads, operators and a fixed set of builtins exist; there
//! is no attribute access, assignment or I/O reachable from an expression.

use rand::rngs::StdRng;
use rand::Rng;
use std::cmp::Ordering;

use super::parser::{BinaryOp, CompareOp, Expr, UnaryOp};
use super::ExprError;
use crate::schema::value::{Value, Variables};

/// Longest string an expression may build.
const MAX_STRING_LEN: usize = 64 * 1024;

/// Names callable from expressions.
pub const BUILTINS: &[&str] = &[
    "min", "max", "abs", "round", "int", "str", "len", "random", "randint",
];

/// Evaluate `expr` against `vars`, drawing randomness from `rng`.
pub fn eval(expr: &Expr, vars: &Variables, rng: &mut StdRng) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Name(name) => vars
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::UnknownName(name.clone())),
        Expr::Unary(op, operand) => unary(*op, eval(operand, vars, rng)?),
        Expr::Binary(op, l, r) => {
            let left = eval(l, vars, rng)?;
            let right = eval(r, vars, rng)?;
            binary(*op, &left, &right)
        }
        Expr::Not(inner) => Ok(Value::Bool(!eval(inner, vars, rng)?.is_truthy())),
        Expr::And(l, r) => {
            let left = eval(l, vars, rng)?;
            if !left.is_truthy() {
                return Ok(left);
            }
            eval(r, vars, rng)
        }
        Expr::Or(l, r) => {
            let left = eval(l, vars, rng)?;
            if left.is_truthy() {
                return Ok(left);
            }
            eval(r, vars, rng)
        }
        Expr::Compare(first, rest) => {
            let mut left = eval(first, vars, rng)?;
            for (op, rhs) in rest {
                let right = eval(rhs, vars, rng)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Expr::Call(name, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, vars, rng)?);
            }
            call(name, &values, rng)
        }
    }
}

fn unary(op: UnaryOp, v: Value) -> Result<Value, ExprError> {
    match (op, v) {
        (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or(ExprError::Overflow),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Int(-i64::from(b))),
        (UnaryOp::Pos, Value::Bool(b)) => Ok(Value::Int(i64::from(b))),
        (UnaryOp::Pos, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
        (_, other) => Err(ExprError::Type(format!(
            "bad operand type for unary operator: {}",
            other.type_name()
        ))),
    }
}

/// Apply an arithmetic operator. Also used by logic passages for their
/// `+`/`-` assignments, so both paths share one set of rules:
/// int op int stays int (except `/`), any float promotes to float,
/// booleans act as `0`/`1`, `str + str` concatenates, `str * int` repeats.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
            check_len(a.len() + b.len())?;
            return Ok(Value::Str(format!("{}{}", a, b)));
        }
        (BinaryOp::Mul, Value::Str(s), n @ (Value::Int(_) | Value::Bool(_)))
        | (BinaryOp::Mul, n @ (Value::Int(_) | Value::Bool(_)), Value::Str(s)) => {
            let times = n.coerce_int().unwrap_or(0).max(0) as usize;
            check_len(s.len().saturating_mul(times))?;
            return Ok(Value::Str(s.repeat(times)));
        }
        _ => {}
    }

    if let (Some(a), Some(b)) = (as_int(left), as_int(right)) {
        return int_binary(op, a, b);
    }

    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => float_binary(op, a, b),
        _ => Err(ExprError::Type(format!(
            "unsupported operand types for {:?}: {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn check_len(len: usize) -> Result<(), ExprError> {
    if len > MAX_STRING_LEN {
        return Err(ExprError::Overflow);
    }
    Ok(())
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> Result<Value, ExprError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => return float_binary(op, a as f64, b as f64),
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(ExprError::DivisionByZero);
            }
            a.checked_div(b).map(|q| {
                if (a % b != 0) && ((a < 0) != (b < 0)) {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(ExprError::DivisionByZero);
            }
            a.checked_rem(b).map(|r| if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
        }
        BinaryOp::Pow => {
            if b < 0 {
                return float_binary(op, a as f64, b as f64);
            }
            u32::try_from(b).ok().and_then(|e| a.checked_pow(e))
        }
    };
    result.map(Value::Int).ok_or(ExprError::Overflow)
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Result<Value, ExprError> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if b == 0.0 => {
            return Err(ExprError::DivisionByZero)
        }
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => a - b * (a / b).floor(),
        BinaryOp::Pow => a.powf(b),
    };
    if !result.is_finite() {
        return Err(ExprError::Overflow);
    }
    Ok(Value::Float(result))
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ExprError> {
    let ordering = || {
        left.compare(right).ok_or_else(|| {
            ExprError::Type(format!(
                "cannot order {} and {}",
                left.type_name(),
                right.type_name()
            ))
        })
    };
    Ok(match op {
        CompareOp::Eq => left.loose_eq(right),
        CompareOp::NotEq => !left.loose_eq(right),
        CompareOp::Lt => ordering()? == Ordering::Less,
        CompareOp::LtEq => ordering()? != Ordering::Greater,
        CompareOp::Gt => ordering()? == Ordering::Greater,
        CompareOp::GtEq => ordering()? != Ordering::Less,
    })
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), ExprError> {
    if args.len() < min || args.len() > max {
        return Err(ExprError::Arity {
            function: name.to_string(),
            got: args.len(),
        });
    }
    Ok(())
}

fn call(name: &str, args: &[Value], rng: &mut StdRng) -> Result<Value, ExprError> {
    match name {
        "min" | "max" => {
            arity(name, args, 1, usize::MAX)?;
            let want = if name == "min" {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best = &args[0];
            for candidate in &args[1..] {
                let ord = candidate.compare(best).ok_or_else(|| {
                    ExprError::Type(format!(
                        "{}() cannot compare {} and {}",
                        name,
                        candidate.type_name(),
                        best.type_name()
                    ))
                })?;
                if ord == want {
                    best = candidate;
                }
            }
            Ok(best.clone())
        }
        "abs" => {
            arity(name, args, 1, 1)?;
            match &args[0] {
                Value::Int(i) => i.checked_abs().map(Value::Int).ok_or(ExprError::Overflow),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                other => Err(ExprError::Type(format!(
                    "abs() of {}",
                    other.type_name()
                ))),
            }
        }
        "round" => {
            arity(name, args, 1, 2)?;
            let x = args[0].as_f64().ok_or_else(|| {
                ExprError::Type(format!("round() of {}", args[0].type_name()))
            })?;
            match args.get(1) {
                None => {
                    let r = x.round_ties_even();
                    Value::Float(r).coerce_int().map(Value::Int).ok_or(ExprError::Overflow)
                }
                Some(digits) => {
                    let n = match digits {
                        Value::Int(n) => (*n).clamp(-308, 308) as i32,
                        other => {
                            return Err(ExprError::Type(format!(
                                "round() digits must be int, got {}",
                                other.type_name()
                            )))
                        }
                    };
                    let scale = 10f64.powi(n);
                    Ok(Value::Float((x * scale).round_ties_even() / scale))
                }
            }
        }
        "int" => {
            arity(name, args, 1, 1)?;
            args[0].coerce_int().map(Value::Int).ok_or_else(|| {
                ExprError::Type(format!("int() cannot convert '{}'", args[0]))
            })
        }
        "str" => {
            arity(name, args, 1, 1)?;
            Ok(Value::Str(args[0].to_string()))
        }
        "len" => {
            arity(name, args, 1, 1)?;
            match &args[0] {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                other => Err(ExprError::Type(format!(
                    "len() of {}",
                    other.type_name()
                ))),
            }
        }
        "random" => {
            arity(name, args, 0, 0)?;
            Ok(Value::Float(rng.gen::<f64>()))
        }
        "randint" => {
            arity(name, args, 2, 2)?;
            match (as_int(&args[0]), as_int(&args[1])) {
                (Some(lo), Some(hi)) if lo <= hi => Ok(Value::Int(rng.gen_range(lo..=hi))),
                (Some(lo), Some(hi)) => Err(ExprError::Type(format!(
                    "randint() empty range {}..={}",
                    lo, hi
                ))),
                _ => Err(ExprError::Type("randint() needs two ints".to_string())),
            }
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}
