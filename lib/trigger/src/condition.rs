//! Trigger conditions.
//!
//! Conditions are a JSON map. Nested maps are flattened into dotted keys
//! (`{"a": {"b": 1}}` tests `a.b`), except maps whose keys are all operator
//! tokens, which become operator expressions:
//!
//! | token  | test                       |
//! |--------|----------------------------|
//! | `$gt`  | event value > operand      |
//! | `$gte` | event value >= operand     |
//! | `$lt`  | event value < operand      |
//! | `$lte` | event value <= operand     |
//! | `$ne`  | event value != operand     |
//! | `$in`  | event value in operand     |
//! | `$nin` | event value not in operand |
//!
//! A key ending in `_pattern` with a string value is a regular expression
//! tested against the field without the suffix. Any other leaf is an
//! equality test. Every key must pass; an empty set always matches.
//!
//! Conditions are compiled once when a trigger is loaded.

use crate::error::ConditionError;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;

const PATTERN_SUFFIX: &str = "_pattern";

/// A single test applied to one event field.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Equal to the operand.
    Eq(JsonValue),
    /// Not equal to the operand.
    Ne(JsonValue),
    /// Greater than the operand.
    Gt(JsonValue),
    /// Greater than or equal to the operand.
    Gte(JsonValue),
    /// Less than the operand.
    Lt(JsonValue),
    /// Less than or equal to the operand.
    Lte(JsonValue),
    /// Equal to one of the operands.
    In(Vec<JsonValue>),
    /// Equal to none of the operands.
    NotIn(Vec<JsonValue>),
    /// Matches the regular expression.
    Matches(Regex),
}

/// All predicates on one field.
#[derive(Debug, Clone)]
pub struct Condition {
    field: String,
    predicates: Vec<Predicate>,
}

impl Condition {
    /// The dotted field this condition tests.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The predicates; all must pass.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }
}

/// A compiled condition set.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    conditions: Vec<Condition>,
}

impl Conditions {
    /// Compiles a condition map. `null` compiles to the empty set.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError::Compile` for non-map conditions, unknown
    /// operators, maps mixing operators and fields, `$in`/`$nin` operands
    /// that are not arrays, and invalid patterns.
    pub fn compile(raw: &JsonValue) -> Result<Self, ConditionError> {
        let map = match raw {
            JsonValue::Null => return Ok(Self::default()),
            JsonValue::Object(map) => map,
            other => {
                return Err(ConditionError::Compile {
                    key: String::new(),
                    reason: format!("conditions must be a map, got {other}"),
                });
            }
        };

        let mut conditions = Vec::new();
        for (key, value) in flatten(map, has_operator) {
            conditions.push(compile_one(key, value)?);
        }
        Ok(Self { conditions })
    }

    /// Whether there are no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The compiled conditions.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Evaluates against an event payload.
    ///
    /// A missing field fails its condition, unless the field is a dotted
    /// path, in which case the condition is skipped.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError::Evaluate` when an ordered comparison is
    /// applied to values that cannot be ordered against each other.
    pub fn evaluate(&self, payload: &Map<String, JsonValue>) -> Result<bool, ConditionError> {
        if self.conditions.is_empty() {
            return Ok(true);
        }
        let event = flatten(payload, is_operator_map);

        for condition in &self.conditions {
            let Some(value) = lookup(&event, &condition.field) else {
                if condition.field.contains('.') {
                    continue;
                }
                return Ok(false);
            };
            for predicate in &condition.predicates {
                if !test(&condition.field, predicate, value)? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

fn lookup<'a>(event: &'a [(String, &JsonValue)], field: &str) -> Option<&'a JsonValue> {
    event.iter().find(|(k, _)| k == field).map(|(_, v)| *v)
}

fn is_operator_map(map: &Map<String, JsonValue>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

fn has_operator(map: &Map<String, JsonValue>) -> bool {
    map.keys().any(|k| k.starts_with('$'))
}

type KeepNested = fn(&Map<String, JsonValue>) -> bool;

/// Flattens nested maps into dotted keys. Empty maps, and maps for which
/// `keep` holds, stay leaves.
///
/// Payloads keep only all-operator maps nested. Conditions keep any map
/// with an operator key so that mixed maps reach `compile_one` and fail.
fn flatten(map: &Map<String, JsonValue>, keep: KeepNested) -> Vec<(String, &JsonValue)> {
    let mut out = Vec::new();
    flatten_into(map, None, keep, &mut out);
    out
}

fn flatten_into<'a>(
    map: &'a Map<String, JsonValue>,
    prefix: Option<&str>,
    keep: KeepNested,
    out: &mut Vec<(String, &'a JsonValue)>,
) {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            JsonValue::Object(inner) if !inner.is_empty() && !keep(inner) => {
                flatten_into(inner, Some(&path), keep, out);
            }
            _ => out.push((path, value)),
        }
    }
}

fn compile_one(key: String, value: &JsonValue) -> Result<Condition, ConditionError> {
    let compile_error = |reason: String| ConditionError::Compile {
        key: key.clone(),
        reason,
    };

    if let (Some(field), JsonValue::String(pattern)) = (key.strip_suffix(PATTERN_SUFFIX), value)
        && !field.is_empty()
    {
        let regex = Regex::new(pattern).map_err(|e| compile_error(e.to_string()))?;
        return Ok(Condition {
            field: field.to_string(),
            predicates: vec![Predicate::Matches(regex)],
        });
    }

    let predicates = match value {
        JsonValue::Object(ops) if is_operator_map(ops) => {
            let mut predicates = Vec::with_capacity(ops.len());
            for (op, operand) in ops {
                predicates.push(compile_operator(op, operand).map_err(compile_error)?);
            }
            predicates
        }
        JsonValue::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
            return Err(compile_error("operators cannot be mixed with field keys".to_string()));
        }
        other => vec![Predicate::Eq(other.clone())],
    };

    Ok(Condition {
        field: key,
        predicates,
    })
}

fn compile_operator(op: &str, operand: &JsonValue) -> Result<Predicate, String> {
    let list = || match operand {
        JsonValue::Array(items) => Ok(items.clone()),
        _ => Err(format!("operand of '{op}' must be an array")),
    };
    Ok(match op {
        "$gt" => Predicate::Gt(operand.clone()),
        "$gte" => Predicate::Gte(operand.clone()),
        "$lt" => Predicate::Lt(operand.clone()),
        "$lte" => Predicate::Lte(operand.clone()),
        "$ne" => Predicate::Ne(operand.clone()),
        "$in" => Predicate::In(list()?),
        "$nin" => Predicate::NotIn(list()?),
        other => return Err(format!("unknown operator '{other}'")),
    })
}

fn test(field: &str, predicate: &Predicate, value: &JsonValue) -> Result<bool, ConditionError> {
    let ordered = |operand: &JsonValue, accept: fn(Ordering) -> bool| {
        compare(value, operand)
            .map(accept)
            .ok_or_else(|| ConditionError::Evaluate {
                key: field.to_string(),
                reason: format!("cannot compare {value} with {operand}"),
            })
    };

    match predicate {
        Predicate::Eq(operand) => Ok(equal(value, operand)),
        Predicate::Ne(operand) => Ok(!equal(value, operand)),
        Predicate::Gt(operand) => ordered(operand, Ordering::is_gt),
        Predicate::Gte(operand) => ordered(operand, Ordering::is_ge),
        Predicate::Lt(operand) => ordered(operand, Ordering::is_lt),
        Predicate::Lte(operand) => ordered(operand, Ordering::is_le),
        Predicate::In(items) => Ok(items.iter().any(|item| equal(value, item))),
        Predicate::NotIn(items) => Ok(!items.iter().any(|item| equal(value, item))),
        Predicate::Matches(regex) => Ok(match value {
            JsonValue::String(s) => regex.is_match(s),
            JsonValue::Number(n) => regex.is_match(&n.to_string()),
            _ => false,
        }),
    }
}

/// Equality with numbers compared by value (`1 == 1.0`).
fn equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

/// Orders two numbers or two strings; anything else is incomparable.
fn compare(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
