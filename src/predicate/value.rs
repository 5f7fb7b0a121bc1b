//! Runtime values of the predicate language

use crate::predicate::ast::Arrow;
use crate::predicate::eval::Env;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Longest string a predicate may build, in bytes
pub const MAX_STRING_LEN: usize = 1 << 20;

/// A value produced while evaluating a predicate
///
/// Arrays, objects and functions are reference values: equality compares
/// identity, as in JavaScript.
#[derive(Clone)]
pub enum Value<'p> {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<Vec<Value<'p>>>),
    Object(Rc<BTreeMap<String, Value<'p>>>),
    Function(Rc<Closure<'p>>),
}

/// An arrow function together with the scope it was created in
pub struct Closure<'p> {
    pub arrow: &'p Arrow,
    pub env: Env<'p>,
}

impl<'p> Value<'p> {
    pub fn str(text: impl Into<Rc<str>>) -> Self {
        Value::Str(text.into())
    }

    /// Converts decoded JSON into a predicate value
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::str(s.as_str()),
            serde_json::Value::Array(items) => {
                Value::Array(Rc::new(items.iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => Value::Object(Rc::new(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            )),
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// JavaScript truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Name of the value's type, used in runtime error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Numeric conversion following JavaScript's `Number(value)`
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Str(s) => parse_number(s),
            Value::Array(_) => parse_number(&self.to_display()),
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// String conversion following JavaScript's `String(value)`
    ///
    /// Output stops growing once it passes [`MAX_STRING_LEN`].
    pub fn to_display(&self) -> String {
        let mut out = String::new();
        self.display_into(&mut out);
        out
    }

    fn display_into(&self, out: &mut String) {
        if out.len() > MAX_STRING_LEN {
            return;
        }
        match self {
            Value::Undefined => out.push_str("undefined"),
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => out.push_str(&format_number(*n)),
            Value::Str(s) => out.push_str(s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if out.len() > MAX_STRING_LEN {
                        return;
                    }
                    if i > 0 {
                        out.push(',');
                    }
                    if !item.is_nullish() {
                        item.display_into(out);
                    }
                }
            }
            Value::Object(_) => out.push_str("[object Object]"),
            Value::Function(_) => out.push_str("function"),
        }
    }

    /// `===`
    pub fn strict_eq(&self, other: &Value<'p>) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==` for the primitive coercions predicates rely on
    pub fn loose_eq(&self, other: &Value<'p>) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Number(_), Value::Str(_))
            | (Value::Str(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_eq(other),
        }
    }

    /// SameValueZero, used by `includes`
    pub fn same_value_zero(&self, other: &Value<'p>) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_eq(other),
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            other => f.write_str(&other.to_display()),
        }
    }
}

fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c)) => {
            trimmed.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}
