//! Tree-walking evaluator for predicate programs

use crate::predicate::ast::{
    ArrowBody, BinaryOp, Expr, Literal, LogicalOp, Program, Stmt, UnaryOp,
};
use crate::predicate::value::{Closure, Value, MAX_STRING_LEN};
use crate::predicate::PredicateError;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Built-in methods callable on strings and arrays
const KNOWN_METHODS: &[&str] = &[
    "includes",
    "startsWith",
    "endsWith",
    "toLowerCase",
    "toUpperCase",
    "trim",
    "indexOf",
    "split",
    "some",
    "every",
    "filter",
    "map",
    "find",
    "join",
];

/// Returns true if `name` is a built-in method
pub fn is_known_method(name: &str) -> bool {
    KNOWN_METHODS.contains(&name)
}

/// Maximum number of nested arrow calls
pub const MAX_CALL_DEPTH: usize = 64;

/// Maximum nesting of expression evaluation, summed across calls
const MAX_EVAL_DEPTH: usize = 256;

/// Maximum number of expressions evaluated in one run
const MAX_STEPS: usize = 1_000_000;

/// A lexical scope
pub struct Scope<'p> {
    vars: RefCell<HashMap<String, Value<'p>>>,
    parent: Option<Env<'p>>,
}

pub type Env<'p> = Rc<Scope<'p>>;

impl<'p> Scope<'p> {
    fn root(bindings: Vec<(&str, Value<'p>)>) -> Env<'p> {
        Rc::new(Scope {
            vars: RefCell::new(
                bindings
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect(),
            ),
            parent: None,
        })
    }

    fn child(parent: &Env<'p>) -> Env<'p> {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    fn define(&self, name: &str, value: Value<'p>) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    fn lookup(&self, name: &str) -> Option<Value<'p>> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }
}

enum Flow<'p> {
    Normal,
    Return(Value<'p>),
}

/// Runs `program` with the given parameter bindings and returns the
/// value of the first executed `return`, or `undefined`
pub fn run<'p>(
    program: &'p Program,
    bindings: Vec<(&str, Value<'p>)>,
) -> Result<Value<'p>, PredicateError> {
    let interpreter = Interpreter::default();
    let env = Scope::root(bindings);
    match interpreter.statements(&program.body, &env)? {
        Flow::Return(value) => Ok(value),
        Flow::Normal => Ok(Value::Undefined),
    }
}

/// Evaluation state for one run
///
/// Bounds call depth, expression depth and the total number of evaluated
/// expressions, so self-application fails with a runtime error instead of
/// exhausting the stack or running for ever. Scopes captured by closures are emptied on drop;
/// a closure stored in the scope it captured would otherwise keep that
/// scope alive forever.
#[derive(Default)]
struct Interpreter<'p> {
    calls: Cell<usize>,
    depth: Cell<usize>,
    steps: Cell<usize>,
    captured: RefCell<Vec<Env<'p>>>,
}

/// Decrements a depth counter when dropped
struct Frame<'a>(&'a Cell<usize>);

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

fn enter(counter: &Cell<usize>, limit: usize) -> Result<Frame<'_>, PredicateError> {
    if counter.get() >= limit {
        return Err(PredicateError::Runtime(
            "Maximum call stack size exceeded".to_string(),
        ));
    }
    counter.set(counter.get() + 1);
    Ok(Frame(counter))
}

impl Drop for Interpreter<'_> {
    fn drop(&mut self) {
        for env in self.captured.get_mut().drain(..) {
            let mut scope = Some(env);
            while let Some(current) = scope {
                drop(current.vars.take());
                scope = current.parent.clone();
            }
        }
    }
}

impl<'p> Interpreter<'p> {
    fn statements(&self, body: &'p [Stmt], env: &Env<'p>) -> Result<Flow<'p>, PredicateError> {
        for stmt in body {
            if let Flow::Return(value) = self.statement(stmt, env)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn statement(&self, stmt: &'p Stmt, env: &Env<'p>) -> Result<Flow<'p>, PredicateError> {
        match stmt {
            Stmt::Declare { name, value } => {
                let value = self.eval(value, env)?;
                env.define(name, value);
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                if self.eval(test, env)?.is_truthy() {
                    self.statement(then, env)
                } else if let Some(otherwise) = otherwise {
                    self.statement(otherwise, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Block(body) => self.statements(body, &Scope::child(env)),
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn eval(&self, expr: &'p Expr, env: &Env<'p>) -> Result<Value<'p>, PredicateError> {
        let _frame = enter(&self.depth, MAX_EVAL_DEPTH)?;
        self.steps.set(self.steps.get() + 1);
        if self.steps.get() > MAX_STEPS {
            return Err(PredicateError::Runtime(
                "Predicate exceeded its evaluation budget".to_string(),
            ));
        }

        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Undefined => Value::Undefined,
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::str(s.as_str()),
            }),
            Expr::Array(elements) => {
                let items = self.arguments(elements, env)?;
                Ok(Value::Array(Rc::new(items)))
            }
            Expr::Ident(name) => env
                .lookup(name)
                .ok_or_else(|| PredicateError::Runtime(format!("{} is not defined", name))),
            Expr::Member { .. } | Expr::Index { .. } | Expr::MethodCall { .. } => {
                Ok(self.chain(expr, env)?.unwrap_or(Value::Undefined))
            }
            Expr::Call { callee, args } => {
                let callee = self.eval(callee, env)?;
                let args = self.arguments(args, env)?;
                match callee {
                    Value::Function(closure) => self.call(&closure, args),
                    other => Err(PredicateError::Runtime(format!(
                        "{} is not a function",
                        other.type_name()
                    ))),
                }
            }
            Expr::Arrow(arrow) => {
                self.captured.borrow_mut().push(Rc::clone(env));
                Ok(Value::Function(Rc::new(Closure {
                    arrow,
                    env: Rc::clone(env),
                })))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, env)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, env)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right, env)
                }
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                if self.eval(test, env)?.is_truthy() {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
        }
    }

    /// Evaluates a member/index/method chain; `None` means an optional link
    /// met `null` or `undefined` and the rest of the chain was skipped
    fn chain(
        &self,
        expr: &'p Expr,
        env: &Env<'p>,
    ) -> Result<Option<Value<'p>>, PredicateError> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(object) = self.chain(object, env)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                property_of(&object, property).map(Some)
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                let Some(object) = self.chain(object, env)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                let index = self.eval(index, env)?;
                index_of(&object, &index).map(Some)
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
                optional,
            } => {
                let Some(receiver) = self.chain(receiver, env)? else {
                    return Ok(None);
                };
                if *optional && receiver.is_nullish() {
                    return Ok(None);
                }
                let args = self.arguments(args, env)?;
                self.call_method(&receiver, method, args).map(Some)
            }
            other => self.eval(other, env).map(Some),
        }
    }

    fn arguments(
        &self,
        args: &'p [Expr],
        env: &Env<'p>,
    ) -> Result<Vec<Value<'p>>, PredicateError> {
        args.iter().map(|a| self.eval(a, env)).collect()
    }

    fn call(
        &self,
        closure: &Closure<'p>,
        args: Vec<Value<'p>>,
    ) -> Result<Value<'p>, PredicateError> {
        let _frame = enter(&self.calls, MAX_CALL_DEPTH)?;

        let env = Scope::child(&closure.env);
        let mut args = args.into_iter();
        for param in &closure.arrow.params {
            env.define(param, args.next().unwrap_or(Value::Undefined));
        }

        match &closure.arrow.body {
            ArrowBody::Expr(expr) => self.eval(expr, &env),
            ArrowBody::Block(body) => match self.statements(body, &env)? {
                Flow::Return(value) => Ok(value),
                Flow::Normal => Ok(Value::Undefined),
            },
        }
    }

    fn call_method(
        &self,
        receiver: &Value<'p>,
        method: &str,
        args: Vec<Value<'p>>,
    ) -> Result<Value<'p>, PredicateError> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);

        match receiver {
            Value::Undefined | Value::Null => Err(cannot_read(receiver, method)),
            Value::Str(s) => {
                let needle = || arg(0).to_display();
                Ok(match method {
                    "includes" => Value::Bool(s.contains(needle().as_str())),
                    "startsWith" => Value::Bool(s.starts_with(needle().as_str())),
                    "endsWith" => Value::Bool(s.ends_with(needle().as_str())),
                    "toLowerCase" => Value::str(s.to_lowercase()),
                    "toUpperCase" => Value::str(s.to_uppercase()),
                    "trim" => Value::str(s.trim()),
                    "indexOf" => Value::Number(
                        s.find(needle().as_str())
                            .map(|byte| s[..byte].chars().count() as f64)
                            .unwrap_or(-1.0),
                    ),
                    "split" => {
                        let parts: Vec<Value<'p>> = match arg(0) {
                            Value::Undefined => vec![Value::Str(Rc::clone(s))],
                            separator => {
                                let separator = separator.to_display();
                                if separator.is_empty() {
                                    s.chars().map(|c| Value::str(c.to_string())).collect()
                                } else {
                                    s.split(separator.as_str()).map(Value::str).collect()
                                }
                            }
                        };
                        Value::Array(Rc::new(parts))
                    }
                    _ => return Err(not_a_function(receiver, method)),
                })
            }
            Value::Array(items) => match method {
                "includes" => {
                    let needle = arg(0);
                    Ok(Value::Bool(items.iter().any(|v| v.same_value_zero(&needle))))
                }
                "indexOf" => {
                    let needle = arg(0);
                    Ok(Value::Number(
                        items
                            .iter()
                            .position(|v| v.strict_eq(&needle))
                            .map(|i| i as f64)
                            .unwrap_or(-1.0),
                    ))
                }
                "join" => {
                    let separator = match arg(0) {
                        Value::Undefined => ",".to_string(),
                        other => other.to_display(),
                    };
                    let mut text = String::new();
                    for (i, v) in items.iter().enumerate() {
                        if text.len() > MAX_STRING_LEN {
                            break;
                        }
                        if i > 0 {
                            text.push_str(&separator);
                        }
                        if !v.is_nullish() {
                            text.push_str(&v.to_display());
                        }
                    }
                    bounded(text)
                }
                "some" | "every" | "filter" | "map" | "find" => {
                    let Value::Function(callback) = arg(0) else {
                        return Err(PredicateError::Runtime(format!(
                            "{} is not a function",
                            arg(0).type_name()
                        )));
                    };
                    self.iterate(items, method, &callback)
                }
                _ => Err(not_a_function(receiver, method)),
            },
            _ => Err(not_a_function(receiver, method)),
        }
    }

    fn iterate(
        &self,
        items: &[Value<'p>],
        method: &str,
        callback: &Closure<'p>,
    ) -> Result<Value<'p>, PredicateError> {
        let invoke = |i: usize, item: &Value<'p>| {
            self.call(callback, vec![item.clone(), Value::Number(i as f64)])
        };

        match method {
            "some" => {
                for (i, item) in items.iter().enumerate() {
                    if invoke(i, item)?.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            "every" => {
                for (i, item) in items.iter().enumerate() {
                    if !invoke(i, item)?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            "find" => {
                for (i, item) in items.iter().enumerate() {
                    if invoke(i, item)?.is_truthy() {
                        return Ok(item.clone());
                    }
                }
                Ok(Value::Undefined)
            }
            "filter" => {
                let mut kept = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    if invoke(i, item)?.is_truthy() {
                        kept.push(item.clone());
                    }
                }
                Ok(Value::Array(Rc::new(kept)))
            }
            _ => {
                let mapped = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| invoke(i, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(Rc::new(mapped)))
            }
        }
    }
}

fn cannot_read(object: &Value<'_>, property: &str) -> PredicateError {
    PredicateError::Runtime(format!(
        "Cannot read properties of {} (reading '{}')",
        object.type_name(),
        property
    ))
}

fn property_of<'p>(object: &Value<'p>, property: &str) -> Result<Value<'p>, PredicateError> {
    Ok(match object {
        Value::Undefined | Value::Null => return Err(cannot_read(object, property)),
        Value::Str(s) if property == "length" => Value::Number(s.chars().count() as f64),
        Value::Array(items) if property == "length" => Value::Number(items.len() as f64),
        Value::Array(items) => property
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Undefined),
        Value::Object(map) => map.get(property).cloned().unwrap_or(Value::Undefined),
        _ => Value::Undefined,
    })
}

fn index_of<'p>(object: &Value<'p>, index: &Value<'p>) -> Result<Value<'p>, PredicateError> {
    match (object, index) {
        (Value::Array(items), Value::Number(n)) => Ok(position(*n)
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Undefined)),
        (Value::Str(s), Value::Number(n)) => Ok(position(*n)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::str(c.to_string()))
            .unwrap_or(Value::Undefined)),
        _ => property_of(object, &index.to_display()),
    }
}

fn position(n: f64) -> Option<usize> {
    if n >= 0.0 && n.fract() == 0.0 && n < usize::MAX as f64 {
        Some(n as usize)
    } else {
        None
    }
}

fn binary<'p>(
    op: BinaryOp,
    left: &Value<'p>,
    right: &Value<'p>,
) -> Result<Value<'p>, PredicateError> {
    Ok(match op {
        BinaryOp::Add => {
            let textual = |v: &Value<'p>| {
                matches!(v, Value::Str(_) | Value::Array(_) | Value::Object(_))
            };
            if textual(left) || textual(right) {
                let mut text = left.to_display();
                text.push_str(&right.to_display());
                bounded(text)?
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            Value::Bool(match ordering {
                None => false,
                Some(ordering) => match op {
                    BinaryOp::Less => ordering.is_lt(),
                    BinaryOp::LessEq => ordering.is_le(),
                    BinaryOp::Greater => ordering.is_gt(),
                    _ => ordering.is_ge(),
                },
            })
        }
        BinaryOp::LooseEq => Value::Bool(left.loose_eq(right)),
        BinaryOp::LooseNotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_eq(right)),
    })
}

fn bounded<'p>(text: String) -> Result<Value<'p>, PredicateError> {
    if text.len() > MAX_STRING_LEN {
        return Err(PredicateError::Runtime("Invalid string length".to_string()));
    }
    Ok(Value::str(text))
}

fn not_a_function(receiver: &Value<'_>, method: &str) -> PredicateError {
    PredicateError::Runtime(format!(
        "{}.{} is not a function",
        receiver.type_name(),
        method
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::parser::parse;
    use serde_json::json;

    fn eval_source(source: &str) -> Result<String, PredicateError> {
        let program = parse(source).unwrap();
        let input = json!({
            "profile": {"name": "Spam Bot", "screen_name": "spambot", "followers_count": 12},
            "tweet": {"full_text": "Buy cheap spam now", "id_str": "42"},
            "followingUsers": [
                {"screenName": "Alice", "isBlocked": false},
                {"screenName": "bot123", "isBlocked": true}
            ]
        });
        let bindings = ["profile", "tweet", "followingUsers"]
            .into_iter()
            .map(|name| (name, Value::from_json(&input[name])))
            .collect();
        run(&program, bindings).map(|v| format!("{:?}", v))
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(eval_source(r#"return tweet.full_text.includes("spam")"#).unwrap(), "true");
        assert_eq!(
            eval_source("return profile.screen_name.toUpperCase().startsWith('SPAM')").unwrap(),
            "true"
        );
        assert_eq!(
            eval_source("return tweet.full_text.split(' ').length").unwrap(),
            "4"
        );
        assert_eq!(eval_source("return tweet.full_text.indexOf('cheap')").unwrap(), "4");
    }

    #[test]
    fn test_array_callbacks() {
        assert_eq!(
            eval_source(
                "const names = followingUsers.map(u => u.screenName.toLowerCase());\n\
                 return names.includes(\"bot123\");"
            )
            .unwrap(),
            "true"
        );
        assert_eq!(
            eval_source("return followingUsers.filter(u => !u.isBlocked).length").unwrap(),
            "1"
        );
        assert_eq!(
            eval_source("return followingUsers.every((u, i) => i < 2)").unwrap(),
            "true"
        );
        assert_eq!(
            eval_source("return followingUsers.find(u => u.isBlocked).screenName").unwrap(),
            "\"bot123\""
        );
    }

    #[test]
    fn test_control_flow_and_logic() {
        assert_eq!(
            eval_source("if (profile.followers_count < 100) { return 'low' } else return 'high'")
                .unwrap(),
            "\"low\""
        );
        assert_eq!(eval_source("const x = 1").unwrap(), "undefined");
        assert_eq!(eval_source("return profile.missing ?? 'fallback'").unwrap(), "\"fallback\"");
        assert_eq!(eval_source("return 0 || '' || 'last'").unwrap(), "\"last\"");
        assert_eq!(eval_source("return 1 && 2").unwrap(), "2");
        assert_eq!(eval_source("return 'n=' + 1 + 2").unwrap(), "\"n=12\"");
        assert_eq!(eval_source("return 7 % 4 * -1").unwrap(), "-3");
        assert_eq!(eval_source("return true ? 'a' : 'b'").unwrap(), "\"a\"");
    }

    #[test]
    fn test_optional_chaining_short_circuits() {
        assert_eq!(
            eval_source("return profile.location?.city.toLowerCase()").unwrap(),
            "undefined"
        );
        assert_eq!(eval_source("return followingUsers[5]?.screenName").unwrap(), "undefined");
        assert_eq!(eval_source("return followingUsers[1]['screenName']").unwrap(), "\"bot123\"");
    }

    #[test]
    fn test_runtime_errors() {
        match eval_source("return profile.location.city") {
            Err(PredicateError::Runtime(message)) => {
                assert_eq!(message, "Cannot read properties of undefined (reading 'city')")
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(matches!(
            eval_source("return profile.followers_count.includes(1)"),
            Err(PredicateError::Runtime(_))
        ));
        assert!(matches!(
            eval_source("return followingUsers.some(1)"),
            Err(PredicateError::Runtime(_))
        ));
        assert!(matches!(
            eval_source("const n = 3; return n(1)"),
            Err(PredicateError::Runtime(_))
        ));
    }

    #[test]
    fn test_self_application_hits_call_limit() {
        match eval_source("const f = g => g(g);\nreturn f(f);") {
            Err(PredicateError::Runtime(message)) => {
                assert_eq!(message, "Maximum call stack size exceeded")
            }
            other => panic!("unexpected result: {:?}", other),
        }

        // Bounded recursion below the limit still works
        assert_eq!(
            eval_source("const f = (g, n) => n > 0 ? g(g, n - 1) + 1 : 0;\nreturn f(f, 10)")
                .unwrap(),
            "10"
        );
    }

    #[test]
    fn test_exponential_calls_exhaust_budget() {
        let result = eval_source(
            "const f = (g, n) => n > 0 ? g(g, n - 1) + g(g, n - 1) : 1;\nreturn f(f, 40)",
        );
        assert_eq!(
            result,
            Err(PredicateError::Runtime(
                "Predicate exceeded its evaluation budget".to_string()
            ))
        );
    }

    #[test]
    fn test_string_growth_is_bounded() {
        let result = eval_source(
            "const f = (g, s, n) => n > 0 ? g(g, s + s, n - 1) : s.length;\n\
             return f(f, 'ab', 40)",
        );
        assert_eq!(
            result,
            Err(PredicateError::Runtime("Invalid string length".to_string()))
        );
        assert_eq!(
            eval_source("const f = (g, s, n) => n > 0 ? g(g, s + s, n - 1) : s.length;\n\
                         return f(f, 'ab', 4)")
            .unwrap(),
            "32"
        );
    }

    #[test]
    fn test_captured_scopes_are_released() {
        let program = parse("const f = x => x;\nreturn f").unwrap();
        let Value::Function(closure) = run(&program, Vec::new()).unwrap() else {
            panic!("expected a function");
        };
        assert_eq!(Rc::strong_count(&closure), 1);
        assert!(closure.env.vars.borrow().is_empty());
    }

    #[test]
    fn test_closures_capture_scope() {
        assert_eq!(
            eval_source(
                "const limit = 1;\n\
                 const tooMany = list => list.length > limit;\n\
                 return tooMany(followingUsers)"
            )
            .unwrap(),
            "true"
        );
    }
}
