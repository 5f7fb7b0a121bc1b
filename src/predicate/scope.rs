//! Static reference checking of a parsed predicate
//!
//! Every identifier must resolve to one of the predicate parameters, a
//! declaration that precedes it in an enclosing block, or an arrow
//! parameter. A declaration is not visible inside its own initializer, so
//! an arrow cannot name itself; passing one to itself is caught at run
//! time by the evaluator's call limit.

use crate::predicate::ast::{Arrow, ArrowBody, Expr, Program, Stmt};
use crate::predicate::eval::is_known_method;
use crate::predicate::PredicateError;
use std::collections::HashSet;

/// Names bound when the predicate is invoked
pub const PARAMETERS: [&str; 3] = ["profile", "tweet", "followingUsers"];

/// Checks that every identifier and method in `program` resolves
pub fn check(program: &Program) -> Result<(), PredicateError> {
    let mut scopes = Scopes {
        stack: vec![PARAMETERS.iter().map(|p| p.to_string()).collect()],
    };
    scopes.statements(&program.body)
}

struct Scopes {
    stack: Vec<HashSet<String>>,
}

impl Scopes {
    fn is_bound(&self, name: &str) -> bool {
        self.stack.iter().rev().any(|scope| scope.contains(name))
    }

    fn declare(&mut self, name: &str) -> Result<(), PredicateError> {
        let inserted = self
            .stack
            .last_mut()
            .is_some_and(|scope| scope.insert(name.to_string()));
        if !inserted {
            return Err(PredicateError::Redeclared {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn with_scope(
        &mut self,
        names: &[String],
        f: impl FnOnce(&mut Self) -> Result<(), PredicateError>,
    ) -> Result<(), PredicateError> {
        self.stack.push(HashSet::new());
        let result = self.declare_all(names).and_then(|()| f(self));
        self.stack.pop();
        result
    }

    fn declare_all(&mut self, names: &[String]) -> Result<(), PredicateError> {
        for name in names {
            self.declare(name)?;
        }
        Ok(())
    }

    fn statements(&mut self, body: &[Stmt]) -> Result<(), PredicateError> {
        body.iter().try_for_each(|stmt| self.statement(stmt))
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<(), PredicateError> {
        match stmt {
            Stmt::Declare { name, value } => {
                self.expr(value)?;
                self.declare(name)
            }
            Stmt::Return(value) => value.as_ref().map_or(Ok(()), |v| self.expr(v)),
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                self.expr(test)?;
                self.statement(then)?;
                otherwise.as_ref().map_or(Ok(()), |s| self.statement(s))
            }
            Stmt::Block(body) => self.with_scope(&[], |s| s.statements(body)),
            Stmt::Expr(expr) => self.expr(expr),
        }
    }

    fn arrow(&mut self, arrow: &Arrow) -> Result<(), PredicateError> {
        self.with_scope(&arrow.params, |s| match &arrow.body {
            ArrowBody::Expr(expr) => s.expr(expr),
            ArrowBody::Block(body) => s.statements(body),
        })
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), PredicateError> {
        match expr {
            Expr::Literal(_) => Ok(()),
            Expr::Array(elements) => elements.iter().try_for_each(|e| self.expr(e)),
            Expr::Ident(name) => {
                if self.is_bound(name) {
                    Ok(())
                } else {
                    Err(PredicateError::Reference { name: name.clone() })
                }
            }
            Expr::Member { object, .. } => self.expr(object),
            Expr::Index { object, index, .. } => {
                self.expr(object)?;
                self.expr(index)
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
                ..
            } => {
                if !is_known_method(method) {
                    return Err(PredicateError::UnknownMethod {
                        name: method.clone(),
                    });
                }
                self.expr(receiver)?;
                args.iter().try_for_each(|a| self.expr(a))
            }
            Expr::Call { callee, args } => {
                self.expr(callee)?;
                args.iter().try_for_each(|a| self.expr(a))
            }
            Expr::Arrow(arrow) => self.arrow(arrow),
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.expr(left)?;
                self.expr(right)
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                self.expr(test)?;
                self.expr(then)?;
                self.expr(otherwise)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::parser::parse;

    fn check_source(source: &str) -> Result<(), PredicateError> {
        check(&parse(source).unwrap())
    }

    #[test]
    fn test_parameters_and_declarations_resolve() {
        assert!(check_source(
            "const names = followingUsers.map(u => u.screenName.toLowerCase());\n\
             return names.includes(\"bot123\") || profile.followers_count < 100"
        )
        .is_ok());
    }

    #[test]
    fn test_unknown_identifier() {
        match check_source("return profle.followers_count < 100") {
            Err(PredicateError::Reference { name }) => assert_eq!(name, "profle"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_declaration_not_visible_in_own_initializer() {
        assert!(matches!(
            check_source("const f = x => f(x); return f(1)"),
            Err(PredicateError::Reference { .. })
        ));
    }

    #[test]
    fn test_block_scoping() {
        assert!(matches!(
            check_source("if (true) { const a = 1 } return a"),
            Err(PredicateError::Reference { .. })
        ));
        assert!(check_source("const a = 1; { const a = 2 } return a").is_ok());
    }

    #[test]
    fn test_redeclaration_and_parameter_shadowing() {
        assert!(matches!(
            check_source("const a = 1; const a = 2"),
            Err(PredicateError::Redeclared { .. })
        ));
        assert!(matches!(
            check_source("const tweet = 1"),
            Err(PredicateError::Redeclared { .. })
        ));
    }

    #[test]
    fn test_unknown_method() {
        match check_source("return tweet.full_text.matchAll(\"x\")") {
            Err(PredicateError::UnknownMethod { name }) => assert_eq!(name, "matchAll"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
