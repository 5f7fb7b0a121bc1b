//! Predicate host: validation, compilation and evaluation of user rules
//!
//! A predicate is the body of a function over `profile`, `tweet` and
//! `followingUsers`, written in a small JavaScript-like expression
//! language. It is checked statically and never executed as host code.
//! There are no loops, and evaluation runs under call, depth and step
//! limits, so every evaluation terminates.
//!
//! # Example
//!
//! ```
//! use reply_sweeper::predicate::validate;
//!
//! let report = validate("return profile.followers_count < 100;");
//! assert!(report.is_valid);
//!
//! let report = validate("return profle.followers_count < 100;");
//! assert_eq!(report.error.as_deref(), Some("ReferenceError: profle is not defined"));
//! ```

mod ast;
mod eval;
mod host;
mod lexer;
mod parser;
mod scope;
mod store;
mod value;

pub use host::{validate, Predicate, PredicateInput, Validation};
pub use store::{save_predicate, FileStore, PredicateStore};

use thiserror::Error;

/// Errors raised while compiling or evaluating a predicate
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredicateError {
    #[error("SyntaxError: {message} (at offset {offset})")]
    Syntax { message: String, offset: usize },

    #[error("ReferenceError: {name} is not defined")]
    Reference { name: String },

    #[error("SyntaxError: Identifier '{name}' has already been declared")]
    Redeclared { name: String },

    #[error("TypeError: unknown method '{name}'")]
    UnknownMethod { name: String },

    #[error("{0}")]
    Runtime(String),
}

impl PredicateError {
    pub(crate) fn syntax(message: impl Into<String>, offset: usize) -> Self {
        PredicateError::Syntax {
            message: message.into(),
            offset,
        }
    }
}
