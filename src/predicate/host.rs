//! Compiled predicates and their evaluation
//!
//! A predicate is compiled once per run and then evaluated for each
//! replier. Evaluation is fail-closed: any runtime error, including an
//! exhausted call or step budget, means "do not block".

use crate::crawler::FollowingEdge;
use crate::predicate::ast::Program;
use crate::predicate::eval::run;
use crate::predicate::parser::parse;
use crate::predicate::scope::{check, PARAMETERS};
use crate::predicate::value::Value;
use crate::predicate::PredicateError;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Outcome of validating predicate source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub is_valid: bool,
    pub error: Option<String>,
}

/// Validates predicate source text without keeping anything around
///
/// Syntax errors, unresolved identifiers and unknown methods are reported
/// as a message; nothing is evaluated.
pub fn validate(source: &str) -> Validation {
    match Predicate::compile(source) {
        Ok(_) => Validation {
            is_valid: true,
            error: None,
        },
        Err(e) => Validation {
            is_valid: false,
            error: Some(e.to_string()),
        },
    }
}

/// Read-only data a predicate decides on
#[derive(Debug, Clone)]
pub struct PredicateInput {
    /// Profile record of the reply's author
    pub profile: serde_json::Value,
    /// The reply itself
    pub tweet: serde_json::Value,
    /// Accounts the author follows
    pub following_users: Vec<FollowingEdge>,
}

/// A compiled predicate, built once per run
#[derive(Debug, Clone)]
pub struct Predicate {
    source: String,
    program: Program,
}

impl Predicate {
    /// Parses and checks `source`
    pub fn compile(source: &str) -> Result<Self, PredicateError> {
        let program = parse(source)?;
        check(&program)?;
        Ok(Self {
            source: source.to_string(),
            program,
        })
    }

    /// The source text this predicate was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Short SHA-256 fingerprint of the source, for logs
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.source.as_bytes());
        hex::encode(&digest[..6])
    }

    /// Evaluates the predicate, returning its truthiness
    pub fn evaluate(&self, input: &PredicateInput) -> Result<bool, PredicateError> {
        let following: Vec<Value<'_>> = input
            .following_users
            .iter()
            .map(|edge| {
                let mut fields = BTreeMap::new();
                fields.insert("screenName".to_string(), Value::str(edge.screen_name.as_str()));
                fields.insert("isBlocked".to_string(), Value::Bool(edge.is_blocked));
                Value::Object(Rc::new(fields))
            })
            .collect();

        let [profile, tweet, following_users] = PARAMETERS;
        let bindings = vec![
            (profile, Value::from_json(&input.profile)),
            (tweet, Value::from_json(&input.tweet)),
            (following_users, Value::Array(Rc::new(following))),
        ];

        run(&self.program, bindings).map(|value| value.is_truthy())
    }

    /// Decides whether to block, treating any runtime error as "no"
    pub fn should_block(&self, input: &PredicateInput) -> bool {
        match self.evaluate(input) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!("Predicate error, not blocking: {}", e);
                false
            }
        }
    }
}
