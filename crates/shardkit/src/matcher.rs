//! Placement rules compiled into module predicates
//!
//! A [`Matcher`] is a set of attribute rules. Alternatives inside one
//! attribute's rule are OR-ed, and so are the attributes themselves: a module
//! matches when any declared attribute rule matches, so
//! `{ path = "...", id = "..." }` widens a splitter rather than narrowing it.

use std::{fmt, sync::Arc};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Module;

/// Rule applied when a splitter declares no match: any module whose name
/// starts with a word character
static DEFAULT_NAME_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+").expect("default name rule is a valid regex"));

/// A single rule value tested against one attribute
#[derive(Debug, Clone)]
pub enum Rule {
    /// Exact equality
    Literal(String),
    /// Regular expression search
    Pattern(Regex),
    /// Matches when any alternative matches
    AnyOf(Vec<Rule>),
}

impl Rule {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        let regex =
            Regex::new(pattern).with_context(|| format!("Invalid match pattern `{pattern}`"))?;
        Ok(Self::Pattern(regex))
    }

    pub fn any_of(rules: impl IntoIterator<Item = Self>) -> Self {
        Self::AnyOf(rules.into_iter().collect())
    }

    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == value,
            Self::Pattern(regex) => regex.is_match(value),
            Self::AnyOf(rules) => rules.iter().any(|rule| rule.is_match(value)),
        }
    }
}

impl From<Regex> for Rule {
    fn from(regex: Regex) -> Self {
        Self::Pattern(regex)
    }
}

type Predicate = Arc<dyn Fn(&Module) -> bool + Send + Sync>;

/// Compiled predicate over a module's attributes
#[derive(Clone)]
pub enum Matcher {
    /// Attribute name to rule, OR-ed together
    Attributes(Vec<(String, Rule)>),
    /// Caller supplied predicate
    Predicate(Predicate),
}

impl Matcher {
    pub fn from_attributes<S: Into<String>>(rules: impl IntoIterator<Item = (S, Rule)>) -> Self {
        Self::Attributes(
            rules
                .into_iter()
                .map(|(attribute, rule)| (attribute.into(), rule))
                .collect(),
        )
    }

    /// Matcher over the `path` attribute only
    pub fn from_paths(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self::from_attributes([("path", Rule::any_of(rules))])
    }

    pub fn from_fn(predicate: impl Fn(&Module) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(predicate))
    }

    pub fn is_match(&self, module: &Module) -> bool {
        match self {
            Self::Attributes(rules) => rules.iter().any(|(attribute, rule)| {
                module
                    .attribute(attribute)
                    .is_some_and(|value| rule.is_match(value))
            }),
            Self::Predicate(predicate) => predicate(module),
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::from_attributes([("name", Rule::Pattern(DEFAULT_NAME_RULE.clone()))])
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attributes(rules) => f.debug_tuple("Attributes").field(rules).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
