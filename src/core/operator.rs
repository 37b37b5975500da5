//! Operator tokens and the ordered registry used to recognise them
//!
//! A raw condition such as `<>1000` or `1..5` carries its comparison kind as a literal
//! token. Tokens are matched by substring containment and the registry order is the
//! match priority: `<=` must be tried before `<`, and the equality operator, whose token
//! is empty and therefore matches everything, must come last.
//!
//! The registry is a plain value owned by the [`QueryMapper`](crate::core::QueryMapper)
//! that uses it. Custom orderings are built once at startup (see
//! [`OperatorRegistry::builder`]) and shared read-only afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::QueryError;

/// Case-insensitivity marker prefixed to a value segment
pub const IGNORE_CASE_MARKER: char = '^';

/// The comparison a clause performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorKind {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Range,
    Or,
}

impl OperatorKind {
    /// The token this kind uses in the default registry
    pub fn default_token(&self) -> &'static str {
        match self {
            OperatorKind::Equal => "",
            OperatorKind::NotEqual => "<>",
            OperatorKind::Less => "<",
            OperatorKind::LessOrEqual => "<=",
            OperatorKind::Greater => ">",
            OperatorKind::GreaterOrEqual => ">=",
            OperatorKind::Range => "..",
            OperatorKind::Or => "|",
        }
    }

    /// Whether the operator splits its condition into several values
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, OperatorKind::Range | OperatorKind::Or)
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperatorKind::Equal => "EQUAL",
            OperatorKind::NotEqual => "NOT_EQUAL",
            OperatorKind::Less => "LESS",
            OperatorKind::LessOrEqual => "LESS_OR_EQUAL",
            OperatorKind::Greater => "GREATER",
            OperatorKind::GreaterOrEqual => "GREATER_OR_EQUAL",
            OperatorKind::Range => "RANGE",
            OperatorKind::Or => "OR",
        };
        write!(f, "{}", name)
    }
}

/// A token and the comparison it stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorDescriptor {
    pub token: String,
    pub kind: OperatorKind,
}

impl OperatorDescriptor {
    pub fn new(token: impl Into<String>, kind: OperatorKind) -> Self {
        Self {
            token: token.into(),
            kind,
        }
    }

    /// Descriptor using the kind's default token
    pub fn of(kind: OperatorKind) -> Self {
        Self::new(kind.default_token(), kind)
    }

    /// Whether this operator's token occurs anywhere in the condition
    pub fn matches(&self, condition: &str) -> bool {
        condition.contains(self.token.as_str())
    }
}

/// Ordered list of operators; earlier entries win
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorRegistry {
    operators: Vec<OperatorDescriptor>,
}

impl Default for OperatorRegistry {
    /// `<=`, `>=`, `<>`, `<`, `>`, `..`, `|`, then the empty equality token
    fn default() -> Self {
        Self {
            operators: vec![
                OperatorDescriptor::of(OperatorKind::LessOrEqual),
                OperatorDescriptor::of(OperatorKind::GreaterOrEqual),
                OperatorDescriptor::of(OperatorKind::NotEqual),
                OperatorDescriptor::of(OperatorKind::Less),
                OperatorDescriptor::of(OperatorKind::Greater),
                OperatorDescriptor::of(OperatorKind::Range),
                OperatorDescriptor::of(OperatorKind::Or),
                OperatorDescriptor::of(OperatorKind::Equal),
            ],
        }
    }
}

impl OperatorRegistry {
    /// Registry with no operators at all
    pub fn empty() -> Self {
        Self {
            operators: Vec::new(),
        }
    }

    /// Start a custom ordering from the default one
    pub fn builder() -> OperatorRegistryBuilder {
        OperatorRegistryBuilder {
            registry: Self::default(),
        }
    }

    /// Find the first operator whose token is contained in `condition`
    pub fn find_applicable(
        &self,
        field: &str,
        condition: &str,
    ) -> Result<&OperatorDescriptor, QueryError> {
        self.operators
            .iter()
            .find(|operator| operator.matches(condition))
            .ok_or_else(|| QueryError::UnrecognizedOperator {
                field: field.to_string(),
                condition: condition.to_string(),
            })
    }

    /// Insert an operator at `priority`; no conflict detection is performed
    ///
    /// `priority` past the end appends.
    pub fn register(&mut self, descriptor: OperatorDescriptor, priority: usize) {
        let index = priority.min(self.operators.len());
        self.operators.insert(index, descriptor);
    }

    /// Remove the operator at `index`, returning it
    pub fn remove(&mut self, index: usize) -> Option<OperatorDescriptor> {
        (index < self.operators.len()).then(|| self.operators.remove(index))
    }

    /// Token registered for `kind`, first match in priority order
    pub fn token_for(&self, kind: OperatorKind) -> Option<&str> {
        self.operators
            .iter()
            .find(|operator| operator.kind == kind)
            .map(|operator| operator.token.as_str())
    }

    pub fn operators(&self) -> &[OperatorDescriptor] {
        &self.operators
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Builder for a custom operator ordering
#[derive(Debug, Clone)]
pub struct OperatorRegistryBuilder {
    registry: OperatorRegistry,
}

impl OperatorRegistryBuilder {
    /// Start from an empty list instead of the default ordering
    pub fn clear(mut self) -> Self {
        self.registry = OperatorRegistry::empty();
        self
    }

    /// Insert `descriptor` at `priority`
    pub fn insert(mut self, descriptor: OperatorDescriptor, priority: usize) -> Self {
        self.registry.register(descriptor, priority);
        self
    }

    /// Append `descriptor` with the lowest priority
    pub fn push(mut self, descriptor: OperatorDescriptor) -> Self {
        let len = self.registry.len();
        self.registry.register(descriptor, len);
        self
    }

    /// Remove the operator at `index`
    pub fn remove(mut self, index: usize) -> Self {
        self.registry.remove(index);
        self
    }

    pub fn build(self) -> OperatorRegistry {
        self.registry
    }
}
