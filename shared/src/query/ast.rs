//! Syntax tree for stream selectors.

use serde::{Deserialize, Serialize};

/// Label matching operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOp {
    /// Equal (=)
    Eq,
    /// Not equal (!=)
    NotEq,
    /// Regex match (=~)
    Regex,
    /// Negated regex match (!~)
    NotRegex,
}

impl std::fmt::Display for MatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::NotEq => write!(f, "!="),
            Self::Regex => write!(f, "=~"),
            Self::NotRegex => write!(f, "!~"),
        }
    }
}

/// A single `label op "value"` filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelFilter {
    /// The label name.
    pub label: String,
    /// The matching operator.
    pub op: MatchOp,
    /// The unescaped value.
    pub value: String,
}

impl LabelFilter {
    /// Creates a new label filter.
    #[must_use]
    pub fn new(label: impl Into<String>, op: MatchOp, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            op,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{:?}", self.label, self.op, self.value)
    }
}

/// A parsed stream selector such as `{app="api",env="prod"}`.
///
/// Filters inside a group are joined by AND; groups are joined by `or`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSelector {
    /// The filter groups.
    pub groups: Vec<Vec<LabelFilter>>,
}

impl StreamSelector {
    /// Returns every `(label, value)` pair in the selector, in source order.
    pub fn label_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.groups
            .iter()
            .flatten()
            .map(|f| (f.label.as_str(), f.value.as_str()))
    }

    /// Returns `true` if the selector has no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty)
    }
}

impl std::fmt::Display for StreamSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                write!(f, " or ")?;
            }
            for (j, filter) in group.iter().enumerate() {
                if j > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{filter}")?;
            }
        }
        write!(f, "}}")
    }
}
