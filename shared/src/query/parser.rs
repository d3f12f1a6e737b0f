//! Stream selector parser using nom.
//!
//! Parses selectors like:
//! - `{}`
//! - `{app="api"}`
//! - `{app="api", env=~"prod|staging"}`
//! - `{app="api" or app="web"}`
//! - `http_requests{method!="GET"}`

use super::ast::{LabelFilter, MatchOp, StreamSelector};
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, tag_no_case, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, map, opt, recognize, value},
    multi::separated_list1,
    sequence::{delimited, pair, terminated},
    IResult, Parser,
};
use thiserror::Error;

/// Label that carries the optional name in front of the braces.
pub const NAME_LABEL: &str = "__name__";

/// Errors that can occur during selector parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// The selector is empty.
    #[error("Empty stream selector")]
    Empty,

    /// The selector syntax is invalid.
    #[error("Invalid stream selector '{input}': {reason}")]
    SyntaxError {
        /// The selector that failed to parse.
        input: String,
        /// What went wrong.
        reason: String,
    },
}

/// Turns a selector string into label filters.
///
/// This is the seam where a different query language can plug in its own
/// selector grammar.
pub trait SelectorParser: Send + Sync {
    /// Parses a selector string.
    ///
    /// # Errors
    ///
    /// Returns a `SelectorError` if the selector is malformed.
    fn parse(&self, selector: &str) -> Result<StreamSelector, SelectorError>;
}

/// Parser for LogsQL / MetricsQL style stream selectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogsqlSelectorParser;

impl SelectorParser for LogsqlSelectorParser {
    fn parse(&self, selector: &str) -> Result<StreamSelector, SelectorError> {
        parse_selector(selector)
    }
}

/// Parses a stream selector string.
///
/// # Errors
///
/// Returns a `SelectorError` if the input is empty or malformed.
///
/// # Examples
///
/// ```
/// use shared::query::parse_selector;
///
/// let selector = parse_selector(r#"{app="api",env="prod"}"#).unwrap();
/// let pairs: Vec<_> = selector.label_pairs().collect();
/// assert_eq!(pairs, vec![("app", "api"), ("env", "prod")]);
/// ```
pub fn parse_selector(input: &str) -> Result<StreamSelector, SelectorError> {
    if input.trim().is_empty() {
        return Err(SelectorError::Empty);
    }

    all_consuming(selector)
        .parse(input)
        .map(|(_, selector)| selector)
        .map_err(|e| SelectorError::SyntaxError {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

// ============================================================================
// Selector
// ============================================================================

fn selector(input: &str) -> IResult<&str, StreamSelector> {
    map(
        (
            multispace0,
            opt(terminated(identifier, multispace0)),
            delimited(
                (char('{'), multispace0),
                opt(filter_groups),
                (multispace0, char('}')),
            ),
            multispace0,
        ),
        |(_, name, groups, _)| build_selector(name, groups.unwrap_or_default()),
    )
    .parse(input)
}

fn build_selector(name: Option<&str>, mut groups: Vec<Vec<LabelFilter>>) -> StreamSelector {
    if let Some(name) = name {
        let name_filter = LabelFilter::new(NAME_LABEL, MatchOp::Eq, name);
        if groups.is_empty() {
            groups.push(Vec::new());
        }
        for group in &mut groups {
            group.insert(0, name_filter.clone());
        }
    }
    StreamSelector { groups }
}

fn filter_groups(input: &str) -> IResult<&str, Vec<Vec<LabelFilter>>> {
    separated_list1((multispace1, tag_no_case("or"), multispace1), filter_group).parse(input)
}

fn filter_group(input: &str) -> IResult<&str, Vec<LabelFilter>> {
    terminated(
        separated_list1((multispace0, char(','), multispace0), label_filter),
        opt((multispace0, char(','))),
    )
    .parse(input)
}

fn label_filter(input: &str) -> IResult<&str, LabelFilter> {
    map(
        (identifier, multispace0, match_op, multispace0, quoted_string),
        |(label, _, op, _, value)| LabelFilter::new(label, op, value),
    )
    .parse(input)
}

// ============================================================================
// Operators
// ============================================================================

fn match_op(input: &str) -> IResult<&str, MatchOp> {
    alt((
        value(MatchOp::Regex, tag("=~")),
        value(MatchOp::NotRegex, tag("!~")),
        value(MatchOp::NotEq, tag("!=")),
        value(MatchOp::Eq, tag("=")),
    ))
    .parse(input)
}

// ============================================================================
// Values
// ============================================================================

fn quoted_string(input: &str) -> IResult<&str, String> {
    alt((double_quoted_string, single_quoted_string, backtick_string)).parse(input)
}

fn double_quoted_string(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(is_not("\\\""), '\\', escape_sequence)),
            Option::unwrap_or_default,
        ),
        char('"'),
    )
    .parse(input)
}

fn single_quoted_string(input: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        map(
            opt(escaped_transform(is_not("\\'"), '\\', escape_sequence)),
            Option::unwrap_or_default,
        ),
        char('\''),
    )
    .parse(input)
}

fn backtick_string(input: &str) -> IResult<&str, String> {
    delimited(
        char('`'),
        map(opt(is_not("`")), |s: Option<&str>| {
            s.unwrap_or_default().to_string()
        }),
        char('`'),
    )
    .parse(input)
}

fn escape_sequence(input: &str) -> IResult<&str, &str> {
    alt((
        value("\\", char('\\')),
        value("\"", char('"')),
        value("'", char('\'')),
        value("\n", char('n')),
        value("\t", char('t')),
    ))
    .parse(input)
}

// ============================================================================
// Identifier parser
// ============================================================================

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || matches!(c, '_' | '.' | ':')),
    ))
    .parse(input)
}

// ============================================================================
// Tests
// ============================================================================
