//! Edge-expression parsing.
//!
//! A graph is declared as a list of expressions, each either a bare node name
//! (a standalone node) or two names separated by `->` (the left side must
//! complete before the right side starts):
//!
//! ```text
//! ["a->b", "b->c", "b->d", "e"]
//! ```
//!
//! Whitespace (`\r`, `\n`, `\t`, space) is trimmed from each side of every
//! token. Empty tokens are ignored, and expressions that do not reduce to one
//! or two non-empty tokens are dropped.

use miette::Diagnostic;
use thiserror::Error;

/// Separator between the two endpoints of a dependency expression.
pub const EDGE_SEP: &str = "->";

/// Errors produced by [`parse_exprs`].
#[derive(Debug, Error, Diagnostic, Clone, Copy, PartialEq, Eq)]
pub enum ExprError {
    /// No expression yielded an edge or a standalone node.
    #[error("expression list yields no edges and no standalone nodes")]
    #[diagnostic(
        code(phaseflow::expr::empty),
        help("Declare at least one `a->b` edge or one standalone node name.")
    )]
    Empty,
}

/// Result of parsing a list of edge expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedExprs {
    /// `(u, v)` pairs meaning `u` precedes `v`.
    pub edges: Vec<(String, String)>,
    /// Nodes declared without any edge.
    pub standalone: Vec<String>,
}

/// Splits a list of expressions into dependency pairs and standalone nodes.
pub fn parse_exprs<S: AsRef<str>>(exprs: &[S]) -> Result<ParsedExprs, ExprError> {
    let mut parsed = ParsedExprs::default();
    for expr in exprs {
        let tokens: Vec<&str> = expr
            .as_ref()
            .split(EDGE_SEP)
            .map(trim_token)
            .filter(|t| !t.is_empty())
            .collect();
        match tokens.as_slice() {
            [single] => parsed.standalone.push((*single).to_string()),
            [from, to] => parsed.edges.push(((*from).to_string(), (*to).to_string())),
            _ => {
                tracing::debug!(expr = expr.as_ref(), "ignoring malformed edge expression");
            }
        }
    }
    if parsed.edges.is_empty() && parsed.standalone.is_empty() {
        return Err(ExprError::Empty);
    }
    Ok(parsed)
}

/// Trims the whitespace characters recognized by the expression syntax.
pub(crate) fn trim_token(token: &str) -> &str {
    token.trim_matches(['\r', '\n', '\t', ' '])
}
