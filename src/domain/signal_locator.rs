//! Finds the most recent bars where a condition held.

use crate::domain::bar::Bar;
use crate::domain::condition::Expr;
use crate::domain::condition_eval::evaluate_series;
use crate::domain::condition_parser::parse;
use crate::domain::error::EvalError;
use tracing::{error, warn};

/// Number of historical occurrences replayed as proof.
pub const PROOF_DEPTH: usize = 3;

/// Indices of the last [`PROOF_DEPTH`] bars where `condition` holds, oldest
/// first. A malformed or unevaluable condition yields no indices.
pub fn find_signal_occurrences(bars: &[Bar], condition: &str) -> Vec<usize> {
    let expr = match parse(condition) {
        Ok(expr) => expr,
        Err(e) => {
            error!(
                condition,
                "invalid condition:\n{}",
                e.display_with_context(condition)
            );
            return Vec::new();
        }
    };
    match locate(bars, &expr) {
        Ok(indices) => indices,
        Err(e) => {
            error!(condition, "error finding signal occurrences: {}", e);
            Vec::new()
        }
    }
}

/// Typed variant of [`find_signal_occurrences`] that reports why nothing
/// was found.
pub fn locate(bars: &[Bar], expr: &Expr) -> Result<Vec<usize>, EvalError> {
    let mask = evaluate_series(expr, bars)?;
    let matches: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter_map(|(i, &hit)| hit.then_some(i))
        .collect();

    if matches.is_empty() {
        warn!(condition = %expr, "no signals found");
        return Ok(matches);
    }
    if matches.len() < PROOF_DEPTH {
        warn!(
            condition = %expr,
            found = matches.len(),
            "fewer historical signals than proof depth"
        );
    }
    let start = matches.len().saturating_sub(PROOF_DEPTH);
    Ok(matches[start..].to_vec())
}
