//! Default comparison direction inferred from a metric's name
//!
//! Names containing `loss`, `error` or `perplexity` anywhere, or one of the
//! tokens `err`, `mse`, `mae`, `rmse`, `nll`, `ppl`, `wer`, `cer`, `cost`
//! delimited by non-letters, are minimized. Everything else (accuracy,
//! precision, recall, F1, AUC, BLEU, ...) is maximized. Callers with metrics
//! that break this rule should register an explicit direction.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Direction;

static MINIMIZE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)loss|error|perplexity|(?:^|[^a-z])(?:err|mse|mae|rmse|nll|ppl|wer|cer|cost)(?:[^a-z]|$)")
        .expect("minimize pattern is valid")
});

/// Infer the direction for a metric that has no explicit override
pub fn infer_direction(name: &str) -> Direction {
    if MINIMIZE_PATTERN.is_match(name) {
        Direction::Minimize
    } else {
        Direction::Maximize
    }
}
