//! Token estimation utilities.
//!
//! Uses a character-based heuristic: [`CHARS_PER_TOKEN`] bytes per token.
//! Deliberately pessimistic so a trimmed category never overshoots the
//! prompt it lands in.

use ctxforge_core::Fact;

/// Bytes of text counted as one token.
pub const CHARS_PER_TOKEN: usize = 2;

/// Estimate the token count for a string. Never below 1.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() / CHARS_PER_TOKEN).max(1)
}

/// Estimate the tokens a fact costs, from its body.
pub fn estimate_fact_tokens(fact: &Fact) -> usize {
    estimate_tokens(&fact.body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_costs_one_token() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("a"), 1);
    }

    #[test]
    fn two_chars_per_token() {
        assert_eq!(estimate_tokens("test"), 2);
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        assert_eq!(estimate_tokens(&"a".repeat(100)), 50);
    }

    #[test]
    fn fact_cost_ignores_name() {
        let fact = Fact::new("f", "x".repeat(20), Some(0.9)).with_name("a very long name indeed");
        assert_eq!(estimate_fact_tokens(&fact), 10);
    }
}
