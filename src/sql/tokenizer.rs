use std::collections::VecDeque;

/// Splits a statement into whitespace-separated tokens.
///
/// Column values carry no spaces in this dialect, so there is no quoting to
/// respect.
pub fn tokenize(input: &str) -> VecDeque<String> {
    input.split_whitespace().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_any_whitespace() {
        let tokens = tokenize("insert  1\tuser user@test.com ");
        assert_eq!(tokens, vec!["insert", "1", "user", "user@test.com"]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(tokenize("   ").is_empty());
    }
}
