// src/evaluator/parser.rs — Parse judge responses into pairwise verdicts

use crate::core::callable::Outcome;

/// Parse a judge response into a verdict.
///
/// Expected format (anywhere in the response, last occurrence wins):
/// ```text
/// WINNER: A
/// ```
/// `A` means the first content won, `B` the second, `TIE` neither. Markdown
/// emphasis and trailing punctuation are tolerated.
pub fn parse_verdict(response: &str) -> Option<Outcome> {
    response.lines().rev().find_map(parse_verdict_line)
}

fn parse_verdict_line(line: &str) -> Option<Outcome> {
    let cleaned: String = line
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '#'))
        .collect();
    let cleaned = cleaned.trim();

    let (label, rest) = cleaned.split_once(':')?;
    let label = label.trim();
    if !label.eq_ignore_ascii_case("winner") && !label.eq_ignore_ascii_case("verdict") {
        return None;
    }

    let token: String = rest
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();

    match token.to_ascii_uppercase().as_str() {
        "A" | "FIRST" | "1" => Some(Outcome::FirstWins),
        "B" | "SECOND" | "2" => Some(Outcome::SecondWins),
        "TIE" | "DRAW" | "EQUAL" => Some(Outcome::Tie),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_verdicts() {
        assert_eq!(parse_verdict("WINNER: A"), Some(Outcome::FirstWins));
        assert_eq!(parse_verdict("WINNER: B"), Some(Outcome::SecondWins));
        assert_eq!(parse_verdict("WINNER: TIE"), Some(Outcome::Tie));
    }

    #[test]
    fn test_parse_after_reasoning() {
        let response = "Response A is more concise.\n\
                        Response B has a factual error.\n\
                        \n\
                        WINNER: A";
        assert_eq!(parse_verdict(response), Some(Outcome::FirstWins));
    }

    #[test]
    fn test_parse_tolerates_markdown_and_case() {
        assert_eq!(parse_verdict("**Winner:** b."), Some(Outcome::SecondWins));
        assert_eq!(parse_verdict("## Verdict: `Tie`"), Some(Outcome::Tie));
    }

    #[test]
    fn test_last_verdict_wins() {
        let response = "WINNER: A\nOn reflection:\nWINNER: B";
        assert_eq!(parse_verdict(response), Some(Outcome::SecondWins));
    }

    #[test]
    fn test_unrecognized_verdicts() {
        assert_eq!(parse_verdict(""), None);
        assert_eq!(parse_verdict("I prefer the first one."), None);
        assert_eq!(parse_verdict("WINNER: both"), None);
        assert_eq!(parse_verdict("Score: A"), None);
    }
}
