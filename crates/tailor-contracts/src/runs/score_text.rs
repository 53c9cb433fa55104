use std::sync::OnceLock;

use regex::Regex;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

fn first_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)").expect("static score pattern"))
}

/// Extracts the first ASCII number appearing anywhere in the judge's reply.
///
/// Digits from other scripts are skipped rather than matched, so they never
/// shadow a later `FINAL_SCORE: 87`.
///
/// The judge is asked for `FINAL_SCORE: <number>` but is not held to it, so
/// this deliberately accepts any position. A stray number in an explanation
/// the judge was told not to write will be picked up instead of the score.
pub fn parse_score(text: &str) -> Option<f64> {
    let found = first_number_pattern().captures(text)?.get(1)?;
    found.as_str().parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn clamp_score(value: f64) -> f64 {
    value.clamp(MIN_SCORE, MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::{clamp_score, parse_score};

    #[test]
    fn parses_final_score_line() {
        assert_eq!(parse_score("FINAL_SCORE: 87"), Some(87.0));
    }

    #[test]
    fn parses_number_inside_prose() {
        assert_eq!(parse_score("the result is 92.5 overall"), Some(92.5));
    }

    #[test]
    fn no_number_means_no_score() {
        assert_eq!(parse_score("cannot determine"), None);
        assert_eq!(parse_score(""), None);
    }

    #[test]
    fn first_number_wins() {
        assert_eq!(parse_score("Step 1 done. FINAL_SCORE: 64"), Some(1.0));
    }

    #[test]
    fn non_ascii_digits_are_skipped() {
        assert_eq!(parse_score("rubric \u{663} applied. FINAL_SCORE: 87"), Some(87.0));
        assert_eq!(parse_score("FINAL_SCORE: \u{ff18}\u{ff17}"), None);
        assert_eq!(parse_score("\u{ff19}\u{ff10} then 64.5"), Some(64.5));
    }

    #[test]
    fn clamp_bounds_out_of_range_scores() {
        assert_eq!(clamp_score(140.0), 100.0);
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(55.5), 55.5);
    }
}
