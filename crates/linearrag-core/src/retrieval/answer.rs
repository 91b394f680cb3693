//! Driver-side answer-parsing contract (SPEC_FULL.md §4.11). Pure, ambient,
//! not part of retrieval scoring — shipped so `linearrag-bin` is runnable
//! end to end without a grading harness of its own.

use once_cell::sync::Lazy;
use regex::Regex;

pub const INVALID: &str = "INVALID";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerFormat {
    Mcq,
    YesNo,
    YesNoMaybe,
}

static MCQ_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-D])\b").unwrap());
static YES_NO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(yes|no)\b").unwrap());
static YES_NO_MAYBE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(yes|no|maybe)\b").unwrap());

/// Extracts the expected answer token from raw LM output, or [`INVALID`] if
/// none is found on a word boundary.
pub fn parse_answer(format: AnswerFormat, raw: &str) -> String {
    let (re, uppercase) = match format {
        AnswerFormat::Mcq => (&*MCQ_RE, true),
        AnswerFormat::YesNo => (&*YES_NO_RE, false),
        AnswerFormat::YesNoMaybe => (&*YES_NO_MAYBE_RE, false),
    };
    match re.captures(raw) {
        Some(caps) => {
            let matched = caps.get(1).unwrap().as_str();
            if uppercase {
                matched.to_uppercase()
            } else {
                capitalize_first(matched)
            }
        }
        None => INVALID.to_string(),
    }
}

fn capitalize_first(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcq_extracts_first_letter_on_word_boundary() {
        assert_eq!(parse_answer(AnswerFormat::Mcq, "The answer is B."), "B");
        assert_eq!(parse_answer(AnswerFormat::Mcq, "I think Bx is wrong"), "INVALID");
        assert_eq!(parse_answer(AnswerFormat::Mcq, "no letter here"), "INVALID");
    }

    #[test]
    fn yes_no_is_case_insensitive() {
        assert_eq!(parse_answer(AnswerFormat::YesNo, "yes, definitely"), "Yes");
        assert_eq!(parse_answer(AnswerFormat::YesNo, "NO."), "No");
        assert_eq!(parse_answer(AnswerFormat::YesNo, "maybe"), "INVALID");
    }

    #[test]
    fn yes_no_maybe_accepts_all_three() {
        assert_eq!(parse_answer(AnswerFormat::YesNoMaybe, "Maybe so"), "Maybe");
        assert_eq!(parse_answer(AnswerFormat::YesNoMaybe, "nonsense"), "INVALID");
    }

    #[test]
    fn lm_failure_sentinel_is_invalid() {
        assert_eq!(parse_answer(AnswerFormat::Mcq, ""), INVALID);
    }
}
