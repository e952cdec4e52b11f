//! Recovers typed record arrays from free-form completion text.
//!
//! Each stage is a separate pure function so it can be tested on its own;
//! [`normalize`] chains them in order.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::records::Record;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("no JSON array found in model output")]
    NoArray,
    #[error("model output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("model output is not a JSON array")]
    NotAnArray,
    #[error("none of the {total} records in model output had the expected shape")]
    NoValidRecords { total: usize },
}

lazy_static! {
    static ref FENCE: Regex =
        Regex::new(r"```[A-Za-z0-9_+-]*").expect("The regex expression should be valid");
    static ref WHITESPACE_RUN: Regex =
        Regex::new(r"\s+").expect("The regex expression should be valid");
    static ref TRAILING_COMMA_OBJECT: Regex =
        Regex::new(r"(?:,\s*)+\}").expect("The regex expression should be valid");
    static ref TRAILING_COMMA_ARRAY: Regex =
        Regex::new(r"(?:,\s*)+\]").expect("The regex expression should be valid");
}

/// Removes every triple-backtick marker, with or without a language tag.
pub fn strip_fences(text: &str) -> String {
    FENCE.replace_all(text, "").into_owned()
}

/// Slices from the first `[` to the last `]`, inclusive.
pub fn array_span(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

pub fn collapse_newlines(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").into_owned()
}

pub fn drop_comma_before_brace(text: &str) -> String {
    TRAILING_COMMA_OBJECT.replace_all(text, "}").into_owned()
}

pub fn drop_comma_before_bracket(text: &str) -> String {
    TRAILING_COMMA_ARRAY.replace_all(text, "]").into_owned()
}

/// Applies the syntactic repairs in order. Idempotent.
pub fn repair(span: &str) -> String {
    let text = collapse_newlines(span);
    let text = collapse_whitespace(&text);
    let text = drop_comma_before_brace(&text);
    drop_comma_before_bracket(&text)
}

/// Parses the repaired span and keeps the elements that match `T`, in order.
pub fn validate<T: Record>(repaired: &str) -> Result<Vec<T>, NormalizeError> {
    let Value::Array(items) = serde_json::from_str::<Value>(repaired)? else {
        return Err(NormalizeError::NotAnArray);
    };
    let total = items.len();
    let records: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<T>(item).ok())
        .filter(|record| record.is_valid())
        .collect();

    if records.is_empty() {
        return Err(NormalizeError::NoValidRecords { total });
    }
    if records.len() < total {
        warn!(
            kept = records.len(),
            dropped = total - records.len(),
            "dropped malformed records"
        );
    }
    Ok(records)
}

/// Runs the whole pipeline: trim, strip fences, slice, repair, parse, validate.
pub fn normalize<T: Record>(raw: &str) -> Result<Vec<T>, NormalizeError> {
    trace!(preview = %preview(raw, 500), "normalizing model output");
    let unfenced = strip_fences(raw.trim());
    let span = array_span(&unfenced).ok_or(NormalizeError::NoArray)?;
    let repaired = repair(span);
    trace!(preview = %preview(&repaired, 500), "repaired array span");
    let records = validate(&repaired)?;
    debug!(count = records.len(), "normalized records");
    Ok(records)
}

pub(crate) fn preview(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(end, _)| &text[..end])
}

#[cfg(test)]
mod tests {
    use super::{array_span, normalize, repair, strip_fences, NormalizeError};
    use crate::records::{Flashcard, QuizItem, ScheduleEntry};

    #[test]
    fn strips_fences_anywhere() {
        let text = "intro ```json\n[1]\n``` middle ```\nx\n```";
        assert_eq!(strip_fences(text), "intro \n[1]\n middle \nx\n");
    }

    #[test]
    fn array_span_is_first_open_to_last_close() {
        assert_eq!(array_span("a [1, [2]] b"), Some("[1, [2]]"));
        assert_eq!(array_span("no brackets"), None);
        assert_eq!(array_span("] backwards ["), None);
    }

    #[test]
    fn repairs_trailing_commas_and_newlines() {
        let repaired = repair("[\n  {\"a\": 1,\n  },\n  {\"b\": [1, 2, ],},\n]");
        assert_eq!(repaired, "[ {\"a\": 1}, {\"b\": [1, 2]}]");
        assert_eq!(repair(&repaired), repaired);
    }

    #[test]
    fn repair_handles_repeated_commas() {
        let once = repair("[{\"a\":1,,},,]");
        assert_eq!(once, "[{\"a\":1}]");
        assert_eq!(repair(&once), once);
    }

    #[test]
    fn fenced_and_bare_arrays_normalize_equally() {
        let bare = r#"[{"front":"Cell","back":"Unit of life"}]"#;
        let fenced = format!("```json\n{bare}\n```");
        let a: Vec<Flashcard> = normalize(bare).unwrap();
        let b: Vec<Flashcard> = normalize(&fenced).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn chatty_fenced_output_with_trailing_comma() {
        let raw = "Sure! Here's your data:\n```json\n[{\"front\":\"Q\",\"back\":\"A\"},]\n```";
        let cards: Vec<Flashcard> = normalize(raw).unwrap();
        assert_eq!(
            cards,
            vec![Flashcard {
                front: "Q".to_string(),
                back: "A".to_string()
            }]
        );
    }

    #[test]
    fn ten_clean_flashcards_survive_unchanged() {
        let cards: Vec<Flashcard> = (0..10)
            .map(|i| Flashcard {
                front: format!("term {i}"),
                back: format!("definition {i}"),
            })
            .collect();
        let raw = serde_json::to_string(&cards).unwrap();
        let parsed: Vec<Flashcard> = normalize(&raw).unwrap();
        assert_eq!(parsed, cards);
    }

    #[test]
    fn prose_without_brackets_is_malformed() {
        let err = normalize::<Flashcard>("I could not generate flashcards for this text.")
            .unwrap_err();
        assert!(matches!(err, NormalizeError::NoArray));
    }

    #[test]
    fn unparseable_span_is_fatal() {
        let err = normalize::<Flashcard>("[{front: Q}]").unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidJson(_)));
    }

    #[test]
    fn invalid_quiz_items_are_dropped_not_coerced() {
        let raw = r#"[
            {"question":"ok","options":["a","b","c","d"],"correctAnswer":"b","explanation":""},
            {"question":"three","options":["a","b","c"],"correctAnswer":"a","explanation":""},
            {"question":"stray","options":["a","b","c","d"],"correctAnswer":"z","explanation":""},
            {"question":"last","options":["w","x","y","z"],"correctAnswer":"z","explanation":"z"}
        ]"#;
        let items: Vec<QuizItem> = normalize(raw).unwrap();
        let questions: Vec<&str> = items.iter().map(|q| q.question.as_str()).collect();
        assert_eq!(questions, vec!["ok", "last"]);
        assert!(items
            .iter()
            .all(|q| q.options.len() == 4 && q.options.contains(&q.correct_answer)));
    }

    #[test]
    fn all_invalid_records_fail() {
        let raw = r#"[{"time":"09:00","duration":0,"subject":"Math","activity":"x"}]"#;
        let err = normalize::<ScheduleEntry>(raw).unwrap_err();
        assert!(matches!(err, NormalizeError::NoValidRecords { total: 1 }));
    }
}
