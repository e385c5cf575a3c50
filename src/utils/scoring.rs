// src/utils/scoring.rs

use std::collections::HashMap;

use serde::Serialize;

use crate::config::PASSING_SCORE_PERCENTAGE;

/// Normalizes an answer for comparison: surrounding whitespace is ignored
/// and letters are compared case-insensitively.
fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Counts the questions whose submitted answer matches the key.
///
/// `answer_key` maps question id to the correct answer and defines the set
/// of questions that count. Submitted ids outside the key are ignored and
/// missing ids count as wrong.
pub fn score_mcq(submitted: &HashMap<i64, String>, answer_key: &HashMap<i64, String>) -> i64 {
    answer_key
        .iter()
        .filter(|(id, correct)| {
            submitted
                .get(id)
                .is_some_and(|given| normalize(given) == normalize(correct))
        })
        .count() as i64
}

/// Outcome of a typing test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypingScore {
    pub correct_words: i64,
    pub typed_words: i64,
    pub passage_words: i64,
    /// Correct words per minute.
    pub wpm: f64,
    /// Typed words per minute, right or wrong.
    pub gross_wpm: f64,
    /// Share of typed words that were correct, in percent.
    pub accuracy: f64,
}

/// Scores typed text against the passage word by word, by position.
///
/// `elapsed_seconds` is clamped to at least one second.
pub fn score_typing(passage: &str, typed: &str, elapsed_seconds: i64) -> TypingScore {
    let expected: Vec<&str> = passage.split_whitespace().collect();
    let given: Vec<&str> = typed.split_whitespace().collect();

    let correct_words = expected
        .iter()
        .zip(&given)
        .filter(|(a, b)| a == b)
        .count() as i64;
    let typed_words = given.len() as i64;

    let minutes = elapsed_seconds.max(1) as f64 / 60.0;
    let accuracy = if typed_words == 0 {
        0.0
    } else {
        round2(correct_words as f64 / typed_words as f64 * 100.0)
    };

    TypingScore {
        correct_words,
        typed_words,
        passage_words: expected.len() as i64,
        wpm: round2(correct_words as f64 / minutes),
        gross_wpm: round2(typed_words as f64 / minutes),
        accuracy,
    }
}

/// Score as a percentage of `total`; zero when there is nothing to score.
pub fn percentage(score: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    round2(score as f64 / total as f64 * 100.0)
}

pub fn passed(score: i64, total: i64) -> bool {
    total > 0 && percentage(score, total) >= PASSING_SCORE_PERCENTAGE
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
