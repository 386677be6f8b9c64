//! Win/miss scoring of system answers against SQuAD references.
//!
//! The containment rule is deliberately loose: short or common reference
//! answers can produce false wins. It is a benchmark heuristic, not a grader.

use crate::dataset::QuestionAnswer;
use crate::normalize::normalize_answer;
use serde::{Deserialize, Serialize};

/// Sentence the backend answers with when the context does not contain an answer.
pub const REFUSAL_ANSWER: &str = "I don't know the answer.";

/// Binary verdict for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Win,
    Miss,
}

impl Verdict {
    pub fn is_win(&self) -> bool {
        matches!(self, Verdict::Win)
    }
}

/// Scores system answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerJudge;

impl AnswerJudge {
    pub fn new() -> Self {
        Self
    }

    /// Judge one answer.
    ///
    /// Impossible questions only accept the refusal sentence (case-insensitive,
    /// exact). Answerable questions win when the normalized answer and any
    /// normalized reference contain one another.
    pub fn judge(&self, system_answer: &str, qa: &QuestionAnswer) -> Verdict {
        let won = if qa.impossible {
            is_refusal(system_answer)
        } else {
            let answer = normalize_answer(system_answer);
            qa.reference_answers
                .iter()
                .any(|reference| contains_either_way(&answer, &normalize_answer(reference)))
        };

        if won { Verdict::Win } else { Verdict::Miss }
    }
}

/// Case-insensitive comparison with [`REFUSAL_ANSWER`].
pub fn is_refusal(answer: &str) -> bool {
    answer.to_lowercase() == REFUSAL_ANSWER.to_lowercase()
}

fn contains_either_way(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}
