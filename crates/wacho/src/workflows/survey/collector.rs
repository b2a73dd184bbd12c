use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{Answer, AnswerMap, UserId};
use super::questions::{
    badge_answer_key, badge_id_from_key, base_question_keys, choice_options, Question,
    QuestionKind, BADGE_KEY_PREFIX, RATING_MAX, RATING_MIN,
};
use crate::workflows::badges::BadgeId;

/// Rejections raised before any call reaches the data service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("question '{question}' must be answered")]
    MissingAnswer { question: String },
    #[error("answer to '{question}' is invalid: {reason}")]
    InvalidAnswer { question: String, reason: String },
    #[error("badge '{badge}' is not open for nomination")]
    UnknownBadge { badge: BadgeId },
    #[error("user '{nominee}' is not a participant and cannot receive badge '{badge}'")]
    IneligibleNominee { badge: BadgeId, nominee: UserId },
}

/// Answers partitioned into base responses and per-badge nominations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveySubmission {
    pub responses: AnswerMap,
    pub badge_nominations: BTreeMap<BadgeId, UserId>,
}

impl SurveySubmission {
    /// Stored payload: base answers plus `badge_<id>` entries.
    pub fn to_answer_map(&self) -> AnswerMap {
        let mut answers = self.responses.clone();
        for (badge, nominee) in &self.badge_nominations {
            answers.insert(badge_answer_key(badge), Answer::Text(nominee.0.clone()));
        }
        answers
    }
}

/// Checks every base question is answered and splits nominations out of the answer set.
///
/// Blank nominations are dropped; the first missing base question is reported.
pub fn normalize_answers(answers: &AnswerMap) -> Result<SurveySubmission, ValidationError> {
    for key in base_question_keys() {
        let answer = answers
            .get(key)
            .filter(|answer| !answer.is_blank())
            .ok_or_else(|| ValidationError::MissingAnswer {
                question: key.to_string(),
            })?;
        check_base_answer(key, answer)?;
    }

    let mut submission = SurveySubmission::default();
    for (key, answer) in answers {
        if key.starts_with(BADGE_KEY_PREFIX) {
            let badge = badge_id_from_key(key).ok_or_else(|| ValidationError::InvalidAnswer {
                question: key.clone(),
                reason: "nomination key is missing a badge id".to_string(),
            })?;
            if answer.is_blank() {
                continue;
            }
            let nominee = answer.as_text().ok_or_else(|| ValidationError::InvalidAnswer {
                question: key.clone(),
                reason: "nomination must name a user".to_string(),
            })?;
            submission
                .badge_nominations
                .insert(badge, UserId(nominee.trim().to_string()));
        } else {
            submission.responses.insert(key.clone(), answer.clone());
        }
    }

    Ok(submission)
}

fn check_base_answer(key: &str, answer: &Answer) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidAnswer {
        question: key.to_string(),
        reason,
    };

    if let Some(options) = choice_options(key) {
        let value = answer
            .as_text()
            .ok_or_else(|| invalid("expected one of the listed options".to_string()))?;
        if !options.iter().any(|option| option.value == value) {
            return Err(invalid(format!("'{value}' is not a listed option")));
        }
        return Ok(());
    }

    if key.ends_with("_rating") {
        match answer.as_rating() {
            Some(rating) if (RATING_MIN..=RATING_MAX).contains(&rating) => Ok(()),
            _ => Err(invalid(format!(
                "rating must be between {RATING_MIN} and {RATING_MAX}"
            ))),
        }
    } else {
        Ok(())
    }
}

/// Steps a user through an ordered question sequence, holding answers until submission.
#[derive(Debug, Clone)]
pub struct ResponseCollector {
    questions: Vec<Question>,
    answers: AnswerMap,
    position: usize,
}

impl ResponseCollector {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            answers: AnswerMap::new(),
            position: 0,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.position)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Records an answer for the current question; a blank answer clears it.
    pub fn answer(&mut self, answer: Answer) {
        let Some(question) = self.questions.get(self.position) else {
            return;
        };
        if answer.is_blank() {
            self.answers.remove(&question.key);
        } else {
            self.answers.insert(question.key.clone(), answer);
        }
    }

    /// Moves forward when the current question allows it. Returns whether the cursor moved.
    pub fn advance(&mut self) -> bool {
        if !self.can_advance() || self.position + 1 >= self.questions.len() {
            return false;
        }
        self.position += 1;
        true
    }

    pub fn back(&mut self) -> bool {
        if self.position == 0 {
            return false;
        }
        self.position -= 1;
        true
    }

    /// Required questions block progress until answered; nominations may be skipped.
    pub fn can_advance(&self) -> bool {
        match self.current() {
            Some(question) if question.required => self.answers.contains_key(&question.key),
            Some(_) => true,
            None => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.questions
            .iter()
            .filter(|question| question.required)
            .all(|question| self.answers.contains_key(&question.key))
    }

    /// Nominations that were offered as questions in this sequence.
    pub fn offered_badges(&self) -> Vec<&BadgeId> {
        self.questions
            .iter()
            .filter_map(|question| match &question.kind {
                QuestionKind::BadgeNomination { badge } => Some(&badge.id),
                _ => None,
            })
            .collect()
    }

    pub fn finish(&self) -> Result<SurveySubmission, ValidationError> {
        normalize_answers(&self.answers)
    }
}
