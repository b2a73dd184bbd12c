use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::workflows::badges::{BadgeDefinition, BadgeId};

/// Maximum number of badge-nomination questions appended to the base sequence.
pub const BADGE_QUESTION_LIMIT: usize = 8;

/// Answer keys for nominations are `badge_<badge id>`.
pub const BADGE_KEY_PREFIX: &str = "badge_";

pub const OVERALL_RATING: &str = "overall_rating";
pub const ENJOYMENT_LEVEL: &str = "enjoyment_level";
pub const BEST_MOMENT: &str = "best_moment";
pub const ATMOSPHERE_RATING: &str = "atmosphere_rating";
pub const WOULD_RECOMMEND: &str = "would_recommend";
pub const ORGANIZATION_RATING: &str = "organization_rating";
pub const IMPROVEMENTS: &str = "improvements";
pub const WOULD_ATTEND_AGAIN: &str = "would_attend_again";

pub const RATING_MIN: i64 = 1;
pub const RATING_MAX: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub value: &'static str,
    pub label: &'static str,
}

const ENJOYMENT_OPTIONS: [ChoiceOption; 5] = [
    ChoiceOption { value: "amazing", label: "Amazing, best festival ever" },
    ChoiceOption { value: "very_good", label: "Very good" },
    ChoiceOption { value: "good", label: "Good" },
    ChoiceOption { value: "okay", label: "It was okay" },
    ChoiceOption { value: "disappointing", label: "Disappointing" },
];

const RECOMMEND_OPTIONS: [ChoiceOption; 4] = [
    ChoiceOption { value: "definitely", label: "Definitely" },
    ChoiceOption { value: "probably", label: "Probably" },
    ChoiceOption { value: "maybe", label: "Maybe" },
    ChoiceOption { value: "no", label: "No" },
];

const ATTEND_AGAIN_OPTIONS: [ChoiceOption; 4] = [
    ChoiceOption { value: "definitely", label: "Definitely" },
    ChoiceOption { value: "probably", label: "Probably" },
    ChoiceOption { value: "unsure", label: "Not sure" },
    ChoiceOption { value: "no", label: "No" },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Rating { min: i64, max: i64 },
    Select { options: Vec<ChoiceOption> },
    Text,
    BadgeNomination { badge: BadgeDefinition },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub key: String,
    pub prompt: String,
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    fn base(key: &str, prompt: &str, kind: QuestionKind) -> Self {
        Self {
            key: key.to_string(),
            prompt: prompt.to_string(),
            required: true,
            kind,
        }
    }

    fn badge(badge: &BadgeDefinition) -> Self {
        Self {
            key: badge_answer_key(&badge.id),
            prompt: format!("Who deserves the \"{}\" badge?", badge.name),
            required: false,
            kind: QuestionKind::BadgeNomination {
                badge: badge.clone(),
            },
        }
    }

    pub fn badge_id(&self) -> Option<&BadgeId> {
        match &self.kind {
            QuestionKind::BadgeNomination { badge } => Some(&badge.id),
            _ => None,
        }
    }
}

pub fn badge_answer_key(id: &BadgeId) -> String {
    format!("{BADGE_KEY_PREFIX}{}", id.0)
}

/// Bare badge id for a `badge_` answer key.
pub fn badge_id_from_key(key: &str) -> Option<BadgeId> {
    key.strip_prefix(BADGE_KEY_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(|rest| BadgeId(rest.to_string()))
}

/// Options accepted for a select question, `None` for other keys.
pub fn choice_options(key: &str) -> Option<&'static [ChoiceOption]> {
    match key {
        ENJOYMENT_LEVEL => Some(&ENJOYMENT_OPTIONS),
        WOULD_RECOMMEND => Some(&RECOMMEND_OPTIONS),
        WOULD_ATTEND_AGAIN => Some(&ATTEND_AGAIN_OPTIONS),
        _ => None,
    }
}

/// The eight fixed questions, in presentation order.
pub fn base_questions() -> Vec<Question> {
    let rating = || QuestionKind::Rating {
        min: RATING_MIN,
        max: RATING_MAX,
    };
    let select = |options: &[ChoiceOption]| QuestionKind::Select {
        options: options.to_vec(),
    };

    vec![
        Question::base(OVERALL_RATING, "How would you rate the festival overall?", rating()),
        Question::base(ENJOYMENT_LEVEL, "How much did you enjoy it?", select(&ENJOYMENT_OPTIONS)),
        Question::base(BEST_MOMENT, "What was your best moment?", QuestionKind::Text),
        Question::base(ATMOSPHERE_RATING, "How was the atmosphere?", rating()),
        Question::base(WOULD_RECOMMEND, "Would you recommend it to a friend?", select(&RECOMMEND_OPTIONS)),
        Question::base(ORGANIZATION_RATING, "How well was it organized?", rating()),
        Question::base(IMPROVEMENTS, "What could be improved?", QuestionKind::Text),
        Question::base(WOULD_ATTEND_AGAIN, "Would you attend again?", select(&ATTEND_AGAIN_OPTIONS)),
    ]
}

pub fn base_question_keys() -> [&'static str; 8] {
    [
        OVERALL_RATING,
        ENJOYMENT_LEVEL,
        BEST_MOMENT,
        ATMOSPHERE_RATING,
        WOULD_RECOMMEND,
        ORGANIZATION_RATING,
        IMPROVEMENTS,
        WOULD_ATTEND_AGAIN,
    ]
}

/// Base sequence followed by up to eight nomination questions sampled without replacement.
///
/// Reserved and inactive badges never become questions. The sample order is the shuffle order.
pub fn build_questions<R>(badges: &[BadgeDefinition], rng: &mut R) -> Vec<Question>
where
    R: Rng + ?Sized,
{
    let mut candidates: Vec<&BadgeDefinition> =
        badges.iter().filter(|badge| badge.is_assignable()).collect();
    let (sampled, _) = candidates.partial_shuffle(rng, BADGE_QUESTION_LIMIT);

    let mut questions = base_questions();
    questions.extend(sampled.iter().map(|badge| Question::badge(badge)));
    questions
}
