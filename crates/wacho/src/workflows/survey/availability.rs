use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Days after a festival ends during which its survey can be filled in.
pub const SURVEY_WINDOW_DAYS: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyAvailability {
    /// Festival still running; attendance is editable, survey hidden.
    NotEnded,
    /// Survey fillable and statistics viewable; attendance is read-only.
    Open,
    /// Window elapsed; survey UI hidden. Does not close the survey record by itself.
    Expired,
}

impl SurveyAvailability {
    pub fn evaluate(end_date: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < end_date {
            Self::NotEnded
        } else if now <= closes_at(end_date) {
            Self::Open
        } else {
            Self::Expired
        }
    }

    pub const fn accepts_responses(self) -> bool {
        matches!(self, Self::Open)
    }

    pub const fn statistics_visible(self) -> bool {
        !matches!(self, Self::NotEnded)
    }

    pub const fn attendance_editable(self) -> bool {
        matches!(self, Self::NotEnded)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::NotEnded => "Festival in progress",
            Self::Open => "Survey open",
            Self::Expired => "Survey expired",
        }
    }
}

/// Last instant at which the survey is still open.
pub fn closes_at(end_date: DateTime<Utc>) -> DateTime<Utc> {
    end_date + Duration::days(SURVEY_WINDOW_DAYS)
}
