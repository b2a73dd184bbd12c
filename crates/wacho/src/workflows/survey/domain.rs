use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::badges::BadgeId;

macro_rules! id_wrapper {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_wrapper!(
    /// Identifier wrapper for festivals.
    EventId
);
id_wrapper!(
    /// Identifier wrapper for user accounts.
    UserId
);
id_wrapper!(
    /// Identifier wrapper for the survey attached to a festival.
    SurveyId
);
id_wrapper!(
    /// Identifier wrapper for stored survey responses.
    ResponseId
);

/// Public profile fields shown next to survey answers and nominations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    HaveTicket,
    ThinkingAboutIt,
    NotGoing,
}

impl AttendanceStatus {
    /// Whether the attendee counts as a survey participant and badge nominee.
    pub const fn is_participating(self) -> bool {
        matches!(self, Self::HaveTicket | Self::ThinkingAboutIt)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::HaveTicket => "Have ticket",
            Self::ThinkingAboutIt => "Thinking about it",
            Self::NotGoing => "Not going",
        }
    }
}

/// One record per (event, user) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendance {
    pub event_id: EventId,
    pub user_id: UserId,
    pub status: AttendanceStatus,
    pub user: UserProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Festival {
    pub id: EventId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub category: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub created_by: UserId,
    #[serde(default)]
    pub attendances: Vec<Attendance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub event_id: EventId,
    pub is_active: bool,
}

/// A single answer as stored in a response payload.
///
/// Ratings travel as numbers; select, free-text and nomination answers as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Number(i64),
    Text(String),
}

impl Answer {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Text(value) => value.trim().is_empty(),
        }
    }

    /// Integer reading of the answer; numeric strings are accepted.
    pub fn as_rating(&self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(value) => value.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            Self::Number(_) => None,
        }
    }
}

impl From<i64> for Answer {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Answer {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Question key to answer, including `badge_<id>` nomination entries.
pub type AnswerMap = BTreeMap<String, Answer>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: ResponseId,
    pub survey_id: SurveyId,
    pub user_id: UserId,
    pub responses: AnswerMap,
    pub created_at: DateTime<Utc>,
}

/// Award record produced when a survey closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeAward {
    pub badge_id: BadgeId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub votes_received: u32,
    pub awarded_at: DateTime<Utc>,
}

/// Award about to be created through the data service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBadgeAward {
    pub badge_id: BadgeId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub votes_received: u32,
}
