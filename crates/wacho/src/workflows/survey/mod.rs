//! Post-festival survey lifecycle: availability window, question sequence, response
//! collection, statistics, and closure with badge awards.
//!
//! Persistence goes through the [`DataService`] trait so the workflow can be exercised against
//! any backend. [`SurveyService`] is the facade handlers and jobs call; the pure pieces
//! (gate, question builder, tally) are exported for callers that already hold the data.

pub mod availability;
pub mod cache;
pub(crate) mod closure;
pub mod collector;
pub mod domain;
pub mod notifier;
pub mod participants;
pub mod questions;
pub mod repository;
pub mod router;
pub mod service;
pub mod tally;

#[cfg(test)]
mod tests;

pub use availability::{closes_at, SurveyAvailability, SURVEY_WINDOW_DAYS};
pub use cache::SessionCache;
pub use closure::{plan_awards, AwardPlan, ClosureReport, FailedAward};
pub use collector::{normalize_answers, ResponseCollector, SurveySubmission, ValidationError};
pub use domain::{
    Answer, AnswerMap, Attendance, AttendanceStatus, BadgeAward, EventId, Festival,
    NewBadgeAward, ResponseId, Survey, SurveyId, SurveyResponse, UserId, UserProfile,
};
pub use notifier::{NoticeLevel, Notifier, SilentNotifier};
pub use participants::resolve_participants;
pub use questions::{build_questions, Question, QuestionKind, BADGE_QUESTION_LIMIT};
pub use repository::{DataService, DataServiceError};
pub use router::survey_router;
pub use service::{SurveyError, SurveyOverview, SurveyService, SweepEntry, SweepOutcome};
pub use tally::{aggregate, BadgeTally, FestivalStatistics, RankingEntry, TextResponse};
