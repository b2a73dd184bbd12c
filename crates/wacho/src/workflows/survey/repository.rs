use async_trait::async_trait;

use super::domain::{
    AnswerMap, Attendance, AttendanceStatus, BadgeAward, EventId, Festival, NewBadgeAward,
    Survey, SurveyId, SurveyResponse, UserId,
};
use crate::workflows::badges::BadgeDefinition;

/// Hosted backend the survey workflow persists through.
///
/// `submit_response` must upsert on (survey, user): a second submission replaces the first
/// rather than adding a row.
#[async_trait]
pub trait DataService: Send + Sync {
    async fn fetch_festival(&self, event_id: &EventId) -> Result<Option<Festival>, DataServiceError>;

    async fn fetch_attendances(&self, event_id: &EventId)
        -> Result<Vec<Attendance>, DataServiceError>;

    async fn upsert_attendance(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        status: AttendanceStatus,
    ) -> Result<Attendance, DataServiceError>;

    async fn fetch_badge_definitions(&self) -> Result<Vec<BadgeDefinition>, DataServiceError>;

    async fn fetch_or_create_survey(&self, event_id: &EventId) -> Result<Survey, DataServiceError>;

    async fn submit_response(
        &self,
        survey_id: &SurveyId,
        user_id: &UserId,
        responses: AnswerMap,
    ) -> Result<SurveyResponse, DataServiceError>;

    async fn fetch_responses(
        &self,
        survey_id: &SurveyId,
    ) -> Result<Vec<SurveyResponse>, DataServiceError>;

    async fn fetch_existing_submission(
        &self,
        survey_id: &SurveyId,
        user_id: &UserId,
    ) -> Result<Option<SurveyResponse>, DataServiceError>;

    async fn fetch_badge_awards(&self, event_id: &EventId)
        -> Result<Vec<BadgeAward>, DataServiceError>;

    async fn create_badge_award(&self, award: NewBadgeAward)
        -> Result<BadgeAward, DataServiceError>;

    async fn set_survey_active(
        &self,
        survey_id: &SurveyId,
        is_active: bool,
    ) -> Result<Survey, DataServiceError>;
}

/// Error enumeration for data service failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataServiceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("rejected by data service: {0}")]
    Rejected(String),
    #[error("data service unavailable: {0}")]
    Unavailable(String),
}
