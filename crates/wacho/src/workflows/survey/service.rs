use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::availability::{closes_at, SurveyAvailability};
use super::cache::SessionCache;
use super::closure::{event_awards, plan_awards, ClosureReport, FailedAward};
use super::collector::{normalize_answers, ValidationError};
use super::domain::{
    AnswerMap, Attendance, AttendanceStatus, BadgeAward, EventId, Festival, NewBadgeAward,
    SurveyResponse, UserId, UserProfile,
};
use super::participants::{is_participant, resolve_participants};
use super::questions::{build_questions, Question};
use super::repository::{DataService, DataServiceError};
use super::tally::{aggregate, FestivalStatistics};
use crate::workflows::badges::BadgeCatalog;

/// Entry points for the survey lifecycle, composed over a data service and a session cache.
pub struct SurveyService<D> {
    data: Arc<D>,
    cache: SessionCache,
    rng: Mutex<StdRng>,
}

/// What a user can do with a festival's survey right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyOverview {
    pub event_id: EventId,
    pub status: SurveyAvailability,
    pub closes_at: DateTime<Utc>,
    pub survey_active: bool,
    pub has_submitted: bool,
    pub can_submit: bool,
    pub can_view_statistics: bool,
}

#[derive(Debug)]
pub enum SweepOutcome {
    Closed(ClosureReport),
    AlreadyClosed,
    NotExpired(SurveyAvailability),
    Failed(SurveyError),
}

#[derive(Debug)]
pub struct SweepEntry {
    pub event_id: EventId,
    pub outcome: SweepOutcome,
}

impl<D> SurveyService<D>
where
    D: DataService + 'static,
{
    pub fn new(data: Arc<D>) -> Self {
        Self::with_rng(data, StdRng::from_entropy())
    }

    /// Pins the badge-question sampler so question order is reproducible.
    pub fn with_seed(data: Arc<D>, seed: u64) -> Self {
        Self::with_rng(data, StdRng::seed_from_u64(seed))
    }

    fn with_rng(data: Arc<D>, rng: StdRng) -> Self {
        Self {
            data,
            cache: SessionCache::new(),
            rng: Mutex::new(rng),
        }
    }

    /// Serves badge definitions from `catalog` instead of the data service.
    pub fn with_catalog(self, catalog: BadgeCatalog) -> Self {
        self.cache.seed_badges(catalog);
        self
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn data(&self) -> &Arc<D> {
        &self.data
    }

    async fn festival(&self, event_id: &EventId) -> Result<Festival, SurveyError> {
        self.cache
            .load_festival(self.data.as_ref(), event_id)
            .await?
            .ok_or_else(|| SurveyError::NotFound(format!("festival '{event_id}'")))
    }

    pub async fn availability(
        &self,
        event_id: &EventId,
        now: DateTime<Utc>,
    ) -> Result<SurveyAvailability, SurveyError> {
        let festival = self.festival(event_id).await?;
        Ok(SurveyAvailability::evaluate(festival.end_date, now))
    }

    pub async fn participants(&self, event_id: &EventId) -> Result<Vec<UserProfile>, SurveyError> {
        self.festival(event_id).await?;
        let attendances = self.data.fetch_attendances(event_id).await?;
        Ok(resolve_participants(&attendances))
    }

    /// Fresh question sequence; every call may surface a different badge subset.
    pub async fn questions(&self, event_id: &EventId) -> Result<Vec<Question>, SurveyError> {
        self.festival(event_id).await?;
        let catalog = self.cache.load_badges(self.data.as_ref()).await?;
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(build_questions(catalog.definitions(), &mut *rng))
    }

    pub async fn overview(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<SurveyOverview, SurveyError> {
        let festival = self.festival(event_id).await?;
        let status = SurveyAvailability::evaluate(festival.end_date, now);
        let survey = self.data.fetch_or_create_survey(event_id).await?;
        let has_submitted = self
            .data
            .fetch_existing_submission(&survey.id, user_id)
            .await?
            .is_some();

        Ok(SurveyOverview {
            event_id: event_id.clone(),
            status,
            closes_at: closes_at(festival.end_date),
            survey_active: survey.is_active,
            has_submitted,
            can_submit: status.accepts_responses() && survey.is_active && !has_submitted,
            can_view_statistics: status.statistics_visible(),
        })
    }

    /// Upserts the caller's own attendance while the festival is still running.
    pub async fn set_attendance(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        status: AttendanceStatus,
        now: DateTime<Utc>,
    ) -> Result<Attendance, SurveyError> {
        let festival = self.festival(event_id).await?;
        if !SurveyAvailability::evaluate(festival.end_date, now).attendance_editable() {
            return Err(SurveyError::AttendanceLocked(event_id.clone()));
        }

        let attendance = self
            .data
            .upsert_attendance(event_id, user_id, status)
            .await?;
        self.cache.invalidate_festival(event_id);
        debug!(event = %event_id, user = %user_id, status = status.label(), "attendance updated");
        Ok(attendance)
    }

    /// Validates and stores one user's answers, keyed on (survey, user).
    ///
    /// Missing base answers fail before the data service is contacted.
    pub async fn submit(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        answers: &AnswerMap,
        now: DateTime<Utc>,
    ) -> Result<SurveyResponse, SurveyError> {
        let submission = normalize_answers(answers)?;

        let festival = self.festival(event_id).await?;
        let status = SurveyAvailability::evaluate(festival.end_date, now);
        if !status.accepts_responses() {
            return Err(SurveyError::Unavailable {
                event: event_id.clone(),
                status,
            });
        }

        let survey = self.data.fetch_or_create_survey(event_id).await?;
        if !survey.is_active {
            return Err(SurveyError::SurveyClosed(event_id.clone()));
        }

        if !submission.badge_nominations.is_empty() {
            let catalog = self.cache.load_badges(self.data.as_ref()).await?;
            let attendances = self.data.fetch_attendances(event_id).await?;
            let participants = resolve_participants(&attendances);

            for (badge, nominee) in &submission.badge_nominations {
                let assignable = catalog
                    .get(badge)
                    .map(|definition| definition.is_assignable())
                    .unwrap_or(false);
                if !assignable {
                    return Err(ValidationError::UnknownBadge {
                        badge: badge.clone(),
                    }
                    .into());
                }
                if !is_participant(&participants, nominee) {
                    return Err(ValidationError::IneligibleNominee {
                        badge: badge.clone(),
                        nominee: nominee.clone(),
                    }
                    .into());
                }
            }
        }

        let stored = self
            .data
            .submit_response(&survey.id, user_id, submission.to_answer_map())
            .await?;

        info!(
            event = %event_id,
            user = %user_id,
            nominations = submission.badge_nominations.len(),
            "survey response stored"
        );
        Ok(stored)
    }

    /// Statistics are hidden while the festival is still running.
    pub async fn statistics(
        &self,
        event_id: &EventId,
        now: DateTime<Utc>,
    ) -> Result<FestivalStatistics, SurveyError> {
        let festival = self.festival(event_id).await?;
        let status = SurveyAvailability::evaluate(festival.end_date, now);
        if !status.statistics_visible() {
            return Err(SurveyError::Unavailable {
                event: event_id.clone(),
                status,
            });
        }
        self.aggregate(event_id).await
    }

    /// Ungated aggregation over every stored response for the festival.
    pub async fn aggregate(&self, event_id: &EventId) -> Result<FestivalStatistics, SurveyError> {
        self.festival(event_id).await?;
        let survey = self.data.fetch_or_create_survey(event_id).await?;
        let responses = self.data.fetch_responses(&survey.id).await?;
        let attendances = self.data.fetch_attendances(event_id).await?;
        Ok(aggregate(&responses, &attendances))
    }

    /// Awards every badge winner and marks the survey inactive. Organizer only.
    ///
    /// Safe to repeat, also concurrently: an inactive survey returns the recorded awards, and
    /// awards that already exist for a badge are not created again. If any award or the final
    /// flag update fails the survey stays active and the awards created so far are reported.
    pub async fn close(
        &self,
        event_id: &EventId,
        requested_by: &UserId,
    ) -> Result<ClosureReport, SurveyError> {
        let festival = self.festival(event_id).await?;
        if &festival.created_by != requested_by {
            warn!(event = %event_id, user = %requested_by, "survey closure refused");
            return Err(SurveyError::Authorization {
                event: event_id.clone(),
                user: requested_by.clone(),
            });
        }

        let survey = self.data.fetch_or_create_survey(event_id).await?;
        let statistics = self.aggregate(event_id).await?;
        let existing = self.data.fetch_badge_awards(event_id).await?;

        if !survey.is_active {
            debug!(event = %event_id, "survey already closed");
            return Ok(ClosureReport {
                event_id: event_id.clone(),
                survey_id: survey.id,
                already_closed: true,
                awards: event_awards(event_id, existing),
                statistics,
            });
        }

        info!(event = %event_id, survey = %survey.id, "closing survey");
        let catalog = self.cache.load_badges(self.data.as_ref()).await?;
        let plan = plan_awards(event_id, &statistics, &catalog, &existing);
        for badge in &plan.withheld {
            warn!(event = %event_id, badge = %badge, "winner withheld for non-assignable badge");
        }

        let mut awards = existing;
        let mut created = Vec::new();
        let mut failed = Vec::new();
        for award in plan.to_create {
            match self.data.create_badge_award(award.clone()).await {
                Ok(record) => {
                    debug!(event = %event_id, badge = %record.badge_id, user = %record.user_id, "badge awarded");
                    created.push(record.clone());
                    awards.push(record);
                }
                Err(err @ DataServiceError::Conflict(_)) => {
                    // Another closure recorded this badge first.
                    match self.recorded_award(event_id, &award).await {
                        Ok(Some(record)) => awards.push(record),
                        Ok(None) => failed.push(FailedAward::new(award, &err)),
                        Err(read_err) => failed.push(FailedAward::new(award, &read_err)),
                    }
                }
                Err(err) => {
                    warn!(event = %event_id, badge = %award.badge_id, error = %err, "badge award failed");
                    failed.push(FailedAward::new(award, &err));
                }
            }
        }

        if !failed.is_empty() {
            return Err(SurveyError::PartialClosure { created, failed });
        }

        let closed_elsewhere = match self.data.fetch_or_create_survey(event_id).await {
            Ok(current) => !current.is_active,
            Err(err) => return Err(SurveyError::close_incomplete(event_id, created, &err)),
        };
        if closed_elsewhere {
            debug!(event = %event_id, "survey closed by a concurrent request");
        } else if let Err(err) = self.data.set_survey_active(&survey.id, false).await {
            return Err(SurveyError::close_incomplete(event_id, created, &err));
        }
        self.cache.invalidate_festival(event_id);
        info!(event = %event_id, awards = created.len(), "survey closed");

        Ok(ClosureReport {
            event_id: event_id.clone(),
            survey_id: survey.id,
            already_closed: closed_elsewhere,
            awards: event_awards(event_id, awards),
            statistics,
        })
    }

    async fn recorded_award(
        &self,
        event_id: &EventId,
        award: &NewBadgeAward,
    ) -> Result<Option<BadgeAward>, DataServiceError> {
        let recorded = self.data.fetch_badge_awards(event_id).await?;
        Ok(recorded
            .into_iter()
            .find(|record| record.badge_id == award.badge_id))
    }

    /// Closes every listed festival whose survey window has elapsed, on behalf of its organizer.
    pub async fn close_expired(&self, event_ids: &[EventId], now: DateTime<Utc>) -> Vec<SweepEntry> {
        let mut entries = Vec::with_capacity(event_ids.len());
        for event_id in event_ids {
            let outcome = match self.sweep_one(event_id, now).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(event = %event_id, error = %err, "expired survey sweep failed");
                    SweepOutcome::Failed(err)
                }
            };
            entries.push(SweepEntry {
                event_id: event_id.clone(),
                outcome,
            });
        }
        info!(events = entries.len(), "expired survey sweep finished");
        entries
    }

    async fn sweep_one(
        &self,
        event_id: &EventId,
        now: DateTime<Utc>,
    ) -> Result<SweepOutcome, SurveyError> {
        let festival = self.festival(event_id).await?;
        let status = SurveyAvailability::evaluate(festival.end_date, now);
        if status != SurveyAvailability::Expired {
            return Ok(SweepOutcome::NotExpired(status));
        }

        let survey = self.data.fetch_or_create_survey(event_id).await?;
        if !survey.is_active {
            return Ok(SweepOutcome::AlreadyClosed);
        }

        let report = self.close(event_id, &festival.created_by).await?;
        Ok(SweepOutcome::Closed(report))
    }
}

/// Error raised by the survey service.
#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("user '{user}' may not close the survey for festival '{event}'")]
    Authorization { event: EventId, user: UserId },
    #[error("{0} not found")]
    NotFound(String),
    #[error("survey for festival '{event}' is not accepting this request ({})", .status.label())]
    Unavailable {
        event: EventId,
        status: SurveyAvailability,
    },
    #[error("survey for festival '{0}' is closed")]
    SurveyClosed(EventId),
    #[error("attendance for festival '{0}' can no longer change")]
    AttendanceLocked(EventId),
    #[error(transparent)]
    Service(DataServiceError),
    #[error("survey left open: {} award(s) created, {} failed", .created.len(), .failed.len())]
    PartialClosure {
        created: Vec<BadgeAward>,
        failed: Vec<FailedAward>,
    },
    #[error("survey left open after recording {} award(s): {reason}", .created.len())]
    CloseIncomplete {
        created: Vec<BadgeAward>,
        reason: String,
    },
}

impl SurveyError {
    fn close_incomplete(event_id: &EventId, created: Vec<BadgeAward>, err: &DataServiceError) -> Self {
        warn!(event = %event_id, error = %err, "survey flag update failed after awards");
        Self::CloseIncomplete {
            created,
            reason: err.to_string(),
        }
    }
}

impl From<DataServiceError> for SurveyError {
    fn from(value: DataServiceError) -> Self {
        match value {
            DataServiceError::NotFound(what) => Self::NotFound(what),
            other => Self::Service(other),
        }
    }
}
