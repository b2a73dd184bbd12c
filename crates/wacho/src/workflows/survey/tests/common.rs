use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::workflows::badges::{BadgeCatalog, BadgeDefinition, BadgeId};
use crate::workflows::survey::domain::{
    Answer, AnswerMap, Attendance, AttendanceStatus, BadgeAward, EventId, Festival,
    NewBadgeAward, ResponseId, Survey, SurveyId, SurveyResponse, UserId, UserProfile,
};
use crate::workflows::survey::notifier::{NoticeLevel, Notifier};
use crate::workflows::survey::repository::{DataService, DataServiceError};
use crate::workflows::survey::SurveyService;

pub(super) const FESTIVAL: &str = "fest-1";
pub(super) const ORGANIZER: &str = "organizer";

pub(super) fn event_id() -> EventId {
    EventId::from(FESTIVAL)
}

pub(super) fn organizer() -> UserId {
    UserId::from(ORGANIZER)
}

pub(super) fn user(id: &str) -> UserId {
    UserId::from(id)
}

/// Standard catalog id for an assignable badge key.
pub(super) fn badge(key: &str) -> BadgeId {
    BadgeCatalog::standard()
        .definitions()
        .iter()
        .find(|definition| definition.key == key)
        .map(|definition| definition.id.clone())
        .expect("badge key in standard catalog")
}

pub(super) fn attendance(user_id: &str, status: AttendanceStatus) -> Attendance {
    Attendance {
        event_id: event_id(),
        user_id: user(user_id),
        status,
        user: UserProfile {
            id: user(user_id),
            name: format!("Attendee {user_id}"),
            nickname: Some(format!("{user_id}-nick")),
            avatar_url: None,
        },
    }
}

/// u1..u3 participate, u4 is not going.
pub(super) fn attendances() -> Vec<Attendance> {
    vec![
        attendance("u1", AttendanceStatus::HaveTicket),
        attendance("u2", AttendanceStatus::HaveTicket),
        attendance("u3", AttendanceStatus::ThinkingAboutIt),
        attendance("u4", AttendanceStatus::NotGoing),
    ]
}

pub(super) fn festival(end_date: DateTime<Utc>) -> Festival {
    Festival {
        id: event_id(),
        name: "Sunset Sound".to_string(),
        start_date: end_date - Duration::days(3),
        end_date,
        category: "electronic".to_string(),
        location: "Valparaiso".to_string(),
        capacity: Some(5000),
        price: Some(89.0),
        created_by: organizer(),
        attendances: Vec::new(),
    }
}

/// Ended two days ago, so the survey is open.
pub(super) fn open_end_date() -> DateTime<Utc> {
    Utc::now() - Duration::days(2)
}

pub(super) fn complete_answers(overall: i64) -> AnswerMap {
    let mut answers = AnswerMap::new();
    answers.insert("overall_rating".to_string(), Answer::Number(overall));
    answers.insert("enjoyment_level".to_string(), Answer::from("amazing"));
    answers.insert("best_moment".to_string(), Answer::from("Closing fireworks"));
    answers.insert("atmosphere_rating".to_string(), Answer::Number(4));
    answers.insert("would_recommend".to_string(), Answer::from("definitely"));
    answers.insert("organization_rating".to_string(), Answer::Number(3));
    answers.insert("improvements".to_string(), Answer::from("Shorter bar queues"));
    answers.insert("would_attend_again".to_string(), Answer::from("probably"));
    answers
}

pub(super) fn with_nomination(mut answers: AnswerMap, badge_id: &BadgeId, nominee: &str) -> AnswerMap {
    answers.insert(format!("badge_{}", badge_id.0), Answer::from(nominee));
    answers
}

pub(super) fn build_service(
    end_date: DateTime<Utc>,
) -> (SurveyService<MemoryDataService>, Arc<MemoryDataService>) {
    let data = Arc::new(MemoryDataService::with_festival(festival(end_date), attendances()));
    let service = SurveyService::with_seed(data.clone(), 7);
    (service, data)
}

#[derive(Default)]
struct MemoryState {
    festivals: HashMap<EventId, Festival>,
    attendances: Vec<Attendance>,
    badges: Vec<BadgeDefinition>,
    surveys: HashMap<EventId, Survey>,
    responses: Vec<SurveyResponse>,
    awards: Vec<BadgeAward>,
    failing_awards: HashSet<BadgeId>,
    fail_set_active: bool,
    offline: bool,
    sequence: u64,
}

/// In-memory data service with switches for injecting failures.
pub(super) struct MemoryDataService {
    state: Mutex<MemoryState>,
    calls: AtomicUsize,
    yield_on_call: AtomicBool,
    epoch: DateTime<Utc>,
}

impl Default for MemoryDataService {
    fn default() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                badges: BadgeCatalog::standard().definitions().to_vec(),
                ..MemoryState::default()
            }),
            calls: AtomicUsize::new(0),
            yield_on_call: AtomicBool::new(false),
            epoch: Utc::now() - Duration::hours(1),
        }
    }
}

impl MemoryDataService {
    pub(super) fn with_festival(festival: Festival, attendances: Vec<Attendance>) -> Self {
        let service = Self::default();
        {
            let mut state = service.state.lock().expect("state mutex poisoned");
            state.festivals.insert(festival.id.clone(), festival);
            state.attendances = attendances;
        }
        service
    }

    pub(super) fn add_festival(&self, festival: Festival) {
        self.lock().festivals.insert(festival.id.clone(), festival);
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn fail_award_for(&self, badge_id: &BadgeId) {
        self.lock().failing_awards.insert(badge_id.clone());
    }

    pub(super) fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_awards.clear();
        state.fail_set_active = false;
        state.offline = false;
    }

    pub(super) fn fail_set_active(&self) {
        self.lock().fail_set_active = true;
    }

    /// Every call yields to the runtime first so concurrent requests interleave.
    pub(super) fn yield_between_calls(&self) {
        self.yield_on_call.store(true, Ordering::SeqCst);
    }

    pub(super) fn go_offline(&self) {
        self.lock().offline = true;
    }

    pub(super) fn awards(&self) -> Vec<BadgeAward> {
        self.lock().awards.clone()
    }

    pub(super) fn responses(&self) -> Vec<SurveyResponse> {
        self.lock().responses.clone()
    }

    pub(super) fn survey_active(&self, event_id: &EventId) -> Option<bool> {
        self.lock().surveys.get(event_id).map(|survey| survey.is_active)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("state mutex poisoned")
    }

    async fn enter(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, DataServiceError> {
        if self.yield_on_call.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        if state.offline {
            return Err(DataServiceError::Unavailable("backend offline".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl DataService for MemoryDataService {
    async fn fetch_festival(&self, event_id: &EventId) -> Result<Option<Festival>, DataServiceError> {
        Ok(self.enter().await?.festivals.get(event_id).cloned())
    }

    async fn fetch_attendances(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<Attendance>, DataServiceError> {
        Ok(self
            .enter()
            .await?
            .attendances
            .iter()
            .filter(|attendance| &attendance.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn upsert_attendance(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        status: AttendanceStatus,
    ) -> Result<Attendance, DataServiceError> {
        let mut state = self.enter().await?;
        if let Some(existing) = state
            .attendances
            .iter_mut()
            .find(|a| &a.event_id == event_id && &a.user_id == user_id)
        {
            existing.status = status;
            return Ok(existing.clone());
        }
        let mut record = attendance(&user_id.0, status);
        record.event_id = event_id.clone();
        state.attendances.push(record.clone());
        Ok(record)
    }

    async fn fetch_badge_definitions(&self) -> Result<Vec<BadgeDefinition>, DataServiceError> {
        Ok(self.enter().await?.badges.clone())
    }

    async fn fetch_or_create_survey(&self, event_id: &EventId) -> Result<Survey, DataServiceError> {
        let mut state = self.enter().await?;
        let survey = state
            .surveys
            .entry(event_id.clone())
            .or_insert_with(|| Survey {
                id: SurveyId(format!("survey-{event_id}")),
                event_id: event_id.clone(),
                is_active: true,
            });
        Ok(survey.clone())
    }

    async fn submit_response(
        &self,
        survey_id: &SurveyId,
        user_id: &UserId,
        responses: AnswerMap,
    ) -> Result<SurveyResponse, DataServiceError> {
        let mut state = self.enter().await?;
        if let Some(existing) = state
            .responses
            .iter_mut()
            .find(|r| &r.survey_id == survey_id && &r.user_id == user_id)
        {
            existing.responses = responses;
            return Ok(existing.clone());
        }

        state.sequence += 1;
        let response = SurveyResponse {
            id: ResponseId(format!("resp-{:04}", state.sequence)),
            survey_id: survey_id.clone(),
            user_id: user_id.clone(),
            responses,
            created_at: self.epoch + Duration::minutes(state.sequence as i64),
        };
        state.responses.push(response.clone());
        Ok(response)
    }

    async fn fetch_responses(
        &self,
        survey_id: &SurveyId,
    ) -> Result<Vec<SurveyResponse>, DataServiceError> {
        Ok(self
            .enter()
            .await?
            .responses
            .iter()
            .filter(|response| &response.survey_id == survey_id)
            .cloned()
            .collect())
    }

    async fn fetch_existing_submission(
        &self,
        survey_id: &SurveyId,
        user_id: &UserId,
    ) -> Result<Option<SurveyResponse>, DataServiceError> {
        Ok(self
            .enter()
            .await?
            .responses
            .iter()
            .find(|r| &r.survey_id == survey_id && &r.user_id == user_id)
            .cloned())
    }

    async fn fetch_badge_awards(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<BadgeAward>, DataServiceError> {
        Ok(self
            .enter()
            .await?
            .awards
            .iter()
            .filter(|award| &award.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn create_badge_award(
        &self,
        award: NewBadgeAward,
    ) -> Result<BadgeAward, DataServiceError> {
        let mut state = self.enter().await?;
        if state.failing_awards.contains(&award.badge_id) {
            return Err(DataServiceError::Unavailable(format!(
                "award insert for {} timed out",
                award.badge_id
            )));
        }
        if state
            .awards
            .iter()
            .any(|a| a.badge_id == award.badge_id && a.event_id == award.event_id)
        {
            return Err(DataServiceError::Conflict("award already exists".to_string()));
        }
        let record = BadgeAward {
            badge_id: award.badge_id,
            event_id: award.event_id,
            user_id: award.user_id,
            votes_received: award.votes_received,
            awarded_at: self.epoch,
        };
        state.awards.push(record.clone());
        Ok(record)
    }

    async fn set_survey_active(
        &self,
        survey_id: &SurveyId,
        is_active: bool,
    ) -> Result<Survey, DataServiceError> {
        let mut state = self.enter().await?;
        if state.fail_set_active {
            return Err(DataServiceError::Unavailable("survey update failed".to_string()));
        }
        let survey = state
            .surveys
            .values_mut()
            .find(|survey| &survey.id == survey_id)
            .ok_or_else(|| DataServiceError::NotFound(format!("survey '{survey_id}'")))?;
        survey.is_active = is_active;
        Ok(survey.clone())
    }
}

/// Records every notice for assertions.
#[derive(Default)]
pub(super) struct MemoryNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl MemoryNotifier {
    pub(super) fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().expect("notice mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices
            .lock()
            .expect("notice mutex poisoned")
            .push((level, message.to_string()));
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
