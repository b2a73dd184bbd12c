use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};
use wacho::workflows::badges::{BadgeCatalog, BadgeDefinition};
use wacho::workflows::survey::{
    AnswerMap, Attendance, AttendanceStatus, BadgeAward, DataService, DataServiceError, EventId,
    Festival, NewBadgeAward, NoticeLevel, Notifier, ResponseId, Survey, SurveyId, SurveyResponse,
    UserId, UserProfile,
};

pub(crate) const DEMO_EVENT: &str = "fest-sunset-sound";
pub(crate) const DEMO_ORGANIZER: &str = "org-valentina";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct Store {
    festivals: HashMap<EventId, Festival>,
    attendances: Vec<Attendance>,
    badges: Vec<BadgeDefinition>,
    surveys: HashMap<EventId, Survey>,
    responses: Vec<SurveyResponse>,
    awards: Vec<BadgeAward>,
}

/// Process-local data service used by the HTTP server and the CLI demo.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDataService {
    store: Arc<Mutex<Store>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryDataService {
    pub(crate) fn with_badges(catalog: &BadgeCatalog) -> Self {
        let service = Self::default();
        service.lock().badges = catalog.definitions().to_vec();
        service
    }

    pub(crate) fn insert_festival(&self, festival: Festival, attendances: Vec<Attendance>) {
        let mut store = self.lock();
        store
            .attendances
            .retain(|attendance| attendance.event_id != festival.id);
        store.attendances.extend(attendances);
        store.festivals.insert(festival.id.clone(), festival);
    }

    pub(crate) fn festival_ids(&self) -> Vec<EventId> {
        let mut ids: Vec<EventId> = self.lock().festivals.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self, prefix: &str) -> String {
        let next = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{next:06}")
    }
}

#[async_trait]
impl DataService for InMemoryDataService {
    async fn fetch_festival(&self, event_id: &EventId) -> Result<Option<Festival>, DataServiceError> {
        let store = self.lock();
        Ok(store.festivals.get(event_id).map(|festival| {
            let mut festival = festival.clone();
            festival.attendances = store
                .attendances
                .iter()
                .filter(|attendance| &attendance.event_id == event_id)
                .cloned()
                .collect();
            festival
        }))
    }

    async fn fetch_attendances(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<Attendance>, DataServiceError> {
        Ok(self
            .lock()
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
        let mut store = self.lock();
        if !store.festivals.contains_key(event_id) {
            return Err(DataServiceError::NotFound(format!("festival '{event_id}'")));
        }

        if let Some(existing) = store
            .attendances
            .iter_mut()
            .find(|a| &a.event_id == event_id && &a.user_id == user_id)
        {
            existing.status = status;
            return Ok(existing.clone());
        }

        let user = store
            .attendances
            .iter()
            .find(|attendance| &attendance.user_id == user_id)
            .map(|attendance| attendance.user.clone())
            .unwrap_or_else(|| profile(&user_id.0, &user_id.0, None));
        let attendance = Attendance {
            event_id: event_id.clone(),
            user_id: user_id.clone(),
            status,
            user,
        };
        store.attendances.push(attendance.clone());
        Ok(attendance)
    }

    async fn fetch_badge_definitions(&self) -> Result<Vec<BadgeDefinition>, DataServiceError> {
        Ok(self.lock().badges.clone())
    }

    async fn fetch_or_create_survey(&self, event_id: &EventId) -> Result<Survey, DataServiceError> {
        if let Some(survey) = self.lock().surveys.get(event_id) {
            return Ok(survey.clone());
        }

        let survey = Survey {
            id: SurveyId(self.next_id("survey")),
            event_id: event_id.clone(),
            is_active: true,
        };
        let mut store = self.lock();
        Ok(store
            .surveys
            .entry(event_id.clone())
            .or_insert(survey)
            .clone())
    }

    async fn submit_response(
        &self,
        survey_id: &SurveyId,
        user_id: &UserId,
        responses: AnswerMap,
    ) -> Result<SurveyResponse, DataServiceError> {
        let id = ResponseId(self.next_id("response"));
        let mut store = self.lock();
        if let Some(existing) = store
            .responses
            .iter_mut()
            .find(|r| &r.survey_id == survey_id && &r.user_id == user_id)
        {
            existing.responses = responses;
            existing.created_at = Utc::now();
            return Ok(existing.clone());
        }

        let response = SurveyResponse {
            id,
            survey_id: survey_id.clone(),
            user_id: user_id.clone(),
            responses,
            created_at: Utc::now(),
        };
        store.responses.push(response.clone());
        Ok(response)
    }

    async fn fetch_responses(
        &self,
        survey_id: &SurveyId,
    ) -> Result<Vec<SurveyResponse>, DataServiceError> {
        Ok(self
            .lock()
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
            .lock()
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
            .lock()
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
        let mut store = self.lock();
        if store
            .awards
            .iter()
            .any(|a| a.badge_id == award.badge_id && a.event_id == award.event_id)
        {
            return Err(DataServiceError::Conflict(format!(
                "badge '{}' already awarded for festival '{}'",
                award.badge_id, award.event_id
            )));
        }

        let record = BadgeAward {
            badge_id: award.badge_id,
            event_id: award.event_id,
            user_id: award.user_id,
            votes_received: award.votes_received,
            awarded_at: Utc::now(),
        };
        store.awards.push(record.clone());
        Ok(record)
    }

    async fn set_survey_active(
        &self,
        survey_id: &SurveyId,
        is_active: bool,
    ) -> Result<Survey, DataServiceError> {
        let mut store = self.lock();
        let survey = store
            .surveys
            .values_mut()
            .find(|survey| &survey.id == survey_id)
            .ok_or_else(|| DataServiceError::NotFound(format!("survey '{survey_id}'")))?;
        survey.is_active = is_active;
        Ok(survey.clone())
    }
}

/// Routes user-facing notices into the service log.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Success | NoticeLevel::Info => info!(target: "wacho_api::notice", "{message}"),
            NoticeLevel::Warning => warn!(target: "wacho_api::notice", "{message}"),
            NoticeLevel::Error => error!(target: "wacho_api::notice", "{message}"),
        }
    }
}

fn profile(id: &str, name: &str, nickname: Option<&str>) -> UserProfile {
    UserProfile {
        id: UserId::from(id),
        name: name.to_string(),
        nickname: nickname.map(str::to_string),
        avatar_url: None,
    }
}

pub(crate) fn demo_festival(end_date: DateTime<Utc>) -> Festival {
    Festival {
        id: EventId::from(DEMO_EVENT),
        name: "Sunset Sound Festival".to_string(),
        start_date: end_date - Duration::days(2),
        end_date,
        category: "electronic".to_string(),
        location: "Playa Ritoque, Chile".to_string(),
        capacity: Some(8000),
        price: Some(45000.0),
        created_by: UserId::from(DEMO_ORGANIZER),
        attendances: Vec::new(),
    }
}

pub(crate) fn demo_attendances() -> Vec<Attendance> {
    [
        ("user-camila", "Camila Rojas", Some("cami"), AttendanceStatus::HaveTicket),
        ("user-diego", "Diego Fuentes", Some("dj_diego"), AttendanceStatus::HaveTicket),
        ("user-fernanda", "Fernanda Soto", None, AttendanceStatus::HaveTicket),
        ("user-matias", "Matias Vera", Some("mati"), AttendanceStatus::ThinkingAboutIt),
        ("user-ignacia", "Ignacia Pino", None, AttendanceStatus::NotGoing),
    ]
    .into_iter()
    .map(|(id, name, nickname, status)| Attendance {
        event_id: EventId::from(DEMO_EVENT),
        user_id: UserId::from(id),
        status,
        user: profile(id, name, nickname),
    })
    .collect()
}

/// Data service holding the demo festival, ended at `end_date`.
pub(crate) fn seeded_data_service(catalog: &BadgeCatalog, end_date: DateTime<Utc>) -> InMemoryDataService {
    let data = InMemoryDataService::with_badges(catalog);
    data.insert_festival(demo_festival(end_date), demo_attendances());
    data
}

pub(crate) fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}
